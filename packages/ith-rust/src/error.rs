//! Error types for ITH computations.
//!
//! Only caller contract violations are errors. Statistically undefined
//! results (too few epochs, zero mean interval, insufficient window history)
//! are reported as NaN values, never through this type.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use thiserror::Error;

/// Errors raised by fallible ITH operations.
#[derive(Error, Debug)]
pub enum IthError {
    #[error("NAV series is empty")]
    EmptyNav,

    #[error("NAV series needs at least {required} values, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("lookback must be positive, got {lookback}")]
    InvalidLookback { lookback: usize },

    #[error("lookback {lookback} exceeds NAV length {len}")]
    LookbackExceedsLength { lookback: usize, len: usize },

    #[error("NAV value at index {index} is not finite: {value}")]
    NonFiniteNav { index: usize, value: f64 },

    #[error("threshold must be positive and finite, got {threshold}")]
    InvalidThreshold { threshold: f64 },

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl IthError {
    /// True for violations of an operation's input preconditions.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, IthError::Config(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IthError>;

/// Reject the first non-finite value in a NAV series.
pub(crate) fn ensure_finite(nav: &[f64]) -> Result<()> {
    match nav.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(IthError::NonFiniteNav {
            index,
            value: nav[index],
        }),
        None => Ok(()),
    }
}

#[cfg(feature = "python")]
impl From<IthError> for PyErr {
    fn from(err: IthError) -> PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_finite_reports_first_bad_index() {
        let nav = vec![1.0, 1.1, f64::NAN, f64::INFINITY];
        match ensure_finite(&nav) {
            Err(IthError::NonFiniteNav { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected NonFiniteNav, got {:?}", other),
        }
    }

    #[test]
    fn test_ensure_finite_accepts_clean_series() {
        assert!(ensure_finite(&[1.0, 0.0, 2.5]).is_ok());
        assert!(ensure_finite(&[]).is_ok());
    }

    #[test]
    fn test_error_messages() {
        let err = IthError::LookbackExceedsLength { lookback: 10, len: 5 };
        assert_eq!(err.to_string(), "lookback 10 exceeds NAV length 5");
        assert!(err.is_invalid_input());
    }
}
