//! Adaptive threshold estimation eliminating magic numbers.
//!
//! The TMAEG hurdle is derived from the series' own volatility, so epoch
//! density stays comparable across instruments and bar granularities.

use crate::error::{ensure_finite, IthError, Result};
use crate::nav::compute_returns;

/// Lower clamp for the adaptive threshold.
pub const TMAEG_MIN: f64 = 0.0001;

/// Upper clamp for the adaptive threshold.
pub const TMAEG_MAX: f64 = 0.50;

/// Consistency factor turning a MAD into a normal-equivalent sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Sigma multiple a move must clear to count as excess.
pub const TMAEG_SIGMA_MULTIPLE: f64 = 3.0;

// ============================================================================
// Magnitude-Scaled Epsilon
// ============================================================================

/// Smallest dispersion treated as non-zero next to `operand`:
/// `100 × f64::EPSILON × max(|operand|, 1)`.
///
/// # Example
///
/// ```rust
/// use ith_metrics::relative_epsilon;
///
/// assert_eq!(relative_epsilon(0.5), relative_epsilon(1.0));
/// assert_eq!(relative_epsilon(-2000.0), 2000.0 * relative_epsilon(1.0));
/// ```
#[inline]
pub fn relative_epsilon(operand: f64) -> f64 {
    let scale = operand.abs().max(1.0);
    scale * f64::EPSILON * 100.0
}

// ============================================================================
// Robust Dispersion
// ============================================================================

/// Median of a sample; the mean of the two middle values for even lengths.
///
/// Returns `None` for an empty sample. NaN entries sort last.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median Absolute Deviation around the sample median.
///
/// # Example
///
/// ```rust
/// use ith_metrics::median_absolute_deviation;
///
/// // median = 3, |deviations| = [2, 1, 0, 1, 2] -> MAD = 1
/// let mad = median_absolute_deviation(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
/// assert_eq!(mad, 1.0);
/// ```
pub fn median_absolute_deviation(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

// ============================================================================
// Adaptive Threshold (TMAEG)
// ============================================================================

/// Derive the TMAEG hurdle from the NAV's return volatility.
///
/// `1.4826 × MAD(returns) × 3 × sqrt(lookback)`, clamped to
/// `[TMAEG_MIN, TMAEG_MAX]`. A constant NAV yields `TMAEG_MIN`.
///
/// # Errors
///
/// * [`IthError::InsufficientData`] when `nav` has fewer than 2 values
/// * [`IthError::InvalidLookback`] when `lookback` is zero
/// * [`IthError::NonFiniteNav`] when `nav` contains NaN or Inf
///
/// # Example
///
/// ```rust
/// use ith_metrics::{optimal_tmaeg, TMAEG_MAX, TMAEG_MIN};
///
/// let nav: Vec<f64> = (0..200).map(|i| 1.0 + 0.01 * (i as f64 * 0.7).sin()).collect();
/// let tmaeg = optimal_tmaeg(&nav, 50).unwrap();
/// assert!((TMAEG_MIN..=TMAEG_MAX).contains(&tmaeg));
/// ```
pub fn optimal_tmaeg(nav: &[f64], lookback: usize) -> Result<f64> {
    if nav.len() < 2 {
        return Err(IthError::InsufficientData {
            required: 2,
            actual: nav.len(),
        });
    }
    if lookback == 0 {
        return Err(IthError::InvalidLookback { lookback });
    }
    ensure_finite(nav)?;

    Ok(volatility_threshold(nav, lookback))
}

/// Threshold core for already-validated input.
///
/// Fewer than two values carry no return and yield `TMAEG_MIN`.
pub(crate) fn volatility_threshold(nav: &[f64], lookback: usize) -> f64 {
    let returns = compute_returns(nav);
    let mad = median_absolute_deviation(&returns).unwrap_or(0.0);

    let raw = MAD_TO_SIGMA * mad * TMAEG_SIGMA_MULTIPLE * (lookback as f64).sqrt();
    let tmaeg = raw.clamp(TMAEG_MIN, TMAEG_MAX);

    if tmaeg != raw {
        tracing::trace!(raw, tmaeg, lookback, "adaptive threshold clamped");
    }

    tmaeg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_epsilon_floor_and_growth() {
        assert_eq!(relative_epsilon(0.0), 100.0 * f64::EPSILON);
        assert!(relative_epsilon(1e6) > relative_epsilon(10.0));
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mad_constant_is_zero() {
        assert_eq!(median_absolute_deviation(&[0.0; 8]), Some(0.0));
    }

    #[test]
    fn test_optimal_tmaeg_reference_value() {
        // Returns alternate +1% / -0.99%; MAD = 0.00995049504950496
        let nav = [1.0, 1.01, 1.0, 1.01, 1.0];
        let tmaeg = optimal_tmaeg(&nav, 4).unwrap();
        assert!((tmaeg - 0.08851562376237632).abs() < 1e-14);
    }

    #[test]
    fn test_optimal_tmaeg_even_median() {
        let nav = [100.0, 101.0, 99.0, 102.0, 98.0, 103.0];
        let tmaeg = optimal_tmaeg(&nav, 9).unwrap();
        assert!((tmaeg - 0.39765974257425735).abs() < 1e-12);
    }

    #[test]
    fn test_optimal_tmaeg_constant_nav_floor() {
        let nav = vec![100.0; 10];
        assert_eq!(optimal_tmaeg(&nav, 50).unwrap(), TMAEG_MIN);
    }

    #[test]
    fn test_optimal_tmaeg_volatile_nav_ceiling() {
        let nav = [100.0, 150.0, 60.0, 200.0, 40.0];
        assert_eq!(optimal_tmaeg(&nav, 100).unwrap(), TMAEG_MAX);
    }

    #[test]
    fn test_optimal_tmaeg_grows_with_lookback() {
        let nav: Vec<f64> = (0..100).map(|i| 1.0 + 0.002 * ((i * 7 % 11) as f64)).collect();
        let short = optimal_tmaeg(&nav, 4).unwrap();
        let long = optimal_tmaeg(&nav, 16).unwrap();
        assert!(long >= short);
    }

    #[test]
    fn test_volatility_threshold_single_point_floor() {
        assert_eq!(volatility_threshold(&[1.0], 1), TMAEG_MIN);
    }

    #[test]
    fn test_optimal_tmaeg_preconditions() {
        assert!(matches!(
            optimal_tmaeg(&[1.0], 10),
            Err(IthError::InsufficientData { required: 2, actual: 1 })
        ));
        assert!(matches!(
            optimal_tmaeg(&[1.0, 1.1], 0),
            Err(IthError::InvalidLookback { lookback: 0 })
        ));
        assert!(matches!(
            optimal_tmaeg(&[1.0, f64::NAN, 1.1], 5),
            Err(IthError::NonFiniteNav { index: 1, .. })
        ));
    }
}
