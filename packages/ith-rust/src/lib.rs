//! Investment Time Horizon (ITH) epoch detection for NAV series.
//!
//! Bull and bear detectors flag bars where cumulative excess gain clears a
//! hysteresis threshold (TMAEG). On top of them sit a rolling engine that
//! turns each trailing window into 8 features bounded [0, 1], a multi-scale
//! layer that stacks several lookbacks into one column set, and online
//! normalizers for streaming consumers.
//!
//! **Zero magic numbers**: the threshold is derived from each window's own
//! return volatility.
//!
//! # Feature Overview
//!
//! | Category | Features |
//! |----------|----------|
//! | Epochs | Bull/Bear epoch density |
//! | Excess | Bull/Bear excess gain |
//! | Regularity | Bull/Bear interval CV |
//! | Risk | Max drawdown, max runup |
//!
//! # Example
//!
//! ```rust
//! use ith_metrics::{bear_ith, bull_ith, build_nav_from_closes, compute_rolling_ith};
//!
//! let closes = vec![100.0, 102.0, 104.5, 103.0, 106.0, 108.5, 107.0, 110.0];
//! let nav = build_nav_from_closes(&closes);
//!
//! let bull = bull_ith(&nav, 0.05);
//! let bear = bear_ith(&nav, 0.05);
//! assert_eq!(bull.len(), nav.len());
//! assert_eq!(bear.num_of_epochs, 0);
//!
//! // All rolling outputs are bounded [0, 1] after the warm-up prefix
//! let features = compute_rolling_ith(&nav, 4).unwrap();
//! assert!(features.bull_epoch_density[3..].iter().all(|v| (0.0..=1.0).contains(v)));
//! ```

pub mod adaptive;
pub mod config;
pub mod error;
pub mod ith;
pub mod ith_multiscale;
pub mod ith_normalize;
pub mod ith_rolling;
pub mod nav;
pub mod normalizer;
pub mod types;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod proptest_strategies;

// Re-export detectors and their result types
pub use error::{IthError, Result};
pub use ith::{
    bear_ith, bear_ith_checked, bull_ith, bull_ith_checked, intervals_cv, max_drawdown,
    max_runup, safe_ratio,
};
pub use types::{BearIthResult, BullIthResult, EpochRecord};
pub use nav::{build_nav_from_closes, build_nav_from_returns, compute_returns};

// Re-export adaptive threshold utilities
pub use adaptive::{
    median, median_absolute_deviation, optimal_tmaeg, relative_epsilon, TMAEG_MAX, TMAEG_MIN,
};

// Re-export rolling ITH features (time-agnostic, bounded [0, 1])
pub use ith_normalize::{
    logistic_sigmoid, normalize_cv, normalize_drawdown, normalize_epochs, normalize_excess,
    normalize_runup, open_unit, rank_normalize, rank_normalize_with_reference,
};
pub use ith_rolling::{
    compute_rolling_ith, compute_rolling_ith_par, window_features, RollingFeature,
    RollingIthFeatures, WindowFeatures,
};

// Re-export multi-scale ITH features
pub use ith_multiscale::{
    column_name, compute_multiscale_ith, compute_multiscale_ith_streaming, MultiscaleConfig,
    MultiscaleIthFeatures,
};

// Re-export online normalizers and settings
pub use config::IthSettings;
pub use normalizer::{
    EmaNormalizer, NormalizerConfig, NormalizerKind, OnlineNormalizer, PSquareQuantile,
    RobustNormalizer, WelfordNormalizer,
};
