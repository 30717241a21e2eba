//! Rolling window ITH computation for columnar feature generation.
//!
//! Computes time-agnostic ITH features over sliding windows, producing
//! bounded [0, 1] outputs suitable for LSTM/BiLSTM consumption.
//!
//! # Per-Window Threshold
//!
//! Each window derives its own TMAEG from the window's return volatility
//! (see [`optimal_tmaeg`](crate::optimal_tmaeg)) and then runs the bull and
//! bear detectors over that window only. Position `i` never sees data after
//! `i`.
//!
//! Every window is recomputed from scratch. The detector's re-anchoring is
//! not additive across window shifts, so there is no incremental path.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adaptive::volatility_threshold;
use crate::error::{ensure_finite, IthError, Result};
use crate::ith::{bear_ith, bull_ith};
use crate::ith_normalize::{
    normalize_cv, normalize_drawdown, normalize_epochs, normalize_excess, normalize_runup,
};

/// The eight rolling features, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollingFeature {
    /// Bull epochs per `sqrt(lookback)`, clamped to [0, 1].
    BullEpochDensity,
    /// Bear epochs per `sqrt(lookback)`, clamped to [0, 1].
    BearEpochDensity,
    /// Summed bull excess gain, tanh-saturated.
    BullExcessGain,
    /// Summed bear excess gain, tanh-saturated.
    BearExcessGain,
    /// Bull epoch spacing CV through a sigmoid.
    BullCv,
    /// Bear epoch spacing CV through a sigmoid.
    BearCv,
    /// Largest peak-to-trough loss in the window.
    MaxDrawdown,
    /// Largest trough-to-peak gain in the window, as `1 - trough / peak`.
    MaxRunup,
}

impl RollingFeature {
    /// Every feature, in output order.
    pub const ALL: [RollingFeature; 8] = [
        RollingFeature::BullEpochDensity,
        RollingFeature::BearEpochDensity,
        RollingFeature::BullExcessGain,
        RollingFeature::BearExcessGain,
        RollingFeature::BullCv,
        RollingFeature::BearCv,
        RollingFeature::MaxDrawdown,
        RollingFeature::MaxRunup,
    ];

    /// Full array name, e.g. `bull_epoch_density`.
    pub fn name(self) -> &'static str {
        match self {
            RollingFeature::BullEpochDensity => "bull_epoch_density",
            RollingFeature::BearEpochDensity => "bear_epoch_density",
            RollingFeature::BullExcessGain => "bull_excess_gain",
            RollingFeature::BearExcessGain => "bear_excess_gain",
            RollingFeature::BullCv => "bull_cv",
            RollingFeature::BearCv => "bear_cv",
            RollingFeature::MaxDrawdown => "max_drawdown",
            RollingFeature::MaxRunup => "max_runup",
        }
    }

    /// Column suffix, e.g. `bull_ed`.
    pub fn short_name(self) -> &'static str {
        match self {
            RollingFeature::BullEpochDensity => "bull_ed",
            RollingFeature::BearEpochDensity => "bear_ed",
            RollingFeature::BullExcessGain => "bull_eg",
            RollingFeature::BearExcessGain => "bear_eg",
            RollingFeature::BullCv => "bull_cv",
            RollingFeature::BearCv => "bear_cv",
            RollingFeature::MaxDrawdown => "max_dd",
            RollingFeature::MaxRunup => "max_ru",
        }
    }
}

/// Features of a single trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    /// Threshold the detectors ran with.
    pub tmaeg: f64,
    /// Bull epoch density: epochs / sqrt(lookback), clamped to [0, 1]
    pub bull_epoch_density: f64,
    /// Bear epoch density: epochs / sqrt(lookback), clamped to [0, 1]
    pub bear_epoch_density: f64,
    /// Bull excess gain (sum in window): tanh-normalized to [0, 1]
    pub bull_excess_gain: f64,
    /// Bear excess gain (sum in window): tanh-normalized to [0, 1]
    pub bear_excess_gain: f64,
    /// Bull intervals CV: sigmoid-normalized to [0, 1]
    pub bull_cv: f64,
    /// Bear intervals CV: sigmoid-normalized to [0, 1]
    pub bear_cv: f64,
    /// Max drawdown in window: already [0, 1]
    pub max_drawdown: f64,
    /// Max runup in window: already [0, 1]
    pub max_runup: f64,
}

impl WindowFeatures {
    pub fn get(&self, feature: RollingFeature) -> f64 {
        match feature {
            RollingFeature::BullEpochDensity => self.bull_epoch_density,
            RollingFeature::BearEpochDensity => self.bear_epoch_density,
            RollingFeature::BullExcessGain => self.bull_excess_gain,
            RollingFeature::BearExcessGain => self.bear_excess_gain,
            RollingFeature::BullCv => self.bull_cv,
            RollingFeature::BearCv => self.bear_cv,
            RollingFeature::MaxDrawdown => self.max_drawdown,
            RollingFeature::MaxRunup => self.max_runup,
        }
    }
}

/// Rolling ITH features - all bounded [0, 1] for LSTM consumption.
///
/// Each field is a vector of length N (same as input NAV), where
/// the first `lookback - 1` values are NaN (insufficient data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingIthFeatures {
    /// Bull epoch density: epochs / sqrt(lookback), clamped to [0, 1]
    pub bull_epoch_density: Vec<f64>,
    /// Bear epoch density: epochs / sqrt(lookback), clamped to [0, 1]
    pub bear_epoch_density: Vec<f64>,
    /// Bull excess gain (sum in window): tanh-normalized to [0, 1]
    pub bull_excess_gain: Vec<f64>,
    /// Bear excess gain (sum in window): tanh-normalized to [0, 1]
    pub bear_excess_gain: Vec<f64>,
    /// Bull intervals CV: sigmoid-normalized to [0, 1]
    pub bull_cv: Vec<f64>,
    /// Bear intervals CV: sigmoid-normalized to [0, 1]
    pub bear_cv: Vec<f64>,
    /// Max drawdown in window: already [0, 1]
    pub max_drawdown: Vec<f64>,
    /// Max runup in window: already [0, 1]
    pub max_runup: Vec<f64>,
    /// Window size the features were computed with.
    pub lookback: usize,
}

impl RollingIthFeatures {
    fn new(len: usize, lookback: usize) -> Self {
        Self {
            bull_epoch_density: vec![f64::NAN; len],
            bear_epoch_density: vec![f64::NAN; len],
            bull_excess_gain: vec![f64::NAN; len],
            bear_excess_gain: vec![f64::NAN; len],
            bull_cv: vec![f64::NAN; len],
            bear_cv: vec![f64::NAN; len],
            max_drawdown: vec![f64::NAN; len],
            max_runup: vec![f64::NAN; len],
            lookback,
        }
    }

    fn store(&mut self, i: usize, window: &WindowFeatures) {
        self.bull_epoch_density[i] = window.bull_epoch_density;
        self.bear_epoch_density[i] = window.bear_epoch_density;
        self.bull_excess_gain[i] = window.bull_excess_gain;
        self.bear_excess_gain[i] = window.bear_excess_gain;
        self.bull_cv[i] = window.bull_cv;
        self.bear_cv[i] = window.bear_cv;
        self.max_drawdown[i] = window.max_drawdown;
        self.max_runup[i] = window.max_runup;
    }

    /// Length of every feature array.
    pub fn len(&self) -> usize {
        self.bull_epoch_density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bull_epoch_density.is_empty()
    }

    pub fn get(&self, feature: RollingFeature) -> &[f64] {
        match feature {
            RollingFeature::BullEpochDensity => &self.bull_epoch_density,
            RollingFeature::BearEpochDensity => &self.bear_epoch_density,
            RollingFeature::BullExcessGain => &self.bull_excess_gain,
            RollingFeature::BearExcessGain => &self.bear_excess_gain,
            RollingFeature::BullCv => &self.bull_cv,
            RollingFeature::BearCv => &self.bear_cv,
            RollingFeature::MaxDrawdown => &self.max_drawdown,
            RollingFeature::MaxRunup => &self.max_runup,
        }
    }

    /// All eight arrays in [`RollingFeature::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (RollingFeature, &[f64])> + '_ {
        RollingFeature::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

fn validate(nav: &[f64], lookback: usize) -> Result<()> {
    if nav.is_empty() {
        return Err(IthError::EmptyNav);
    }
    if lookback == 0 {
        return Err(IthError::InvalidLookback { lookback });
    }
    if lookback > nav.len() {
        return Err(IthError::LookbackExceedsLength {
            lookback,
            len: nav.len(),
        });
    }
    ensure_finite(nav)
}

/// Features of `window`, which must already be validated.
fn evaluate_window(window: &[f64], lookback: usize) -> WindowFeatures {
    let tmaeg = volatility_threshold(window, lookback);
    let bull = bull_ith(window, tmaeg);
    let bear = bear_ith(window, tmaeg);

    WindowFeatures {
        tmaeg,
        bull_epoch_density: normalize_epochs(bull.num_of_epochs, lookback),
        bear_epoch_density: normalize_epochs(bear.num_of_epochs, lookback),
        bull_excess_gain: normalize_excess(bull.excess_gains.iter().sum()),
        bear_excess_gain: normalize_excess(bear.excess_gains.iter().sum()),
        bull_cv: normalize_cv(bull.intervals_cv),
        bear_cv: normalize_cv(bear.intervals_cv),
        max_drawdown: normalize_drawdown(bull.max_drawdown),
        max_runup: normalize_runup(bear.max_runup),
    }
}

#[inline]
fn trailing(nav: &[f64], lookback: usize, end: usize) -> &[f64] {
    &nav[end + 1 - lookback..=end]
}

/// Compute the features of the window ending at `end` (inclusive).
///
/// Equal to position `end` of [`compute_rolling_ith`], without computing the
/// other positions.
///
/// # Errors
///
/// The [`compute_rolling_ith`] preconditions, plus
/// [`IthError::InsufficientData`] when `end` is outside
/// `lookback - 1 .. nav.len()`.
pub fn window_features(nav: &[f64], lookback: usize, end: usize) -> Result<WindowFeatures> {
    validate(nav, lookback)?;
    if end >= nav.len() {
        return Err(IthError::InsufficientData {
            required: end + 1,
            actual: nav.len(),
        });
    }
    if end + 1 < lookback {
        return Err(IthError::InsufficientData {
            required: lookback,
            actual: end + 1,
        });
    }
    Ok(evaluate_window(trailing(nav, lookback, end), lookback))
}

/// Compute rolling ITH features over lookback windows.
///
/// # Arguments
/// * `nav` - NAV series (N samples, typically starting near 1.0)
/// * `lookback` - Number of bars in each trailing window
///
/// # Returns
/// `RollingIthFeatures` with shape (N,), where first `lookback-1` values are NaN
///
/// # Errors
/// * [`IthError::EmptyNav`] for an empty series
/// * [`IthError::InvalidLookback`] when `lookback` is 0
/// * [`IthError::LookbackExceedsLength`] when `lookback > nav.len()`
/// * [`IthError::NonFiniteNav`] when `nav` contains NaN or Inf
///
/// # Example
/// ```
/// use ith_metrics::compute_rolling_ith;
///
/// let nav = vec![1.0, 1.01, 1.02, 1.015, 1.03, 1.025, 1.04, 1.05, 1.045, 1.06];
/// let features = compute_rolling_ith(&nav, 5).unwrap();
///
/// // First 4 values (lookback-1) are NaN
/// assert!(features.bull_epoch_density[0].is_nan());
/// assert!(features.bull_epoch_density[3].is_nan());
///
/// // From index 4 onwards, values are bounded [0, 1]
/// let v = features.bull_epoch_density[4];
/// assert!(!v.is_nan() && v >= 0.0 && v <= 1.0);
/// ```
pub fn compute_rolling_ith(nav: &[f64], lookback: usize) -> Result<RollingIthFeatures> {
    validate(nav, lookback)?;

    let n = nav.len();
    tracing::debug!(n, lookback, "computing rolling ITH features");

    let mut features = RollingIthFeatures::new(n, lookback);
    for end in (lookback - 1)..n {
        let window = evaluate_window(trailing(nav, lookback, end), lookback);
        features.store(end, &window);
    }

    tracing::debug!(windows = n + 1 - lookback, "rolling ITH features complete");
    Ok(features)
}

/// Data-parallel [`compute_rolling_ith`] over the rayon pool.
///
/// Window positions are independent; output is bit-identical to the
/// sequential version.
pub fn compute_rolling_ith_par(nav: &[f64], lookback: usize) -> Result<RollingIthFeatures> {
    validate(nav, lookback)?;

    let n = nav.len();
    tracing::debug!(
        n,
        lookback,
        threads = rayon::current_num_threads(),
        "computing rolling ITH features in parallel"
    );

    let windows: Vec<WindowFeatures> = ((lookback - 1)..n)
        .into_par_iter()
        .map(|end| evaluate_window(trailing(nav, lookback, end), lookback))
        .collect();

    let mut features = RollingIthFeatures::new(n, lookback);
    for (offset, window) in windows.iter().enumerate() {
        features.store(lookback - 1 + offset, window);
    }

    tracing::debug!(windows = windows.len(), "rolling ITH features complete");
    Ok(features)
}
