// # PROCESS-STORM-OK: Rust test functions with single-letter endings trigger false positives
//! Investment Time Horizon (ITH) epoch detection.
//!
//! Both detectors are single forward passes over the NAV series. They keep an
//! endorsed reference level that only moves once the excess move since the
//! last re-anchor clears the TMAEG (Target Maximum Acceptable Excess Gain)
//! hurdle.
//!
//! The order of operations inside the loop is fixed: update candidates,
//! evaluate the re-anchor condition, record the per-bar excess values, zero
//! the running excess after a commit, then test the epoch condition on the
//! *recorded* values. The re-anchor and epoch tests can disagree at the
//! reset boundary, so both are evaluated exactly as written.
//!
//! The bear detector is the reciprocal mirror of the bull detector: running
//! `bear_ith(nav)` flags the same bars as `bull_ith` on `1 / nav`.

use crate::error::{IthError, Result};
use crate::types::{BearIthResult, BullIthResult};

// ============================================================================
// Division Guard
// ============================================================================

/// Quotient that is `None` when the denominator is zero or the result is not
/// finite. Every division by a NAV level in this crate goes through here.
#[inline]
fn checked_ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let ratio = num / den;
    ratio.is_finite().then_some(ratio)
}

/// Divide `num` by `den`, yielding 0.0 instead of Inf or NaN.
///
/// # Example
///
/// ```rust
/// use ith_metrics::safe_ratio;
///
/// assert_eq!(safe_ratio(3.0, 2.0), 1.5);
/// assert_eq!(safe_ratio(1.0, 0.0), 0.0);
/// ```
#[inline]
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    checked_ratio(num, den).unwrap_or(0.0)
}

/// `value / reference - 1`, zero when the ratio is undefined.
#[inline]
fn excess_above(value: f64, reference: f64) -> f64 {
    checked_ratio(value, reference).map_or(0.0, |r| r - 1.0)
}

/// `1 - value / reference`, zero when the ratio is undefined.
#[inline]
fn excess_below(value: f64, reference: f64) -> f64 {
    checked_ratio(value, reference).map_or(0.0, |r| 1.0 - r)
}

fn validate_threshold(tmaeg: f64) -> Result<()> {
    if tmaeg > 0.0 && tmaeg.is_finite() {
        Ok(())
    } else {
        Err(IthError::InvalidThreshold { threshold: tmaeg })
    }
}

// ============================================================================
// Bull ITH (Long Position Analysis)
// ============================================================================

/// Calculate Bull ITH (long position) analysis.
///
/// Tracks an endorsed crest. A new candidate high sets the excess gain
/// `next / crest - 1`; a new candidate low sets the excess loss
/// `1 - next / crest`. The crest re-anchors to the candidate high once the
/// excess gain beats both the excess loss and the hurdle.
///
/// Empty and single-point inputs are valid and produce zero epochs with a
/// NaN `intervals_cv`.
///
/// # Arguments
///
/// * `nav` - Net Asset Value series
/// * `tmaeg` - Hysteresis threshold (e.g., 0.05 for 5%)
///
/// # Example
///
/// ```rust
/// use ith_metrics::bull_ith;
///
/// let nav = vec![100.0, 110.0, 120.0];
/// let result = bull_ith(&nav, 0.05);
/// assert_eq!(result.excess_gains[0], 0.0);
/// assert!(result.num_of_epochs >= 1);
/// ```
pub fn bull_ith(nav: &[f64], tmaeg: f64) -> BullIthResult {
    let n = nav.len();
    let mut excess_gains = vec![0.0; n];
    let mut excess_losses = vec![0.0; n];
    let mut epochs = vec![false; n];

    if let Some(&first) = nav.first() {
        let mut excess_gain = 0.0;
        let mut excess_loss = 0.0;
        let mut endorsing_crest = first;
        let mut endorsing_nadir = first;
        let mut candidate_crest = first;
        let mut candidate_nadir = first;

        for i in 1..n {
            let equity = nav[i - 1];
            let next_equity = nav[i];

            if next_equity > candidate_crest {
                excess_gain = excess_above(next_equity, endorsing_crest);
                candidate_crest = next_equity;
            }

            if next_equity < candidate_nadir {
                excess_loss = excess_below(next_equity, endorsing_crest);
                candidate_nadir = next_equity;
            }

            let reset_condition = excess_gain > excess_loss.abs()
                && excess_gain > tmaeg
                && candidate_crest >= endorsing_crest;

            if reset_condition {
                endorsing_crest = candidate_crest;
                endorsing_nadir = equity;
                candidate_nadir = equity;
            } else {
                endorsing_nadir = endorsing_nadir.min(equity);
            }

            excess_gains[i] = excess_gain;
            excess_losses[i] = excess_loss;

            if reset_condition {
                excess_gain = 0.0;
                excess_loss = 0.0;
            }

            epochs[i] = excess_gains[i] > excess_losses[i] && excess_gains[i] > tmaeg;
        }

        tracing::trace!(endorsing_crest, endorsing_nadir, "bull pass complete");
    }

    let num_of_epochs = epochs.iter().filter(|&&e| e).count();
    let intervals_cv = intervals_cv(&epochs);
    let max_drawdown = max_drawdown(nav);

    BullIthResult {
        excess_gains,
        excess_losses,
        num_of_epochs,
        epochs,
        intervals_cv,
        max_drawdown,
    }
}

/// [`bull_ith`] with the threshold precondition enforced.
pub fn bull_ith_checked(nav: &[f64], tmaeg: f64) -> Result<BullIthResult> {
    validate_threshold(tmaeg)?;
    Ok(bull_ith(nav, tmaeg))
}

// ============================================================================
// Bear ITH (Short Position Analysis)
// ============================================================================

/// Calculate Bear ITH (short position) analysis.
///
/// Tracks an endorsed trough. A new candidate low sets the excess gain
/// `trough / next - 1`; a new candidate high sets the excess loss
/// `1 - trough / next`. The trough re-anchors to the candidate low once the
/// excess gain beats both the excess loss and the hurdle.
///
/// # Arguments
///
/// * `nav` - Net Asset Value series
/// * `tmaeg` - Hysteresis threshold (e.g., 0.05 for 5%)
///
/// # Example
///
/// ```rust
/// use ith_metrics::bear_ith;
///
/// let nav = vec![100.0, 90.0, 80.0];
/// let result = bear_ith(&nav, 0.05);
/// assert_eq!(result.num_of_epochs, 2);
/// ```
pub fn bear_ith(nav: &[f64], tmaeg: f64) -> BearIthResult {
    let n = nav.len();
    let mut excess_gains = vec![0.0; n];
    let mut excess_losses = vec![0.0; n];
    let mut epochs = vec![false; n];

    if let Some(&first) = nav.first() {
        let mut excess_gain = 0.0;
        let mut excess_loss = 0.0;
        let mut endorsing_nadir = first;
        let mut endorsing_crest = first;
        let mut candidate_nadir = first;
        let mut candidate_crest = first;

        for i in 1..n {
            let equity = nav[i - 1];
            let next_equity = nav[i];

            if next_equity < candidate_nadir {
                excess_gain = excess_above(endorsing_nadir, next_equity);
                candidate_nadir = next_equity;
            }

            if next_equity > candidate_crest {
                excess_loss = excess_below(endorsing_nadir, next_equity);
                candidate_crest = next_equity;
            }

            let reset_condition = excess_gain > excess_loss.abs()
                && excess_gain > tmaeg
                && candidate_nadir <= endorsing_nadir;

            if reset_condition {
                endorsing_nadir = candidate_nadir;
                endorsing_crest = equity;
                candidate_crest = equity;
            } else {
                endorsing_crest = endorsing_crest.max(equity);
            }

            excess_gains[i] = excess_gain;
            excess_losses[i] = excess_loss;

            if reset_condition {
                excess_gain = 0.0;
                excess_loss = 0.0;
            }

            epochs[i] = excess_gains[i] > excess_losses[i] && excess_gains[i] > tmaeg;
        }

        tracing::trace!(endorsing_nadir, endorsing_crest, "bear pass complete");
    }

    let num_of_epochs = epochs.iter().filter(|&&e| e).count();
    let intervals_cv = intervals_cv(&epochs);
    let max_runup = max_runup(nav);

    BearIthResult {
        excess_gains,
        excess_losses,
        num_of_epochs,
        epochs,
        intervals_cv,
        max_runup,
    }
}

/// [`bear_ith`] with the threshold precondition enforced.
pub fn bear_ith_checked(nav: &[f64], tmaeg: f64) -> Result<BearIthResult> {
    validate_threshold(tmaeg)?;
    Ok(bear_ith(nav, tmaeg))
}

// ============================================================================
// Interval Statistics
// ============================================================================

/// Coefficient of variation of the spacing between epochs.
///
/// Index 0 is an implicit anchor ahead of the flagged bars. Uses the
/// population standard deviation. Returns NaN with fewer than two anchors or
/// a zero mean interval.
///
/// # Example
///
/// ```rust
/// use ith_metrics::intervals_cv;
///
/// // Anchors 0, 4, 8 -> intervals [4, 4] -> perfectly regular
/// let epochs = [false, false, false, false, true, false, false, false, true];
/// assert_eq!(intervals_cv(&epochs), 0.0);
/// assert!(intervals_cv(&[false, false]).is_nan());
/// ```
pub fn intervals_cv(epochs: &[bool]) -> f64 {
    let anchors: Vec<usize> = std::iter::once(0)
        .chain(
            epochs
                .iter()
                .enumerate()
                .filter_map(|(i, &is_epoch)| is_epoch.then_some(i)),
        )
        .collect();

    if anchors.len() < 2 {
        return f64::NAN;
    }

    let intervals: Vec<f64> = anchors.windows(2).map(|w| (w[1] - w[0]) as f64).collect();

    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return f64::NAN;
    }

    let variance = intervals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

// ============================================================================
// Adverse Excursions
// ============================================================================

/// Maximum drawdown: largest `(peak - v) / peak` against the running peak.
///
/// Zero for fewer than two points.
pub fn max_drawdown(nav: &[f64]) -> f64 {
    let Some(&first) = nav.first() else {
        return 0.0;
    };

    let mut running_max = first;
    let mut max_dd: f64 = 0.0;
    for &value in &nav[1..] {
        if value > running_max {
            running_max = value;
        }
        max_dd = max_dd.max(safe_ratio(running_max - value, running_max));
    }
    max_dd
}

/// Maximum runup: largest `(v - trough) / v` against the running trough.
///
/// The mirror of [`max_drawdown`] for short positions; bounded in [0, 1] for
/// positive NAV.
pub fn max_runup(nav: &[f64]) -> f64 {
    let Some(&first) = nav.first() else {
        return 0.0;
    };

    let mut running_min = first;
    let mut max_ru: f64 = 0.0;
    for &value in &nav[1..] {
        if value < running_min {
            running_min = value;
        }
        max_ru = max_ru.max(safe_ratio(value - running_min, value));
    }
    max_ru
}
