//! Normalization functions for rolling ITH features.
//!
//! All outputs are bounded to [0, 1] for LSTM/BiLSTM consumption.

/// Logistic sigmoid function: 1 / (1 + exp(-(x - center) * scale))
///
/// Maps any real number to (0, 1), monotonically increasing.
///
/// Parameters:
/// - center: The input value that maps to exactly 0.5
/// - scale: Controls steepness (higher = sharper transition)
#[inline]
pub fn logistic_sigmoid(x: f64, center: f64, scale: f64) -> f64 {
    1.0 / (1.0 + (-(x - center) * scale).exp())
}

/// Pull a [0, 1] value strictly inside the open interval.
///
/// The sigmoid saturates to exactly 0.0 or 1.0 in f64 for large |z|.
#[inline]
pub fn open_unit(x: f64) -> f64 {
    x.clamp(f64::EPSILON, 1.0 - f64::EPSILON)
}

/// Baseline epoch count for a window: `sqrt(lookback)`, at least 1.
#[inline]
pub fn expected_epochs(lookback: usize) -> f64 {
    (lookback as f64).sqrt().max(1.0)
}

/// Normalize epoch count to [0, 1] as density against the expected baseline.
///
/// Saturates by clamping: any window with at least `sqrt(lookback)` epochs
/// maps to 1.0.
///
/// # Arguments
/// * `epochs` - Number of ITH epochs detected
/// * `lookback` - Window size
#[inline]
pub fn normalize_epochs(epochs: usize, lookback: usize) -> f64 {
    (epochs as f64 / expected_epochs(lookback)).clamp(0.0, 1.0)
}

/// Normalize excess gain/loss to [0, 1] using tanh.
///
/// The factor 5 puts typical excess sums (0 to 20%) across most of
/// [0, 0.8]:
/// - 1% → ~0.05
/// - 10% → ~0.46
/// - 20% → ~0.76
#[inline]
pub fn normalize_excess(value: f64) -> f64 {
    (value.abs() * 5.0).tanh()
}

/// Normalize coefficient of variation (CV) to [0, 1] using logistic sigmoid.
///
/// Centered at CV = 0.5 with scale 4. NaN (fewer than one epoch) is read as
/// CV = 0 and maps to ~0.12.
#[inline]
pub fn normalize_cv(cv: f64) -> f64 {
    let cv_effective = if cv.is_nan() { 0.0 } else { cv };
    logistic_sigmoid(cv_effective, 0.5, 4.0)
}

/// Normalize max drawdown to [0, 1].
///
/// Drawdown is bounded by definition; this only absorbs numerical noise.
#[inline]
pub fn normalize_drawdown(drawdown: f64) -> f64 {
    drawdown.clamp(0.0, 1.0)
}

/// Normalize max runup to [0, 1].
#[inline]
pub fn normalize_runup(runup: f64) -> f64 {
    runup.clamp(0.0, 1.0)
}

// ============================================================================
// Rank Transforms
// ============================================================================

/// Empirical probability integral transform of a batch into [0, 1].
///
/// The smallest value maps to 0 and the largest to 1. Values within
/// `f64::EPSILON` of each other share their average rank. NaN sorts last.
/// A batch of zero or one values maps to 0.5.
pub fn rank_normalize(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return vec![0.5; n];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let anchor = values[order[start]];
        let mut end = start;
        while end + 1 < n && (values[order[end + 1]] - anchor).abs() < f64::EPSILON {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }

    let top = (n - 1) as f64;
    ranks.into_iter().map(|r| r / top).collect()
}

/// Fraction of `reference` strictly below `value`.
///
/// `reference` must be sorted ascending, e.g. a training-period sample.
/// An empty reference gives 0.5.
pub fn rank_normalize_with_reference(value: f64, reference: &[f64]) -> f64 {
    if reference.is_empty() {
        return 0.5;
    }
    let below = reference.partition_point(|&x| x < value);
    below as f64 / reference.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_epochs_bounded() {
        for epochs in 0..=100 {
            for lookback in 1..=200 {
                let result = normalize_epochs(epochs, lookback);
                assert!(
                    (0.0..=1.0).contains(&result),
                    "normalize_epochs({}, {}) = {} not in [0, 1]",
                    epochs,
                    lookback,
                    result
                );
            }
        }
    }

    #[test]
    fn test_normalize_epochs_monotonic() {
        let lookback = 50;
        let mut prev = normalize_epochs(0, lookback);
        for epochs in 1..=lookback {
            let curr = normalize_epochs(epochs, lookback);
            assert!(curr >= prev);
            prev = curr;
        }
    }

    #[test]
    fn test_normalize_epochs_saturates_by_clamp() {
        // sqrt(100) = 10 expected epochs
        assert_eq!(normalize_epochs(0, 100), 0.0);
        assert_eq!(normalize_epochs(5, 100), 0.5);
        assert_eq!(normalize_epochs(10, 100), 1.0);
        assert_eq!(normalize_epochs(40, 100), 1.0);
    }

    #[test]
    fn test_normalize_epochs_tiny_lookback() {
        assert_eq!(normalize_epochs(1, 1), 1.0);
        assert_eq!(normalize_epochs(1, 0), 1.0);
    }

    #[test]
    fn test_normalize_excess_zero_and_sign() {
        assert_eq!(normalize_excess(0.0), 0.0);
        assert_eq!(normalize_excess(0.1), normalize_excess(-0.1));
    }

    #[test]
    fn test_normalize_excess_large_saturates() {
        let result = normalize_excess(100.0);
        assert!(result > 0.999 && result <= 1.0);
    }

    #[test]
    fn test_normalize_cv_bounded() {
        for &cv in &[0.0, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0] {
            let result = normalize_cv(cv);
            assert!((0.0..=1.0).contains(&result));
        }
        assert!((normalize_cv(0.5) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_normalize_cv_nan_handling() {
        let nan_result = normalize_cv(f64::NAN);
        assert!(nan_result.is_finite());
        assert_eq!(nan_result, normalize_cv(0.0));
        assert!(nan_result < 0.13);
    }

    #[test]
    fn test_normalize_drawdown_clamped() {
        assert_eq!(normalize_drawdown(-0.1), 0.0);
        assert_eq!(normalize_drawdown(0.5), 0.5);
        assert_eq!(normalize_drawdown(1.5), 1.0);
    }

    #[test]
    fn test_normalize_runup_clamped() {
        assert_eq!(normalize_runup(-0.1), 0.0);
        assert_eq!(normalize_runup(1.5), 1.0);
    }

    #[test]
    fn test_logistic_sigmoid_extremes() {
        assert!(logistic_sigmoid(-10.0, 0.0, 1.0) < 0.001);
        assert!(logistic_sigmoid(10.0, 0.0, 1.0) > 0.999);
    }

    #[test]
    fn test_open_unit_excludes_endpoints() {
        assert!(open_unit(0.0) > 0.0);
        assert!(open_unit(1.0) < 1.0);
        assert_eq!(open_unit(0.25), 0.25);
    }

    #[test]
    fn test_rank_normalize_bounded() {
        let normalized = rank_normalize(&[100.0, 1.0, 50.0, 1e6, 25.0]);
        assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(normalized[1], 0.0);
        assert_eq!(normalized[3], 1.0);
        assert_eq!(normalized[0], 0.75);
        assert_eq!(normalized[2], 0.5);
    }

    #[test]
    fn test_rank_normalize_preserves_order() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let normalized = rank_normalize(&values);
        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] < values[j] {
                    assert!(normalized[i] < normalized[j], "{} vs {}", i, j);
                }
            }
        }
    }

    #[test]
    fn test_rank_normalize_ties_share_average_rank() {
        // Ranks 0, 1.5, 1.5, 3 over n - 1 = 3
        let normalized = rank_normalize(&[1.0, 2.0, 2.0, 3.0]);
        assert_eq!(normalized[1], normalized[2]);
        assert_eq!(normalized[1], 0.5);
    }

    #[test]
    fn test_rank_normalize_short_input() {
        assert!(rank_normalize(&[]).is_empty());
        assert_eq!(rank_normalize(&[42.0]), vec![0.5]);
        assert_eq!(rank_normalize(&[7.0, 7.0]), vec![0.5, 0.5]);
    }

    #[test]
    fn test_rank_normalize_with_reference_percentile() {
        let reference = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(rank_normalize_with_reference(0.0, &reference), 0.0);
        assert_eq!(rank_normalize_with_reference(2.5, &reference), 0.5);
        assert_eq!(rank_normalize_with_reference(3.0, &reference), 0.5);
        assert_eq!(rank_normalize_with_reference(10.0, &reference), 1.0);
        assert_eq!(rank_normalize_with_reference(1.0, &[]), 0.5);
    }
}
