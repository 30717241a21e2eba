//! Turning prices or returns into a NAV curve that starts at 1.0.

use crate::ith::safe_ratio;

/// Floor applied to per-bar returns so NAV never reaches a total wipeout.
const RETURN_FLOOR: f64 = -0.99;

/// NAV of a long position held across `closes`, one value per close.
///
/// Each bar's return is floored at -99% before compounding.
///
/// # Example
///
/// ```rust
/// use ith_metrics::build_nav_from_closes;
///
/// let nav = build_nav_from_closes(&[50.0, 55.0, 44.0]);
/// assert_eq!(nav[0], 1.0);
/// assert!((nav[2] - 0.88).abs() < 1e-12);
/// ```
pub fn build_nav_from_closes(closes: &[f64]) -> Vec<f64> {
    if closes.is_empty() {
        return vec![];
    }
    compound(compute_returns(closes))
}

/// Compound per-bar simple returns into a NAV.
///
/// Length is `returns.len() + 1`; the first value is 1.0.
pub fn build_nav_from_returns(returns: &[f64]) -> Vec<f64> {
    compound(returns.iter().copied())
}

fn compound(returns: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let returns = returns.into_iter();
    let mut nav = Vec::with_capacity(returns.size_hint().0 + 1);
    let mut level = 1.0;
    nav.push(level);

    for ret in returns {
        level = (level * (1.0 + ret.max(RETURN_FLOOR))).max(0.0);
        nav.push(level);
    }

    nav
}

/// Simple returns of a price or NAV series.
///
/// Length is `prices.len() - 1`. A zero previous level yields a 0.0 return.
pub fn compute_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| safe_ratio(w[1] - w[0], w[0]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closes_compound_from_one() {
        let nav = build_nav_from_closes(&[100.0, 110.0, 105.0, 115.0]);
        assert_eq!(nav[0], 1.0);
        assert!((nav[1] - 1.1).abs() < 1e-12);
        assert!((nav[3] - 1.15).abs() < 1e-12);
    }

    #[test]
    fn test_build_nav_from_closes_empty_and_single() {
        assert!(build_nav_from_closes(&[]).is_empty());
        assert_eq!(build_nav_from_closes(&[100.0]), vec![1.0]);
    }

    #[test]
    fn test_wipeout_return_floored() {
        let nav = build_nav_from_closes(&[100.0, 0.5]);
        assert!((nav[1] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_build_nav_from_closes_zero_close() {
        // Return off a zero close is treated as flat.
        let nav = build_nav_from_closes(&[100.0, 0.0, 50.0]);
        assert_eq!(nav.len(), 3);
        assert!(nav.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert_eq!(nav[2], nav[1]);
    }

    #[test]
    fn test_returns_compound() {
        let nav = build_nav_from_returns(&[0.10, -0.05, 0.08]);
        assert_eq!(nav.len(), 3 + 1);
        assert!((nav[1] - 1.1).abs() < 1e-12);
        assert!((nav[2] - 1.045).abs() < 1e-12);
    }

    #[test]
    fn test_no_returns_is_unit_nav() {
        assert_eq!(build_nav_from_returns(&[]), vec![1.0]);
    }

    #[test]
    fn test_simple_returns() {
        let returns = compute_returns(&[100.0, 110.0, 99.0]);
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_compute_returns_short_and_zero() {
        assert!(compute_returns(&[]).is_empty());
        assert!(compute_returns(&[100.0]).is_empty());
        assert_eq!(compute_returns(&[0.0, 5.0]), vec![0.0]);
    }
}
