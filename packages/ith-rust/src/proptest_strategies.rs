//! NAV-shaped proptest strategies shared by the in-crate property tests.
#![cfg(test)]

use proptest::prelude::*;

/// Multiplicative random walk starting at 1.0 with a 0.01 floor.
///
/// Per-step returns stay within ±8%. Always yields exactly `n.max(1)` values.
pub fn realistic_nav(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.08f64..0.08, n.saturating_sub(1)).prop_map(|returns| {
        returns
            .into_iter()
            .scan(1.0f64, |nav, r| {
                *nav = (*nav * (1.0 + r)).max(0.01);
                Some(*nav)
            })
            .fold(vec![1.0], |mut acc, v| {
                acc.push(v);
                acc
            })
    })
}

/// Geometric series with a constant per-bar drift, rising or falling.
pub fn trending_nav(n: usize) -> impl Strategy<Value = Vec<f64>> {
    (0.5f64..2.0, prop_oneof![0.97f64..0.995, 1.005f64..1.03])
        .prop_map(move |(start, drift)| (0..n).map(|i| start * drift.powi(i as i32)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn realistic_nav_has_requested_length_and_floor() {
        let mut runner = TestRunner::default();
        let strategy = realistic_nav(64);

        for _ in 0..10 {
            let nav = strategy.new_tree(&mut runner).unwrap().current();
            assert_eq!(nav.len(), 64);
            assert_eq!(nav[0], 1.0);
            assert!(nav.iter().all(|&v| v >= 0.01 && v.is_finite()));
        }
    }

    #[test]
    fn trending_nav_is_monotonic() {
        let mut runner = TestRunner::default();
        let strategy = trending_nav(40);

        for _ in 0..10 {
            let nav = strategy.new_tree(&mut runner).unwrap().current();
            let rising = nav[1] > nav[0];
            for w in nav.windows(2) {
                assert_eq!(w[1] > w[0], rising, "trend flipped direction");
            }
        }
    }
}
