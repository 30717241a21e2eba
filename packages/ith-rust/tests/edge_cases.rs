//! Calibrated fixtures for the ITH detectors.
//!
//! Each fixture pins exact epoch positions so that a change in the order of
//! operations inside the state machine (compare, update, test reset) shows up
//! as a failing index rather than a drifting statistic.

use ith_metrics::{
    bear_ith, bear_ith_checked, bull_ith, bull_ith_checked, compute_multiscale_ith,
    compute_rolling_ith, intervals_cv, max_drawdown, max_runup, optimal_tmaeg, window_features,
    EmaNormalizer, IthError, MultiscaleConfig, OnlineNormalizer, RobustNormalizer,
    WelfordNormalizer, TMAEG_MAX, TMAEG_MIN,
};

const TMAEG: f64 = 0.05;

const DECLINE: [f64; 13] = [
    100.0, 98.5, 97.0, 99.0, 96.5, 94.0, 95.5, 92.0, 90.0, 88.0, 85.0, 83.0, 80.0,
];
const RALLY: [f64; 13] = [
    100.0, 102.0, 104.5, 103.0, 106.0, 108.5, 107.0, 110.0, 113.0, 111.5, 115.0, 118.0, 120.0,
];
const V_RECOVERY: [f64; 9] = [100.0, 95.0, 90.0, 85.0, 88.0, 92.0, 96.0, 100.0, 103.0];
const ZIGZAG_DOWN: [f64; 12] = [
    100.0, 97.0, 94.0, 96.0, 93.0, 90.0, 92.5, 89.0, 86.0, 88.0, 84.0, 80.0,
];
const ZIGZAG_UP: [f64; 12] = [
    100.0, 103.0, 106.0, 104.0, 107.0, 110.0, 108.0, 112.0, 116.0, 114.0, 118.0, 122.0,
];
const FLAT: [f64; 12] = [
    100.0, 101.0, 99.5, 100.5, 99.0, 100.2, 99.8, 100.3, 99.7, 100.1, 99.9, 100.0,
];
const CRASH: [f64; 9] = [100.0, 92.0, 85.0, 80.0, 86.0, 88.0, 82.0, 75.0, 70.0];
const REALISTIC: [f64; 20] = [
    1000000.0, 999243.71, 995245.88, 999479.32, 1002259.82, 1001696.80, 1004082.15, 1005438.37,
    1009837.56, 1004579.17, 1005350.70, 1010882.14, 1013760.97, 1013422.41, 1015956.16,
    1020303.82, 1017128.50, 1023367.31, 1023868.23, 1022348.99,
];
const BOUNDARY: [f64; 4] = [100.0, 105.0, 104.0, 109.2];

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-12,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Calibrated epoch positions
// ============================================================================

#[test]
fn pure_decline() {
    assert!(bull_ith(&DECLINE, TMAEG).epoch_indices().is_empty());
    let bear = bear_ith(&DECLINE, TMAEG);
    assert_eq!(bear.epoch_indices(), vec![5, 9, 11]);
    assert_close(bear.intervals_cv, 0.34015067152490375);
}

#[test]
fn pure_rally() {
    let bull = bull_ith(&RALLY, TMAEG);
    assert_eq!(bull.epoch_indices(), vec![4, 8, 12]);
    assert_eq!(bull.num_of_epochs, 3);
    // Evenly spaced anchors 0, 4, 8, 12
    assert_close(bull.intervals_cv, 0.0);
    assert!(bear_ith(&RALLY, TMAEG).epoch_indices().is_empty());
}

#[test]
fn v_recovery() {
    assert!(bull_ith(&V_RECOVERY, TMAEG).epoch_indices().is_empty());
    assert_eq!(bear_ith(&V_RECOVERY, TMAEG).epoch_indices(), vec![1, 2, 3]);
}

#[test]
fn zigzag_down() {
    assert!(bull_ith(&ZIGZAG_DOWN, TMAEG).epoch_indices().is_empty());
    let bear = bear_ith(&ZIGZAG_DOWN, TMAEG);
    assert_eq!(bear.epoch_indices(), vec![2, 7, 10, 11]);
    assert_close(bear.intervals_cv, 0.5378254348272379);
}

#[test]
fn zigzag_up() {
    let bull = bull_ith(&ZIGZAG_UP, TMAEG);
    assert_eq!(bull.epoch_indices(), vec![2, 7, 10]);
    assert_close(bull.intervals_cv, 0.3741657386773941);
    assert!(bear_ith(&ZIGZAG_UP, TMAEG).epoch_indices().is_empty());
}

#[test]
fn flat_noise_has_no_epochs() {
    assert_eq!(bull_ith(&FLAT, TMAEG).num_of_epochs, 0);
    assert_eq!(bear_ith(&FLAT, TMAEG).num_of_epochs, 0);
    assert!(bull_ith(&FLAT, TMAEG).intervals_cv.is_nan());
}

#[test]
fn crash_with_dead_cat_bounce() {
    assert!(bull_ith(&CRASH, TMAEG).epoch_indices().is_empty());
    let bear = bear_ith(&CRASH, TMAEG);
    assert_eq!(bear.epoch_indices(), vec![1, 2, 3, 8]);
    assert_close(bear.intervals_cv, 0.8660254037844386);
}

#[test]
fn realistic_drift() {
    assert_eq!(bull_ith(&REALISTIC, 0.02).epoch_indices(), vec![15]);
    assert!(bear_ith(&REALISTIC, 0.02).epoch_indices().is_empty());
}

#[test]
fn boundary_gain_measured_from_endorsed_crest() {
    // After the bar-1 re-anchor the crest is 105, so 109.2 clears only 4%.
    let bull = bull_ith(&BOUNDARY, TMAEG);
    assert_eq!(bull.epoch_indices(), vec![1]);
    assert!(bear_ith(&BOUNDARY, TMAEG).epoch_indices().is_empty());
}

#[test]
fn mirror_swaps_bull_and_bear() {
    let nav = [100.0, 105.0, 103.0, 108.0, 106.0, 112.0, 110.0, 115.0];
    let mirrored: Vec<f64> = nav.iter().map(|v| 215.0 - v).collect();

    let bull = bull_ith(&nav, TMAEG);
    assert_eq!(bull.epoch_indices(), vec![1, 5]);
    assert_close(bull.intervals_cv, 0.6);
    assert!(bear_ith(&nav, TMAEG).epoch_indices().is_empty());

    let bear = bear_ith(&mirrored, TMAEG);
    assert_eq!(bear.epoch_indices(), vec![3, 7]);
    assert!(bull_ith(&mirrored, TMAEG).epoch_indices().is_empty());

    assert_eq!(bull.num_of_epochs, bear.num_of_epochs);
}

#[test]
fn bear_is_bull_on_reciprocal() {
    let reciprocal: Vec<f64> = CRASH.iter().map(|v| 1.0 / v).collect();
    assert_eq!(
        bear_ith(&CRASH, TMAEG).epoch_indices(),
        bull_ith(&reciprocal, TMAEG).epoch_indices()
    );
}

// ============================================================================
// Short series and sentinels
// ============================================================================

#[test]
fn empty_and_single_point_series() {
    for nav in [&[][..], &[42.0][..]] {
        let bull = bull_ith(nav, TMAEG);
        let bear = bear_ith(nav, TMAEG);
        assert_eq!(bull.num_of_epochs, 0);
        assert_eq!(bear.num_of_epochs, 0);
        assert!(bull.intervals_cv.is_nan());
        assert!(bear.intervals_cv.is_nan());
        assert_eq!(bull.len(), nav.len());
        assert_eq!(bull.max_drawdown, 0.0);
        assert_eq!(bear.max_runup, 0.0);
    }
}

#[test]
fn zero_nav_values_stay_finite() {
    let nav = [0.0, 0.0, 1.0, 0.0, 2.0];
    let bull = bull_ith(&nav, TMAEG);
    let bear = bear_ith(&nav, TMAEG);
    assert!(bull.excess_gains.iter().chain(&bull.excess_losses).all(|v| v.is_finite()));
    assert!(bear.excess_gains.iter().chain(&bear.excess_losses).all(|v| v.is_finite()));
}

#[test]
fn intervals_cv_sentinels() {
    assert!(intervals_cv(&[]).is_nan());
    assert!(intervals_cv(&[false, false, false]).is_nan());
    // Single epoch: one interval, zero spread
    assert_eq!(intervals_cv(&[false, false, true]), 0.0);
}

#[test]
fn checked_detectors_reject_bad_thresholds() {
    for threshold in [0.0, -0.1, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            bull_ith_checked(&RALLY, threshold),
            Err(IthError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            bear_ith_checked(&RALLY, threshold),
            Err(IthError::InvalidThreshold { .. })
        ));
    }
    let checked = bull_ith_checked(&RALLY, TMAEG).unwrap();
    assert_eq!(checked.epochs, bull_ith(&RALLY, TMAEG).epochs);
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn scenario_steady_climb_flags_first_move() {
    let bull = bull_ith(&[100.0, 110.0, 120.0], TMAEG);
    assert_eq!(bull.excess_gains[0], 0.0);
    assert!(bull.excess_gains[1] > 0.0);
    assert!(bull.num_of_epochs >= 1);
}

#[test]
fn scenario_steady_decline_has_no_bull_epoch() {
    let bull = bull_ith(&[100.0, 90.0, 80.0], TMAEG);
    assert!(bull.excess_losses[2] > 0.0);
    assert_eq!(bull.num_of_epochs, 0);
}

#[test]
fn scenario_drawdown_from_peak() {
    let nav = [100.0, 110.0, 100.0, 80.0, 90.0];
    let expected = 1.0 - 80.0 / 110.0;
    assert!((bull_ith(&nav, TMAEG).max_drawdown - expected).abs() < 1e-10);
    assert!((max_drawdown(&nav) - expected).abs() < 1e-10);
    // Runup measured from the 80 trough to the 90 rebound
    assert!((max_runup(&nav) - (1.0 - 80.0 / 90.0)).abs() < 1e-10);
}

#[test]
fn scenario_threshold_always_clamped() {
    let constant = vec![1.0; 50];
    assert_eq!(optimal_tmaeg(&constant, 20).unwrap(), TMAEG_MIN);

    let wild = [1.0, 3.0, 0.5, 4.0, 0.2, 5.0];
    assert_eq!(optimal_tmaeg(&wild, 1000).unwrap(), TMAEG_MAX);

    for lookback in [1, 10, 100, 1000] {
        let t = optimal_tmaeg(&REALISTIC, lookback).unwrap();
        assert!((TMAEG_MIN..=TMAEG_MAX).contains(&t));
    }
}

#[test]
fn scenario_reset_replays_first_output() {
    let mut normalizers: Vec<Box<dyn OnlineNormalizer>> = vec![
        Box::new(EmaNormalizer::new(20)),
        Box::new(WelfordNormalizer::new()),
        Box::new(RobustNormalizer::new()),
    ];
    for normalizer in normalizers.iter_mut() {
        let first = normalizer.normalize(0.3);
        for raw in [0.1, 0.9, 0.4, 0.7, 0.2, 0.8] {
            normalizer.normalize(raw);
        }
        normalizer.reset();
        assert_eq!(normalizer.normalize(0.3), first);
    }
}

// ============================================================================
// Rolling and multi-scale contracts
// ============================================================================

#[test]
fn rolling_invalid_input_is_an_error_not_nan() {
    assert!(matches!(compute_rolling_ith(&[], 5), Err(IthError::EmptyNav)));
    assert!(matches!(
        compute_rolling_ith(&RALLY, 0),
        Err(IthError::InvalidLookback { lookback: 0 })
    ));
    assert!(matches!(
        compute_rolling_ith(&RALLY, 14),
        Err(IthError::LookbackExceedsLength { lookback: 14, len: 13 })
    ));
    let mut poisoned = RALLY.to_vec();
    poisoned[6] = f64::NAN;
    let err = compute_rolling_ith(&poisoned, 5).unwrap_err();
    assert!(matches!(err, IthError::NonFiniteNav { index: 6, .. }));
    assert!(err.is_invalid_input());
}

#[test]
fn rolling_full_window_matches_direct_detection() {
    let features = compute_rolling_ith(&CRASH, CRASH.len()).unwrap();
    let last = CRASH.len() - 1;
    let single = window_features(&CRASH, CRASH.len(), last).unwrap();

    assert_eq!(features.bear_epoch_density[last], single.bear_epoch_density);
    assert_eq!(features.max_drawdown[last], single.max_drawdown);
    assert!(features.max_runup[..last].iter().all(|v| v.is_nan()));

    let direct = bull_ith(&CRASH, single.tmaeg);
    assert_eq!(single.max_drawdown, direct.max_drawdown.clamp(0.0, 1.0));
}

#[test]
fn window_features_rejects_positions_without_history() {
    assert!(matches!(
        window_features(&RALLY, 5, 3),
        Err(IthError::InsufficientData { required: 5, actual: 4 })
    ));
    assert!(matches!(
        window_features(&RALLY, 5, 13),
        Err(IthError::InsufficientData { .. })
    ));
}

#[test]
fn multiscale_skips_lookbacks_past_series_end() {
    let config = MultiscaleConfig::new(250, vec![0, 4, 13, 50]);
    let features = compute_multiscale_ith(&RALLY, &config).unwrap();

    assert_eq!(features.n_features, 16);
    assert!(features.get("ith_rb250_lb4_bull_ed").is_some());
    assert!(features.get("ith_rb250_lb13_max_ru").is_some());
    assert!(features.get("ith_rb250_lb50_bull_ed").is_none());
    assert!(features.all_bounded());
}

#[test]
fn multiscale_empty_nav_has_no_columns() {
    let features = compute_multiscale_ith(&[], &MultiscaleConfig::default()).unwrap();
    assert_eq!(features.n_points, 0);
    assert_eq!(features.n_features, 0);
}
