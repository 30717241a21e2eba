//! Feature matrix stacking rolling ITH features from several lookbacks.
//!
//! One lookback contributes eight columns, one per [`RollingFeature`],
//! named by [`column_name`]. Short lookbacks react to the latest swings;
//! long ones describe the regime. Values stay in [0, 1] after each
//! lookback's NaN warm-up prefix.
//!
//! ```text
//! ith_rb250_lb20_bull_ed   ith_rb250_lb20_bear_ed   ...   ith_rb250_lb6000_max_ru
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, Result};
use crate::ith_rolling::{
    compute_rolling_ith, compute_rolling_ith_par, RollingFeature, RollingIthFeatures,
};

/// Which lookbacks to stack and how to label them.
///
/// `threshold_dbps` is the range-bar threshold of the source bars. It only
/// appears in column names (`ith_rb{threshold_dbps}_...`) so matrices built
/// from different bar sizes can be joined without collisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiscaleConfig {
    pub threshold_dbps: u32,
    /// Window sizes in bars, computed in this order.
    pub lookbacks: Vec<usize>,
    /// Spread window positions across the rayon pool.
    pub parallel: bool,
}

impl Default for MultiscaleConfig {
    fn default() -> Self {
        Self {
            threshold_dbps: 250,
            lookbacks: vec![20, 50, 100, 200, 500, 1000, 1500, 2000, 3000, 4000, 5000, 6000],
            parallel: true,
        }
    }
}

impl MultiscaleConfig {
    pub fn new(threshold_dbps: u32, lookbacks: Vec<usize>) -> Self {
        Self {
            threshold_dbps,
            lookbacks,
            ..Self::default()
        }
    }

    /// Custom lookbacks under the default 250 dbps label.
    pub fn with_lookbacks(lookbacks: Vec<usize>) -> Self {
        Self {
            lookbacks,
            ..Self::default()
        }
    }

    /// Lookbacks that fit a series of length `n`, in configured order.
    fn usable_lookbacks(&self, n: usize) -> impl Iterator<Item = usize> + '_ {
        self.lookbacks.iter().copied().filter(move |&lookback| {
            let usable = lookback > 0 && lookback <= n;
            if !usable && n > 0 {
                tracing::warn!(lookback, n, "skipping lookback outside series length");
            }
            usable
        })
    }

    fn rolling(&self, nav: &[f64], lookback: usize) -> Result<RollingIthFeatures> {
        if self.parallel {
            compute_rolling_ith_par(nav, lookback)
        } else {
            compute_rolling_ith(nav, lookback)
        }
    }
}

/// Column name for one (lookback, feature) pair.
///
/// ```rust
/// use ith_metrics::{column_name, RollingFeature};
///
/// assert_eq!(column_name(250, 100, RollingFeature::MaxDrawdown), "ith_rb250_lb100_max_dd");
/// ```
pub fn column_name(threshold_dbps: u32, lookback: usize, feature: RollingFeature) -> String {
    format!(
        "ith_rb{}_lb{}_{}",
        threshold_dbps,
        lookback,
        feature.short_name()
    )
}

/// Column-oriented feature matrix; every column has `n_points` rows.
///
/// Columns iterate in name order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiscaleIthFeatures {
    pub columns: BTreeMap<String, Vec<f64>>,
    /// Rows per column, equal to the NAV length.
    pub n_points: usize,
    pub n_features: usize,
    pub config: MultiscaleConfig,
}

impl MultiscaleIthFeatures {
    pub fn get(&self, column_name: &str) -> Option<&[f64]> {
        self.columns.get(column_name).map(Vec::as_slice)
    }

    /// Column names in iteration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// True when every value is either warm-up NaN or inside [0, 1].
    pub fn all_bounded(&self) -> bool {
        self.columns
            .values()
            .flatten()
            .all(|&v| v.is_nan() || (0.0..=1.0).contains(&v))
    }
}

/// Build the full feature matrix for `nav`.
///
/// Lookbacks that are zero or longer than the series are skipped with a
/// warning. An empty NAV yields zero columns.
///
/// # Errors
///
/// [`IthError::NonFiniteNav`](crate::IthError::NonFiniteNav) when `nav`
/// contains NaN or Inf.
///
/// # Example
///
/// ```rust
/// use ith_metrics::ith_multiscale::{compute_multiscale_ith, MultiscaleConfig};
///
/// let nav = [1.0, 1.02, 1.01, 1.04, 1.03, 1.06, 1.02, 1.05];
/// let config = MultiscaleConfig::new(500, vec![4, 8, 32]);
/// let features = compute_multiscale_ith(&nav, &config).unwrap();
///
/// // lb32 exceeds the series and is skipped
/// assert_eq!(features.n_features, 16);
/// assert_eq!(features.get("ith_rb500_lb8_max_dd").map(|c| c.len()), Some(8));
/// ```
pub fn compute_multiscale_ith(
    nav: &[f64],
    config: &MultiscaleConfig,
) -> Result<MultiscaleIthFeatures> {
    let mut columns = BTreeMap::new();

    compute_multiscale_ith_streaming(nav, config, |name, values| {
        columns.insert(name.to_string(), values.to_vec());
    })?;

    let n_features = columns.len();
    Ok(MultiscaleIthFeatures {
        columns,
        n_points: nav.len(),
        n_features,
        config: config.clone(),
    })
}

/// Same columns as [`compute_multiscale_ith`], handed to `callback` one at a time.
///
/// Each column is handed to `callback` as soon as its lookback finishes;
/// only one lookback's arrays are alive at a time.
///
/// # Example
///
/// ```rust
/// use ith_metrics::ith_multiscale::{compute_multiscale_ith_streaming, MultiscaleConfig};
///
/// let nav = [1.0, 0.98, 1.01, 0.97, 1.03, 1.0];
/// let config = MultiscaleConfig::with_lookbacks(vec![3]);
///
/// let mut widest = 0.0f64;
/// compute_multiscale_ith_streaming(&nav, &config, |name, column| {
///     if name.ends_with("_max_dd") {
///         widest = column.iter().copied().filter(|v| !v.is_nan()).fold(0.0, f64::max);
///     }
/// })
/// .unwrap();
/// assert!(widest > 0.0);
/// ```
pub fn compute_multiscale_ith_streaming<F>(
    nav: &[f64],
    config: &MultiscaleConfig,
    mut callback: F,
) -> Result<()>
where
    F: FnMut(&str, &[f64]),
{
    ensure_finite(nav)?;

    for lookback in config.usable_lookbacks(nav.len()) {
        let features = config.rolling(nav, lookback)?;
        for (feature, values) in features.iter() {
            callback(&column_name(config.threshold_dbps, lookback, feature), values);
        }
    }

    Ok(())
}
