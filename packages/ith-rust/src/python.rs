//! Python bindings for ith-metrics using PyO3.
//!
//! NumPy arrays in, NumPy arrays (or Arrow record batches) out. Caller
//! contract violations surface as `ValueError`.

#![cfg(feature = "python")]

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::cell::RefCell;

use crate::OnlineNormalizer;

fn as_slice<'a>(array: &'a PyReadonlyArray1<'_, f64>) -> PyResult<&'a [f64]> {
    array
        .as_slice()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

// ============================================================================
// NAV Utilities
// ============================================================================

/// Convert close prices into a NAV series starting at 1.0.
///
/// Per-bar returns are floored at -99%, so the NAV never turns negative.
/// An empty input gives an empty output.
#[pyfunction]
fn build_nav_from_closes<'py>(
    py: Python<'py>,
    closes: PyReadonlyArray1<f64>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let nav = crate::build_nav_from_closes(as_slice(&closes)?);
    Ok(PyArray1::from_vec(py, nav))
}

/// Volatility-scaled hysteresis threshold for a NAV series.
///
/// Args:
///     nav: at least 2 finite NAV values (float64)
///     lookback: window length the threshold is scaled to (> 0)
///
/// Returns:
///     1.4826 * MAD(returns) * 3 * sqrt(lookback), clamped to [0.0001, 0.50]
///
/// Example:
///     >>> nav = np.cumprod(1 + rng.normal(0, 0.01, 500))
///     >>> optimal_tmaeg(nav, lookback=100)
#[pyfunction]
fn optimal_tmaeg(nav: PyReadonlyArray1<f64>, lookback: usize) -> PyResult<f64> {
    Ok(crate::optimal_tmaeg(as_slice(&nav)?, lookback)?)
}

// ============================================================================
// ITH Analysis
// ============================================================================

/// Exposes a detector result to Python: scalar statistics as read-only
/// attributes, per-bar arrays as NumPy copies.
macro_rules! py_ith_result {
    ($py_ty:ident, $name:literal, $inner:ty, $excursion:ident) => {
        #[pyclass(name = $name)]
        #[derive(Clone)]
        pub struct $py_ty {
            #[pyo3(get)]
            pub num_of_epochs: usize,
            #[pyo3(get)]
            pub $excursion: f64,
            #[pyo3(get)]
            pub intervals_cv: f64,
            inner: $inner,
        }

        impl From<$inner> for $py_ty {
            fn from(result: $inner) -> Self {
                Self {
                    num_of_epochs: result.num_of_epochs,
                    $excursion: result.$excursion,
                    intervals_cv: result.intervals_cv,
                    inner: result,
                }
            }
        }

        #[pymethods]
        impl $py_ty {
            fn excess_gains<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
                PyArray1::from_slice(py, &self.inner.excess_gains)
            }

            fn excess_losses<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
                PyArray1::from_slice(py, &self.inner.excess_losses)
            }

            fn epochs<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<bool>> {
                PyArray1::from_slice(py, &self.inner.epochs)
            }

            /// Indices of bars flagged as epochs.
            fn epoch_indices(&self) -> Vec<usize> {
                self.inner.epoch_indices()
            }

            fn __len__(&self) -> usize {
                self.inner.len()
            }

            fn __repr__(&self) -> String {
                format!(
                    concat!($name, "(num_of_epochs={}, ", stringify!($excursion), "={:.4}, intervals_cv={:.4})"),
                    self.num_of_epochs, self.$excursion, self.intervals_cv
                )
            }
        }
    };
}

py_ith_result!(PyBullIthResult, "BullIthResult", crate::BullIthResult, max_drawdown);
py_ith_result!(PyBearIthResult, "BearIthResult", crate::BearIthResult, max_runup);

/// Bull ITH (long side) epoch detection.
///
/// Args:
///     nav: NAV series (float64); empty and single-value series are valid
///     tmaeg: Hysteresis threshold, positive and finite
///
/// Returns:
///     BullIthResult; `intervals_cv` is NaN when fewer than one epoch exists
#[pyfunction]
fn bull_ith(nav: PyReadonlyArray1<f64>, tmaeg: f64) -> PyResult<PyBullIthResult> {
    Ok(crate::bull_ith_checked(as_slice(&nav)?, tmaeg)?.into())
}

/// Bear ITH (short side) epoch detection, the reciprocal mirror of `bull_ith`.
///
/// Returns:
///     BearIthResult carrying `max_runup` instead of `max_drawdown`
#[pyfunction]
fn bear_ith(nav: PyReadonlyArray1<f64>, tmaeg: f64) -> PyResult<PyBearIthResult> {
    Ok(crate::bear_ith_checked(as_slice(&nav)?, tmaeg)?.into())
}

/// Coefficient of variation of epoch spacing (NaN when undefined).
#[pyfunction]
fn intervals_cv(epochs: PyReadonlyArray1<bool>) -> PyResult<f64> {
    let slice = epochs
        .as_slice()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(crate::intervals_cv(slice))
}

/// Rank-transform a batch into [0, 1]; ties share their average rank.
#[pyfunction]
fn rank_normalize<'py>(
    py: Python<'py>,
    values: PyReadonlyArray1<f64>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    Ok(PyArray1::from_vec(py, crate::rank_normalize(as_slice(&values)?)))
}

/// Fraction of a sorted reference sample strictly below `value`.
#[pyfunction]
fn rank_normalize_with_reference(value: f64, reference: PyReadonlyArray1<f64>) -> PyResult<f64> {
    Ok(crate::rank_normalize_with_reference(value, as_slice(&reference)?))
}

// ============================================================================
// Rolling Features
// ============================================================================

/// Eight per-bar feature arrays, NaN for the first `lookback - 1` bars and
/// inside [0, 1] afterwards. Each getter returns a fresh NumPy copy.
#[pyclass(name = "RollingIthFeatures")]
#[derive(Clone)]
pub struct PyRollingIthFeatures {
    inner: crate::RollingIthFeatures,
}

impl PyRollingIthFeatures {
    fn array<'py>(
        &self,
        py: Python<'py>,
        feature: crate::RollingFeature,
    ) -> Bound<'py, PyArray1<f64>> {
        PyArray1::from_slice(py, self.inner.get(feature))
    }
}

#[pymethods]
impl PyRollingIthFeatures {
    #[getter]
    fn bull_epoch_density<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::BullEpochDensity)
    }

    #[getter]
    fn bear_epoch_density<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::BearEpochDensity)
    }

    #[getter]
    fn bull_excess_gain<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::BullExcessGain)
    }

    #[getter]
    fn bear_excess_gain<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::BearExcessGain)
    }

    #[getter]
    fn bull_cv<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::BullCv)
    }

    #[getter]
    fn bear_cv<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::BearCv)
    }

    #[getter]
    fn max_drawdown<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::MaxDrawdown)
    }

    #[getter]
    fn max_runup<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.array(py, crate::RollingFeature::MaxRunup)
    }

    #[getter]
    fn lookback(&self) -> usize {
        self.inner.lookback
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "RollingIthFeatures(len={}, lookback={}, features=8)",
            self.inner.len(),
            self.inner.lookback
        )
    }
}

/// Rolling bull/bear features over trailing windows of `lookback` bars.
///
/// Every window gets its own volatility-derived threshold. The GIL is
/// released while windows are evaluated.
///
/// Args:
///     nav: finite NAV values (float64)
///     lookback: window length, 1 <= lookback <= len(nav)
///     parallel: evaluate windows on the rayon pool (default: True);
///         results are identical either way
///
/// Raises:
///     ValueError: empty or non-finite NAV, or an out-of-range lookback
#[pyfunction]
#[pyo3(signature = (nav, lookback, parallel=true))]
fn compute_rolling_ith(
    py: Python<'_>,
    nav: PyReadonlyArray1<f64>,
    lookback: usize,
    parallel: bool,
) -> PyResult<PyRollingIthFeatures> {
    let slice = as_slice(&nav)?;
    let features = py.allow_threads(|| {
        if parallel {
            crate::compute_rolling_ith_par(slice, lookback)
        } else {
            crate::compute_rolling_ith(slice, lookback)
        }
    })?;
    Ok(PyRollingIthFeatures { inner: features })
}

// ============================================================================
// Stateful Normalizers
// ============================================================================

/// Wraps an [`OnlineNormalizer`] in a single-threaded Python class.
///
/// Instances keep per-stream state, so they are `unsendable`: a Python
/// object is bound to the thread that created it.
macro_rules! py_normalizer {
    ($py_ty:ident, $name:literal, $inner:ty, { $($extra:tt)* }) => {
        #[pyclass(name = $name, unsendable)]
        pub struct $py_ty {
            inner: RefCell<$inner>,
        }

        #[pymethods]
        impl $py_ty {
            $($extra)*

            /// Absorb `raw` and return its value in (0, 1); NaN/Inf return 0.5.
            fn normalize(&self, raw: f64) -> f64 {
                self.inner.borrow_mut().normalize(raw)
            }

            /// Forget every observation.
            fn reset(&self) {
                self.inner.borrow_mut().reset();
            }

            fn __repr__(&self) -> String {
                format!("{}({:?})", $name, self.inner.borrow())
            }
        }
    };
}

py_normalizer!(PyEmaNormalizer, "EmaNormalizer", crate::EmaNormalizer, {
    /// Args:
    ///     expected_len: Sequence length the decay is tuned to (default 100)
    #[new]
    #[pyo3(signature = (expected_len=100))]
    fn new(expected_len: usize) -> Self {
        Self {
            inner: RefCell::new(crate::EmaNormalizer::new(expected_len)),
        }
    }

    #[getter]
    fn decay(&self) -> f64 {
        self.inner.borrow().decay()
    }
});

py_normalizer!(PyWelfordNormalizer, "WelfordNormalizer", crate::WelfordNormalizer, {
    #[new]
    fn new() -> Self {
        Self {
            inner: RefCell::new(crate::WelfordNormalizer::new()),
        }
    }

    /// Current (mean, std, count).
    fn stats(&self) -> (f64, f64, u64) {
        self.inner.borrow().stats()
    }
});

py_normalizer!(PyRobustNormalizer, "RobustNormalizer", crate::RobustNormalizer, {
    #[new]
    fn new() -> Self {
        Self {
            inner: RefCell::new(crate::RobustNormalizer::new()),
        }
    }

    /// Running (median, IQR) estimates.
    fn quartiles(&self) -> (f64, f64) {
        let inner = self.inner.borrow();
        (inner.median(), inner.iqr())
    }
});

// ============================================================================
// Multi-Scale Feature Matrix
// ============================================================================

/// Lookback ladder and column label for `compute_multiscale_ith`.
#[pyclass(name = "MultiscaleIthConfig")]
#[derive(Clone)]
pub struct PyMultiscaleConfig {
    inner: crate::MultiscaleConfig,
}

#[pymethods]
impl PyMultiscaleConfig {
    /// Args:
    ///     threshold_dbps: label used in column names, no effect on values
    ///     lookbacks: window sizes in bars (default: 20..6000 ladder)
    ///     parallel: evaluate windows on the rayon pool (default: True)
    #[new]
    #[pyo3(signature = (threshold_dbps=250, lookbacks=None, parallel=true))]
    fn new(threshold_dbps: u32, lookbacks: Option<Vec<usize>>, parallel: bool) -> Self {
        let mut inner = crate::MultiscaleConfig {
            threshold_dbps,
            parallel,
            ..crate::MultiscaleConfig::default()
        };
        if let Some(lookbacks) = lookbacks {
            inner.lookbacks = lookbacks;
        }
        Self { inner }
    }

    /// Load from defaults, `ith.toml` and `ITH_*` environment variables.
    #[staticmethod]
    fn from_settings() -> PyResult<Self> {
        Ok(Self {
            inner: crate::IthSettings::load()?.multiscale,
        })
    }

    #[getter]
    fn threshold_dbps(&self) -> u32 {
        self.inner.threshold_dbps
    }

    #[getter]
    fn lookbacks(&self) -> Vec<usize> {
        self.inner.lookbacks.clone()
    }

    #[getter]
    fn parallel(&self) -> bool {
        self.inner.parallel
    }

    fn __repr__(&self) -> String {
        format!(
            "MultiscaleIthConfig(threshold_dbps={}, lookbacks={:?}, parallel={})",
            self.inner.threshold_dbps, self.inner.lookbacks, self.inner.parallel
        )
    }
}

/// Name-ordered feature columns, readable one at a time with `get` or all at
/// once as an Arrow record batch.
#[pyclass(name = "MultiscaleIthFeatures")]
#[derive(Clone)]
pub struct PyMultiscaleIthFeatures {
    inner: crate::MultiscaleIthFeatures,
}

#[pymethods]
impl PyMultiscaleIthFeatures {
    /// Arrow RecordBatch (PyCapsule interface), e.g. `pl.from_arrow(f.to_arrow())`.
    fn to_arrow(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        use arrow_array::{ArrayRef, Float64Array, RecordBatch};
        use arrow_schema::{DataType, Field, Schema};
        use pyo3_arrow::PyRecordBatch;
        use std::sync::Arc;

        // BTreeMap iteration is already name-ordered.
        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = self
            .inner
            .columns
            .iter()
            .map(|(name, values)| {
                (
                    Field::new(name, DataType::Float64, true),
                    Arc::new(Float64Array::from(values.clone())) as ArrayRef,
                )
            })
            .unzip();

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| PyValueError::new_err(format!("cannot assemble feature batch: {e}")))?;

        Ok(PyRecordBatch::new(batch).into_pyobject(py)?.into_any().unbind())
    }

    fn get<'py>(&self, py: Python<'py>, column_name: &str) -> PyResult<Bound<'py, PyArray1<f64>>> {
        self.inner
            .get(column_name)
            .map(|v| PyArray1::from_slice(py, v))
            .ok_or_else(|| PyValueError::new_err(format!("no feature column named '{column_name}'")))
    }

    fn column_names(&self) -> Vec<String> {
        self.inner.column_names()
    }

    #[getter]
    fn n_points(&self) -> usize {
        self.inner.n_points
    }

    #[getter]
    fn n_features(&self) -> usize {
        self.inner.n_features
    }

    fn all_bounded(&self) -> bool {
        self.inner.all_bounded()
    }

    #[getter]
    fn config(&self) -> PyMultiscaleConfig {
        PyMultiscaleConfig {
            inner: self.inner.config.clone(),
        }
    }

    fn __len__(&self) -> usize {
        self.inner.n_points
    }

    fn __repr__(&self) -> String {
        format!(
            "MultiscaleIthFeatures(n_points={}, n_features={})",
            self.inner.n_points, self.inner.n_features
        )
    }
}

/// Stack rolling features for every configured lookback into one matrix.
///
/// Columns are named `ith_rb{threshold}_lb{lookback}_{feature}`. Lookbacks
/// that are zero or longer than `nav` are skipped; an empty `nav` yields no
/// columns.
///
/// Args:
///     nav: finite NAV values (float64)
///     config: MultiscaleIthConfig, default MultiscaleIthConfig()
#[pyfunction]
#[pyo3(signature = (nav, config=None))]
fn compute_multiscale_ith(
    py: Python<'_>,
    nav: PyReadonlyArray1<f64>,
    config: Option<&PyMultiscaleConfig>,
) -> PyResult<PyMultiscaleIthFeatures> {
    let slice = as_slice(&nav)?;
    let rust_config = config.map(|cfg| cfg.inner.clone()).unwrap_or_default();
    let features = py.allow_threads(|| crate::compute_multiscale_ith(slice, &rust_config))?;
    Ok(PyMultiscaleIthFeatures { inner: features })
}

// ============================================================================
// Module Definition
// ============================================================================

/// Python module for ith-metrics.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // NAV and threshold
    m.add_function(wrap_pyfunction!(build_nav_from_closes, m)?)?;
    m.add_function(wrap_pyfunction!(optimal_tmaeg, m)?)?;

    // ITH analysis
    m.add_function(wrap_pyfunction!(bull_ith, m)?)?;
    m.add_function(wrap_pyfunction!(bear_ith, m)?)?;
    m.add_function(wrap_pyfunction!(intervals_cv, m)?)?;

    // Rolling and multi-scale features
    m.add_function(wrap_pyfunction!(compute_rolling_ith, m)?)?;
    m.add_function(wrap_pyfunction!(compute_multiscale_ith, m)?)?;
    m.add_function(wrap_pyfunction!(rank_normalize, m)?)?;
    m.add_function(wrap_pyfunction!(rank_normalize_with_reference, m)?)?;

    // Classes
    m.add_class::<PyBullIthResult>()?;
    m.add_class::<PyBearIthResult>()?;
    m.add_class::<PyRollingIthFeatures>()?;
    m.add_class::<PyEmaNormalizer>()?;
    m.add_class::<PyWelfordNormalizer>()?;
    m.add_class::<PyRobustNormalizer>()?;
    m.add_class::<PyMultiscaleConfig>()?;
    m.add_class::<PyMultiscaleIthFeatures>()?;

    Ok(())
}
