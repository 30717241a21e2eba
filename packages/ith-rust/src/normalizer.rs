//! Stateful online normalizers mapping a raw stream into (0, 1).
//!
//! Every normalizer is causal: the output for an observation depends only on
//! that observation and the ones fed before it. Instances are owned by one
//! stream at a time; mutation goes through `&mut self`.

use serde::{Deserialize, Serialize};

use crate::adaptive::relative_epsilon;
use crate::ith_normalize::{logistic_sigmoid, open_unit};

/// Output for the first observation and for ignored (non-finite) input.
pub const NEUTRAL: f64 = 0.5;

/// Streaming normalizer into the open interval (0, 1).
pub trait OnlineNormalizer {
    /// Absorb `raw` and return its normalized value, never exactly 0 or 1.
    ///
    /// Non-finite input leaves the state untouched and returns [`NEUTRAL`].
    fn normalize(&mut self, raw: f64) -> f64;

    /// Return to the freshly constructed state.
    fn reset(&mut self);
}

#[inline]
fn squash(z: f64) -> f64 {
    if z.is_nan() {
        return NEUTRAL;
    }
    open_unit(logistic_sigmoid(z, 0.0, 1.0))
}

/// Decay = 1 - 2/(n+1), an EMA half-life of roughly n/2 samples.
#[inline]
fn decay_for(expected_len: usize) -> f64 {
    1.0 - 2.0 / (expected_len.max(1) as f64 + 1.0)
}

// ============================================================================
// EMA Normalizer
// ============================================================================

/// Z-score against exponentially weighted mean and variance.
///
/// Adapts to regime changes over roughly `expected_len` observations.
///
/// # Example
///
/// ```rust
/// use ith_metrics::{EmaNormalizer, OnlineNormalizer};
///
/// let mut norm = EmaNormalizer::new(100);
/// assert_eq!(norm.normalize(0.02), 0.5);
/// let v = norm.normalize(0.05);
/// assert!(v > 0.5 && v < 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct EmaNormalizer {
    ema_mean: f64,
    ema_variance: f64,
    decay: f64,
    initialized: bool,
}

impl EmaNormalizer {
    /// Create with adaptive decay factor based on expected sequence length.
    pub fn new(expected_len: usize) -> Self {
        Self::with_decay(decay_for(expected_len))
    }

    /// Create with explicit decay factor, clamped to [0, 1].
    pub fn with_decay(decay: f64) -> Self {
        Self {
            ema_mean: 0.0,
            ema_variance: 1.0,
            decay: decay.clamp(0.0, 1.0),
            initialized: false,
        }
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Current `(mean, std)` estimate.
    pub fn stats(&self) -> (f64, f64) {
        (self.ema_mean, self.ema_variance.sqrt())
    }
}

impl OnlineNormalizer for EmaNormalizer {
    fn normalize(&mut self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return NEUTRAL;
        }

        if !self.initialized {
            let seed_variance = raw * raw;
            if seed_variance.is_finite() {
                self.ema_mean = raw;
                self.ema_variance = seed_variance;
                self.initialized = true;
            }
            return NEUTRAL;
        }

        let mean = self.decay * self.ema_mean + (1.0 - self.decay) * raw;
        let sq_diff = (raw - mean).powi(2);
        let variance = self.decay * self.ema_variance + (1.0 - self.decay) * sq_diff;

        // An update that overflows is scored against the prior state, not absorbed.
        if mean.is_finite() && variance.is_finite() {
            self.ema_mean = mean;
            self.ema_variance = variance;
        }

        let std = self.ema_variance.sqrt().max(relative_epsilon(self.ema_mean));
        squash((raw - self.ema_mean) / std)
    }

    fn reset(&mut self) {
        self.ema_mean = 0.0;
        self.ema_variance = 1.0;
        self.initialized = false;
    }
}

// ============================================================================
// Welford Normalizer
// ============================================================================

/// Z-score against the running mean and sample variance (Welford).
///
/// Single pass, no history stored. Variance is taken as 1 until two
/// observations exist.
#[derive(Debug, Clone, Default)]
pub struct WelfordNormalizer {
    mean: f64,
    m2: f64,
    count: u64,
}

impl WelfordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    /// Current `(mean, std, count)`; std is 0 before two observations.
    pub fn stats(&self) -> (f64, f64, u64) {
        (self.mean, self.variance().unwrap_or(0.0).sqrt(), self.count)
    }
}

impl OnlineNormalizer for WelfordNormalizer {
    fn normalize(&mut self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return NEUTRAL;
        }

        let count = self.count + 1;
        let delta = raw - self.mean;
        let mean = self.mean + delta / count as f64;
        let m2 = self.m2 + delta * (raw - mean);

        if mean.is_finite() && m2.is_finite() {
            self.count = count;
            self.mean = mean;
            self.m2 = m2;
        }

        let std = self
            .variance()
            .unwrap_or(1.0)
            .sqrt()
            .max(relative_epsilon(self.mean));
        squash((raw - self.mean) / std)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// P-Square Quantile Estimator
// ============================================================================

/// P² online quantile estimator (Jain & Chlamtac, 1985).
///
/// Five markers, O(1) space and update; no observations are stored.
#[derive(Debug, Clone)]
pub struct PSquareQuantile {
    /// Marker heights.
    heights: [f64; 5],
    /// Actual marker positions.
    positions: [f64; 5],
    /// Desired marker positions.
    desired: [f64; 5],
    /// Desired position increments.
    increments: [f64; 5],
    count: usize,
    p: f64,
}

impl PSquareQuantile {
    /// Estimator for percentile `p`, clamped to [0, 1].
    pub fn new(p: f64) -> Self {
        let p = p.clamp(0.0, 1.0);
        Self {
            heights: [0.0; 5],
            positions: [1.0, 2.0, 3.0, 4.0, 5.0],
            desired: [1.0, 1.0 + 2.0 * p, 1.0 + 4.0 * p, 3.0 + 2.0 * p, 5.0],
            increments: [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0],
            count: 0,
            p,
        }
    }

    pub fn median() -> Self {
        Self::new(0.5)
    }

    pub fn q1() -> Self {
        Self::new(0.25)
    }

    pub fn q3() -> Self {
        Self::new(0.75)
    }

    /// Absorb one observation.
    pub fn update(&mut self, x: f64) {
        self.count += 1;

        if self.count <= 5 {
            self.heights[self.count - 1] = x;
            if self.count == 5 {
                self.heights.sort_unstable_by(f64::total_cmp);
            }
            return;
        }

        // Cell k such that heights[k] <= x < heights[k + 1]
        let k = if x < self.heights[0] {
            self.heights[0] = x;
            0
        } else if x >= self.heights[4] {
            self.heights[4] = x;
            3
        } else {
            (1..4).take_while(|&i| x >= self.heights[i]).count()
        };

        for position in &mut self.positions[k + 1..] {
            *position += 1.0;
        }
        for (desired, increment) in self.desired.iter_mut().zip(&self.increments) {
            *desired += increment;
        }

        for i in 1..4 {
            let d = self.desired[i] - self.positions[i];
            let room_up = self.positions[i + 1] - self.positions[i] > 1.0;
            let room_down = self.positions[i - 1] - self.positions[i] < -1.0;

            if (d >= 1.0 && room_up) || (d <= -1.0 && room_down) {
                let step = d.signum();
                let candidate = self.parabolic(i, step);
                self.heights[i] =
                    if self.heights[i - 1] < candidate && candidate < self.heights[i + 1] {
                        candidate
                    } else {
                        self.linear(i, step)
                    };
                self.positions[i] += step;
            }
        }
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let (q, n) = (&self.heights, &self.positions);
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        self.heights[i]
            + d * (self.heights[j] - self.heights[i]) / (self.positions[j] - self.positions[i])
    }

    /// Current estimate; NaN before any observation.
    ///
    /// With fewer than five observations, the nearest-rank value of the
    /// stored sample.
    pub fn quantile(&self) -> f64 {
        match self.count {
            0 => f64::NAN,
            1..=4 => {
                let mut sorted = self.heights[..self.count].to_vec();
                sorted.sort_unstable_by(f64::total_cmp);
                let idx = ((self.count - 1) as f64 * self.p).round() as usize;
                sorted[idx.min(self.count - 1)]
            }
            _ => self.heights[2],
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

// ============================================================================
// Robust (IQR) Normalizer
// ============================================================================

/// Robust z-score `(x - median) / (IQR / 1.35)` from P² quartile estimates.
///
/// Returns [`NEUTRAL`] until five observations exist.
#[derive(Debug, Clone)]
pub struct RobustNormalizer {
    q1: PSquareQuantile,
    median: PSquareQuantile,
    q3: PSquareQuantile,
}

impl RobustNormalizer {
    /// Normal-consistency divisor turning an IQR into a sigma.
    const IQR_TO_SIGMA: f64 = 1.35;

    pub fn new() -> Self {
        Self {
            q1: PSquareQuantile::q1(),
            median: PSquareQuantile::median(),
            q3: PSquareQuantile::q3(),
        }
    }

    pub fn median(&self) -> f64 {
        self.median.quantile()
    }

    pub fn iqr(&self) -> f64 {
        self.q3.quantile() - self.q1.quantile()
    }

    pub fn count(&self) -> usize {
        self.median.count()
    }
}

impl Default for RobustNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineNormalizer for RobustNormalizer {
    fn normalize(&mut self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return NEUTRAL;
        }

        self.q1.update(raw);
        self.median.update(raw);
        self.q3.update(raw);

        if self.count() < 5 {
            return NEUTRAL;
        }

        let median = self.median();
        let robust_std = (self.iqr() / Self::IQR_TO_SIGMA).max(relative_epsilon(median));
        squash((raw - median) / robust_std)
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Which online normalizer to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerKind {
    #[default]
    Ema,
    Welford,
    Robust,
}

/// Normalizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub kind: NormalizerKind,
    /// Observations over which the EMA variant converges.
    pub expected_len: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            kind: NormalizerKind::Ema,
            expected_len: 100,
        }
    }
}

impl NormalizerConfig {
    /// Construct a fresh normalizer for one stream.
    pub fn build(&self) -> Box<dyn OnlineNormalizer + Send> {
        match self.kind {
            NormalizerKind::Ema => Box::new(EmaNormalizer::new(self.expected_len)),
            NormalizerKind::Welford => Box::new(WelfordNormalizer::new()),
            NormalizerKind::Robust => Box::new(RobustNormalizer::new()),
        }
    }
}
