//! Result records produced by the epoch detectors.
//!
//! Per-bar arrays always have the same length as the input NAV, and index 0
//! is always zero/false (no epoch can precede the first observation).

use serde::{Deserialize, Serialize};

/// One bar of detector output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Excess gain recorded for this bar (magnitude, never negative).
    pub excess_gain: f64,
    /// Excess loss recorded for this bar (magnitude, never negative).
    pub excess_loss: f64,
    /// Whether this bar is an ITH epoch.
    pub is_epoch: bool,
}

/// Result of Bull ITH (long position) analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BullIthResult {
    /// Excess gains above the endorsed crest at each bar.
    pub excess_gains: Vec<f64>,
    /// Excess losses below the endorsed crest at each bar.
    pub excess_losses: Vec<f64>,
    /// Number of bars flagged as epochs.
    pub num_of_epochs: usize,
    /// Epoch flags, one per bar.
    pub epochs: Vec<bool>,
    /// Coefficient of variation of epoch intervals (NaN when undefined).
    pub intervals_cv: f64,
    /// Maximum peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: f64,
}

/// Result of Bear ITH (short position) analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearIthResult {
    /// Excess gains below the endorsed trough at each bar (profit for shorts).
    pub excess_gains: Vec<f64>,
    /// Excess losses above the endorsed trough at each bar (adverse for shorts).
    pub excess_losses: Vec<f64>,
    /// Number of bars flagged as epochs.
    pub num_of_epochs: usize,
    /// Epoch flags, one per bar.
    pub epochs: Vec<bool>,
    /// Coefficient of variation of epoch intervals (NaN when undefined).
    pub intervals_cv: f64,
    /// Maximum trough-to-peak rise as a fraction of the peak.
    pub max_runup: f64,
}

macro_rules! impl_epoch_views {
    ($result:ty) => {
        impl $result {
            /// Number of bars covered by this result.
            pub fn len(&self) -> usize {
                self.epochs.len()
            }

            /// True when the analysed NAV was empty.
            pub fn is_empty(&self) -> bool {
                self.epochs.is_empty()
            }

            /// Per-bar `(excess_gain, excess_loss, is_epoch)` records.
            pub fn records(&self) -> impl Iterator<Item = EpochRecord> + '_ {
                self.excess_gains
                    .iter()
                    .zip(&self.excess_losses)
                    .zip(&self.epochs)
                    .map(|((&excess_gain, &excess_loss), &is_epoch)| EpochRecord {
                        excess_gain,
                        excess_loss,
                        is_epoch,
                    })
            }

            /// Bar indices flagged as epochs, in ascending order.
            pub fn epoch_indices(&self) -> Vec<usize> {
                self.epochs
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &is_epoch)| is_epoch.then_some(i))
                    .collect()
            }
        }
    };
}

impl_epoch_views!(BullIthResult);
impl_epoch_views!(BearIthResult);
