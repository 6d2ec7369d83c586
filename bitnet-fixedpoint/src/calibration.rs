//! Post-training shift calibration.
//!
//! Each layer gets the smallest right-shift that keeps the largest
//! accumulator magnitude seen over the calibration set inside the signed
//! 8-bit range. Layers are calibrated strictly in order: pass *i* replays
//! layers `< i` with their already fixed shifts, so every shift is chosen
//! against the activations the hardware will actually see.
//!
//! ## Example
//!
//! ```rust
//! use bitnet_fixedpoint::calibration::find_shift_for_max;
//!
//! assert_eq!(find_shift_for_max(0), 0);
//! assert_eq!(find_shift_for_max(127), 0);
//! assert_eq!(find_shift_for_max(500), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::dataset::CalibrationDataset;
use crate::engine::{accumulate, forward_to};
use crate::error::{ExportError, Result};
use crate::model::{LayerId, TernaryMlp};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Largest magnitude a shifted accumulator may have.
pub const ACT_LIMIT: u32 = 127;

/// Minimal `s` such that `max_abs >> s <= 127`.
#[must_use]
pub const fn find_shift_for_max(max_abs: u32) -> u32 {
    let mut shift = 0;
    while (max_abs >> shift) > ACT_LIMIT {
        shift += 1;
    }
    shift
}

/// Result of calibrating one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCalibration {
    /// Calibrated layer.
    pub layer: LayerId,
    /// Largest accumulator magnitude over the calibration set.
    pub max_abs_acc: u32,
    /// Chosen shift.
    pub shift: u32,
}

/// Outcome of a full calibration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Per-layer results in evaluation order.
    pub layers: Vec<LayerCalibration>,
    /// Number of samples replayed per pass.
    pub samples: usize,
}

impl CalibrationReport {
    /// Result for one layer, if it was calibrated in this run.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&LayerCalibration> {
        self.layers.iter().find(|l| l.layer == id)
    }

    /// Shifts in evaluation order.
    #[must_use]
    pub fn shifts(&self) -> Vec<u32> {
        self.layers.iter().map(|l| l.shift).collect()
    }
}

/// Chooses per-layer shifts from a calibration dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftCalibrator {
    parallel: bool,
}

impl ShiftCalibrator {
    /// Create a sequential calibrator.
    #[must_use]
    pub const fn new() -> Self {
        Self { parallel: false }
    }

    /// Reduce over samples with rayon. Ignored without the `parallel`
    /// feature; results are identical either way.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether the reduction runs in parallel.
    #[must_use]
    pub const fn is_parallel(&self) -> bool {
        self.parallel && cfg!(feature = "parallel")
    }

    /// Calibrate all three layers in order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCalibrationSet` if `dataset` has no samples,
    /// `ShiftAlreadySet` if any layer already has a shift, or
    /// `ShapeMismatch` if the sample width differs from the network input.
    pub fn calibrate(
        &self,
        mlp: &mut TernaryMlp,
        dataset: &CalibrationDataset,
    ) -> Result<CalibrationReport> {
        if dataset.is_empty() {
            return Err(ExportError::EmptyCalibrationSet);
        }
        if let Some(layer) = mlp.layers().iter().find(|l| l.is_calibrated()) {
            return Err(ExportError::ShiftAlreadySet(layer.id()));
        }

        let layers = LayerId::ALL
            .into_iter()
            .map(|id| self.calibrate_layer(mlp, id, dataset))
            .collect::<Result<Vec<_>>>()?;

        Ok(CalibrationReport {
            layers,
            samples: dataset.len(),
        })
    }

    /// Run the calibration pass of a single layer and fix its shift.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCalibrationSet` for an empty dataset,
    /// `UncalibratedDependency` if an earlier layer has no shift,
    /// `ShiftAlreadySet` if this layer has one, or `ShapeMismatch` on a
    /// width mismatch.
    pub fn calibrate_layer(
        &self,
        mlp: &mut TernaryMlp,
        layer: LayerId,
        dataset: &CalibrationDataset,
    ) -> Result<LayerCalibration> {
        let max_abs_acc = self.max_abs_accumulator(mlp, layer, dataset)?;
        let shift = find_shift_for_max(max_abs_acc);
        mlp.layer_mut(layer).set_shift(shift)?;

        tracing::info!(
            layer = %layer,
            max_abs_acc,
            shift,
            samples = dataset.len(),
            "calibrated layer"
        );

        Ok(LayerCalibration {
            layer,
            max_abs_acc,
            shift,
        })
    }

    /// Largest `|acc|` of `layer` over the dataset, with earlier layers
    /// replayed under their fixed shifts.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`Self::calibrate_layer`], except that the
    /// layer itself may already be calibrated.
    pub fn max_abs_accumulator(
        &self,
        mlp: &TernaryMlp,
        layer: LayerId,
        dataset: &CalibrationDataset,
    ) -> Result<u32> {
        if dataset.is_empty() {
            return Err(ExportError::EmptyCalibrationSet);
        }
        if let Some(&missing) = layer
            .predecessors()
            .iter()
            .find(|&&id| !mlp.layer(id).is_calibrated())
        {
            return Err(ExportError::UncalibratedDependency { layer, missing });
        }
        if dataset.width() != mlp.in_features() {
            return Err(ExportError::ShapeMismatch {
                expected: vec![mlp.in_features()],
                actual: vec![dataset.width()],
            });
        }

        let weights = mlp.layer(layer).weights();
        let peak = |sample: &[i8]| -> u32 {
            let x = forward_to(mlp, sample, layer);
            accumulate(weights, &x)
                .into_iter()
                .map(i32::unsigned_abs)
                .max()
                .unwrap_or(0)
        };

        #[cfg(feature = "parallel")]
        {
            if self.parallel {
                return Ok(dataset
                    .samples()
                    .par_iter()
                    .map(|s| peak(s))
                    .max()
                    .unwrap_or(0));
            }
        }

        Ok(dataset.iter().map(peak).max().unwrap_or(0))
    }
}
