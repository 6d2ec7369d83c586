//! Pre-export checks and accuracy verification.
//!
//! `check_shift_bounds` and `check_packing` are fatal gates: export stops
//! before anything is written if either fails. `evaluate` compares the
//! integer engine with a float forward pass over the same ternary weights
//! and only warns when they diverge.

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::calibration::{ShiftCalibrator, ACT_LIMIT};
use crate::dataset::{CalibrationDataset, LabeledDataset};
use crate::engine::predict;
use crate::error::{ExportError, Result};
use crate::model::{LayerId, TernaryMlp};
use crate::quantization::quantize_sample;

/// Check that every exported shift bounds its layer's accumulators to
/// 8 bits over `dataset`.
///
/// # Errors
///
/// Returns `Uncalibrated` if a layer has no shift, `ShiftOverflow` if
/// `max |acc| >> shift > 127` for some layer, or any error from the
/// accumulator reduction.
pub fn check_shift_bounds(
    mlp: &TernaryMlp,
    dataset: &CalibrationDataset,
    calibrator: &ShiftCalibrator,
) -> Result<()> {
    for layer in mlp.layers() {
        let id = layer.id();
        let shift = layer.shift().ok_or(ExportError::Uncalibrated(id))?;
        let max_abs_acc = calibrator.max_abs_accumulator(mlp, id, dataset)?;
        let shifted = max_abs_acc.checked_shr(shift).unwrap_or(0);
        if shifted > ACT_LIMIT {
            return Err(ExportError::ShiftOverflow {
                layer: id,
                max_abs_acc,
                shift,
                shifted,
            });
        }
        tracing::debug!(layer = %id, max_abs_acc, shift, "shift bound holds");
    }
    Ok(())
}

/// Check that each layer survives a pack/unpack cycle unchanged.
///
/// # Errors
///
/// Returns `PackingMismatch` for the first layer whose packed image does
/// not decode back to its plain table.
pub fn check_packing(mlp: &TernaryMlp) -> Result<()> {
    for layer in mlp.layers() {
        let weights = layer.weights();
        let unpacked = weights.pack()?.unpack()?;
        if unpacked != weights.as_slice() {
            return Err(ExportError::PackingMismatch(layer.id()));
        }
    }
    Ok(())
}

/// Integer vs. float accuracy over a labeled dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Number of evaluated samples.
    pub samples: usize,
    /// Correct predictions of the integer engine.
    pub int_correct: usize,
    /// Correct predictions of the float forward pass.
    pub float_correct: usize,
    /// Integer accuracy in percent.
    pub int_accuracy: f64,
    /// Float accuracy in percent.
    pub float_accuracy: f64,
    /// `int_accuracy - float_accuracy`, in percentage points.
    pub accuracy_delta: f64,
    /// Percentage of samples where both paths predict the same class.
    pub agreement: f64,
    /// Largest tolerated `|accuracy_delta|`.
    pub tolerance: f64,
    /// Set when `|accuracy_delta|` exceeds the tolerance.
    pub precision_mismatch: bool,
}

fn percent(count: usize, total: usize) -> f64 {
    100.0 * count as f64 / total as f64
}

/// Float forward pass with ternary weights; ReLU between layers.
fn float_predictions(mlp: &TernaryMlp, images: Tensor, device: &Device) -> Result<Vec<u32>> {
    let mut h = images;
    for layer in mlp.layers() {
        let w = layer.weights().to_tensor(device)?;
        h = h.matmul(&w.t()?)?;
        if !layer.id().is_output() {
            h = h.relu()?;
        }
    }
    Ok(h.argmax(1)?.to_vec1::<u32>()?)
}

/// Run both the integer engine and the float reference over `dataset`.
///
/// A divergence larger than `tolerance` percentage points is logged and
/// flagged in the report; it never fails the run.
///
/// # Errors
///
/// Returns `InvalidDataset` for an empty dataset, `Uncalibrated` if the
/// network has no shifts, `ShapeMismatch` on a width mismatch, or tensor
/// errors from the float pass.
pub fn evaluate(
    mlp: &TernaryMlp,
    dataset: &LabeledDataset,
    tolerance: f64,
    device: &Device,
) -> Result<VerificationReport> {
    if dataset.is_empty() {
        return Err(ExportError::InvalidDataset(
            "no samples to evaluate".to_string(),
        ));
    }
    if let Some(layer) = mlp.layers().iter().find(|l| !l.is_calibrated()) {
        return Err(ExportError::Uncalibrated(layer.id()));
    }
    if dataset.width() != mlp.in_features() {
        return Err(ExportError::ShapeMismatch {
            expected: vec![mlp.in_features()],
            actual: vec![dataset.width()],
        });
    }

    let float_preds = float_predictions(mlp, dataset.images_tensor(device)?, device)?;

    let mut int_correct = 0;
    let mut float_correct = 0;
    let mut agree = 0;
    for (i, (&label, &float_pred)) in dataset.labels().iter().zip(&float_preds).enumerate() {
        let int_pred = predict(mlp, &quantize_sample(dataset.image(i)));
        let label = usize::from(label);
        let float_pred = float_pred as usize;
        int_correct += usize::from(int_pred == label);
        float_correct += usize::from(float_pred == label);
        agree += usize::from(int_pred == float_pred);
    }

    let samples = dataset.len();
    let int_accuracy = percent(int_correct, samples);
    let float_accuracy = percent(float_correct, samples);
    let accuracy_delta = int_accuracy - float_accuracy;
    let precision_mismatch = accuracy_delta.abs() > tolerance;

    if precision_mismatch {
        tracing::warn!(
            int_accuracy,
            float_accuracy,
            accuracy_delta,
            tolerance,
            "integer accuracy diverges from float reference"
        );
    } else {
        tracing::info!(
            int_accuracy,
            float_accuracy,
            accuracy_delta,
            "integer engine matches float reference"
        );
    }

    Ok(VerificationReport {
        samples,
        int_correct,
        float_correct,
        int_accuracy,
        float_accuracy,
        accuracy_delta,
        agreement: percent(agree, samples),
        tolerance,
        precision_mismatch,
    })
}

/// Layers in evaluation order whose weights are entirely zero.
#[must_use]
pub fn degenerate_layers(mlp: &TernaryMlp) -> Vec<LayerId> {
    mlp.layers()
        .iter()
        .filter(|l| l.weights().is_zero())
        .map(|l| l.id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::TernaryMatrix;

    fn ones(rows: usize, cols: usize) -> TernaryMatrix {
        TernaryMatrix::new(vec![1; rows * cols], rows, cols).unwrap()
    }

    fn identity_like() -> [TernaryMatrix; 3] {
        [
            TernaryMatrix::new(vec![1, 0, 0, 0, 1, 0], 2, 3).unwrap(),
            TernaryMatrix::new(vec![1, 0, 0, 1], 2, 2).unwrap(),
            TernaryMatrix::new(vec![1, 0, 0, 1], 2, 2).unwrap(),
        ]
    }

    #[test]
    fn test_shift_overflow_detected() {
        let mlp = TernaryMlp::with_shifts([ones(2, 4), ones(2, 2), ones(3, 2)], [0, 0, 0]).unwrap();
        let data = CalibrationDataset::new(vec![vec![127; 4]]).unwrap();
        let err = check_shift_bounds(&mlp, &data, &ShiftCalibrator::new()).unwrap_err();
        match err {
            ExportError::ShiftOverflow {
                layer,
                max_abs_acc,
                shift,
                shifted,
            } => {
                assert_eq!(layer, LayerId::L1);
                assert_eq!(max_abs_acc, 508);
                assert_eq!(shift, 0);
                assert_eq!(shifted, 508);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_calibrated_shifts_pass_bounds() {
        let mut mlp = TernaryMlp::new([ones(2, 4), ones(2, 2), ones(3, 2)]).unwrap();
        let data = CalibrationDataset::new(vec![vec![127; 4], vec![-128; 4]]).unwrap();
        let calibrator = ShiftCalibrator::new();
        calibrator.calibrate(&mut mlp, &data).unwrap();
        check_shift_bounds(&mlp, &data, &calibrator).unwrap();
    }

    #[test]
    fn test_uncalibrated_bounds_fail() {
        let mlp = TernaryMlp::new([ones(2, 4), ones(2, 2), ones(3, 2)]).unwrap();
        let data = CalibrationDataset::new(vec![vec![1; 4]]).unwrap();
        assert!(matches!(
            check_shift_bounds(&mlp, &data, &ShiftCalibrator::new()),
            Err(ExportError::Uncalibrated(LayerId::L1))
        ));
    }

    #[test]
    fn test_check_packing() {
        let mlp = TernaryMlp::new([
            TernaryMatrix::new(vec![1, -1, 0, 1, 0, -1, -1, 1], 2, 4).unwrap(),
            ones(2, 2),
            TernaryMatrix::zeros(3, 2),
        ])
        .unwrap();
        check_packing(&mlp).unwrap();
    }

    #[test]
    fn test_evaluate_agreeing_paths() {
        let mlp = TernaryMlp::with_shifts(identity_like(), [0, 0, 0]).unwrap();
        let data = LabeledDataset::from_parts(
            vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.9, 0.1, 0.0, 0.2, 0.8, 0.0],
            vec![0, 1, 0, 0],
            3,
        )
        .unwrap();

        let report = evaluate(&mlp, &data, 1.0, &Device::Cpu).unwrap();
        assert_eq!(report.samples, 4);
        assert_eq!(report.int_correct, 3);
        assert_eq!(report.float_correct, 3);
        assert!((report.int_accuracy - 75.0).abs() < 1e-9);
        assert!(report.accuracy_delta.abs() < 1e-9);
        assert!((report.agreement - 100.0).abs() < 1e-9);
        assert!(!report.precision_mismatch);
    }

    #[test]
    fn test_evaluate_flags_mismatch() {
        // A large shift flattens every integer score to 0, so the engine
        // always predicts class 0 while the float path follows the input.
        let mlp = TernaryMlp::with_shifts(identity_like(), [10, 0, 0]).unwrap();
        let data = LabeledDataset::from_parts(
            vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            vec![1, 1],
            3,
        )
        .unwrap();

        let report = evaluate(&mlp, &data, 1.0, &Device::Cpu).unwrap();
        assert_eq!(report.int_correct, 0);
        assert_eq!(report.float_correct, 2);
        assert!((report.accuracy_delta + 100.0).abs() < 1e-9);
        assert!(report.precision_mismatch);
    }

    #[test]
    fn test_evaluate_rejects_empty() {
        let mlp = TernaryMlp::with_shifts(identity_like(), [0, 0, 0]).unwrap();
        let data = LabeledDataset::from_parts(Vec::new(), Vec::new(), 3).unwrap();
        assert!(matches!(
            evaluate(&mlp, &data, 1.0, &Device::Cpu),
            Err(ExportError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_degenerate_layers() {
        let mlp = TernaryMlp::new([
            TernaryMatrix::zeros(2, 3),
            ones(2, 2),
            TernaryMatrix::zeros(2, 2),
        ])
        .unwrap();
        assert_eq!(degenerate_layers(&mlp), vec![LayerId::L1, LayerId::L3]);
    }
}
