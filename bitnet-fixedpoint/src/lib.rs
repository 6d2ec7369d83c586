//! Ternary BitNet MLP export for a fixed-point accelerator.
//!
//! This crate turns a trained 784 -> 256 -> 128 -> 10 float MLP into the
//! artifacts an integer-only accelerator consumes:
//! - **Ternary weights**: {-1, 0, +1} via per-tensor AbsMean quantization
//! - **Per-layer shifts**: power-of-two rescaling calibrated on held-out data
//! - **Burst-packed tables**: 2-bit codes in 256-bit DDR beats (`trit-burst`)
//!
//! # Quick Start
//!
//! ```rust
//! use bitnet_fixedpoint::prelude::*;
//!
//! let mut mlp = TernaryMlp::new([
//!     TernaryMatrix::new(vec![1, -1, 0, 1], 1, 4)?,
//!     TernaryMatrix::new(vec![1], 1, 1)?,
//!     TernaryMatrix::new(vec![1, -1], 2, 1)?,
//! ])?;
//! let data = CalibrationDataset::new(vec![vec![10, 20, 30, 40]])?;
//! let report = ShiftCalibrator::new().calibrate(&mut mlp, &data)?;
//!
//! assert_eq!(report.shifts(), vec![0, 0, 0]);
//! assert_eq!(engine::forward(&mlp, &[10, 20, 30, 40]), vec![30, -30]);
//! # Ok::<(), bitnet_fixedpoint::ExportError>(())
//! ```
//!
//! # Integer Inference
//!
//! ```text
//! acc = W_ternary . x_int8          (exact, i32)
//! y   = clamp(acc >> shift, -128, 127)
//! y   = max(y, 0)                   (hidden layers only)
//! ```
//!
//! # Feature Flags
//!
//! - `default`: `parallel`
//! - `parallel`: rayon reduction of per-pass calibration maxima

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::doc_markdown)]

pub mod calibration;
mod config;
pub mod dataset;
pub mod engine;
mod error;
pub mod export;
pub mod model;
mod pipeline;
pub mod quantization;
pub mod verify;

pub use calibration::{find_shift_for_max, CalibrationReport, LayerCalibration, ShiftCalibrator};
pub use config::{
    CalibrationSettings, DatasetSource, ExportConfig, ModelSource, OutputSettings,
    VerificationSettings,
};
pub use dataset::{CalibrationDataset, LabeledDataset, LabeledSample};
pub use error::{ExportError, Result};
pub use export::{export_all, FixedPointArtifact, Manifest};
pub use model::{FloatModel, Layer, LayerId, TernaryMlp};
pub use pipeline::{CalibratedModel, ExportSummary, Pipeline};
pub use quantization::{quantize_input, quantize_tensor, quantize_weights, TernaryMatrix};
pub use verify::VerificationReport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::calibration::ShiftCalibrator;
    pub use crate::config::ExportConfig;
    pub use crate::dataset::CalibrationDataset;
    pub use crate::engine;
    pub use crate::error::{ExportError, Result};
    pub use crate::model::{LayerId, TernaryMlp};
    pub use crate::quantization::{quantize_weights, TernaryMatrix};
}
