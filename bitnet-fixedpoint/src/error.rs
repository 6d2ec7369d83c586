//! Error types for bitnet-fixedpoint.

use thiserror::Error;

use crate::model::LayerId;

/// Result type alias for bitnet-fixedpoint operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can occur while quantizing, calibrating or exporting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Weights cannot be quantized (wrong rank, non-finite values, non-ternary).
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// Dataset content is unusable.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// Shape mismatch between weights, activations or tensors.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Calibration was requested without any samples.
    #[error("calibration dataset is empty")]
    EmptyCalibrationSet,

    /// A layer's shift was already fixed by an earlier calibration.
    #[error("shift for layer {0} is already set")]
    ShiftAlreadySet(LayerId),

    /// A layer was calibrated before the layers feeding it.
    #[error("cannot calibrate layer {layer}: layer {missing} has no shift yet")]
    UncalibratedDependency {
        /// Layer being calibrated.
        layer: LayerId,
        /// Earlier layer without a shift.
        missing: LayerId,
    },

    /// Export requested for a layer that was never calibrated.
    #[error("layer {0} is not calibrated")]
    Uncalibrated(LayerId),

    /// The exported shift does not bound the layer's accumulators to 8 bits.
    #[error(
        "shift overflow in layer {layer}: max |acc| = {max_abs_acc} >> {shift} = {shifted} > 127"
    )]
    ShiftOverflow {
        /// Offending layer.
        layer: LayerId,
        /// Largest accumulator magnitude observed.
        max_abs_acc: u32,
        /// Exported shift.
        shift: u32,
        /// `max_abs_acc >> shift`.
        shifted: u32,
    },

    /// Packed and plain weight tables disagree.
    #[error("packed weights of layer {0} do not match the plain table")]
    PackingMismatch(LayerId),

    /// A required tensor is missing from a safetensors file.
    #[error("missing tensor: {0}")]
    MissingTensor(String),

    /// Burst packing error.
    #[error("packing error: {0}")]
    Burst(#[from] trit_burst::BurstError),

    /// Candle tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid YAML configuration file.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
