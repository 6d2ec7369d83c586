//! The three-layer ternary network.
//!
//! The network is a fixed, ordered sequence of three layers
//! (784 -> 256 -> 128 -> 10 for the reference MNIST model). Each layer owns
//! its ternary weights and, once calibrated, its right-shift.

use std::fmt;
use std::path::Path;

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::quantization::{quantize_tensor, TernaryMatrix};

/// Position of a layer in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerId {
    /// Input layer.
    L1,
    /// Hidden layer.
    L2,
    /// Output layer.
    L3,
}

impl LayerId {
    /// All layers in evaluation order.
    pub const ALL: [LayerId; 3] = [LayerId::L1, LayerId::L2, LayerId::L3];

    /// Zero-based position.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            LayerId::L1 => 0,
            LayerId::L2 => 1,
            LayerId::L3 => 2,
        }
    }

    /// Name used in exported symbols (`L1_M`, `l1_packed`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            LayerId::L1 => "L1",
            LayerId::L2 => "L2",
            LayerId::L3 => "L3",
        }
    }

    /// Input width of the reference architecture.
    #[must_use]
    pub const fn in_features(self) -> usize {
        match self {
            LayerId::L1 => 784,
            LayerId::L2 => 256,
            LayerId::L3 => 128,
        }
    }

    /// Output width of the reference architecture.
    #[must_use]
    pub const fn out_features(self) -> usize {
        match self {
            LayerId::L1 => 256,
            LayerId::L2 => 128,
            LayerId::L3 => 10,
        }
    }

    /// Whether this is the final (unrectified) layer.
    #[must_use]
    pub const fn is_output(self) -> bool {
        matches!(self, LayerId::L3)
    }

    /// Layers evaluated before this one.
    #[must_use]
    pub const fn predecessors(self) -> &'static [LayerId] {
        match self {
            LayerId::L1 => &[],
            LayerId::L2 => &[LayerId::L1],
            LayerId::L3 => &[LayerId::L1, LayerId::L2],
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One ternary layer with its (possibly undecided) shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    id: LayerId,
    weights: TernaryMatrix,
    shift: Option<u32>,
}

impl Layer {
    /// Create an uncalibrated layer.
    #[must_use]
    pub fn new(id: LayerId, weights: TernaryMatrix) -> Self {
        Self {
            id,
            weights,
            shift: None,
        }
    }

    /// Position of the layer.
    #[must_use]
    pub const fn id(&self) -> LayerId {
        self.id
    }

    /// Ternary weights.
    #[must_use]
    pub const fn weights(&self) -> &TernaryMatrix {
        &self.weights
    }

    /// Calibrated shift, `None` before calibration.
    #[must_use]
    pub const fn shift(&self) -> Option<u32> {
        self.shift
    }

    /// Whether the shift has been fixed.
    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        self.shift.is_some()
    }

    /// Fix the shift. A shift can only be set once.
    ///
    /// # Errors
    ///
    /// Returns `ShiftAlreadySet` if the layer is already calibrated.
    pub fn set_shift(&mut self, shift: u32) -> Result<()> {
        if self.shift.is_some() {
            return Err(ExportError::ShiftAlreadySet(self.id));
        }
        self.shift = Some(shift);
        Ok(())
    }

    /// Input width (K).
    #[must_use]
    pub const fn in_features(&self) -> usize {
        self.weights.cols()
    }

    /// Output width (M).
    #[must_use]
    pub const fn out_features(&self) -> usize {
        self.weights.rows()
    }
}

/// Three ternary layers evaluated in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTernaryMlp")]
pub struct TernaryMlp {
    layers: [Layer; 3],
}

/// Unchecked wire form; deserialization rebuilds through `TernaryMlp::new`.
#[derive(Deserialize)]
struct RawTernaryMlp {
    layers: [Layer; 3],
}

impl TryFrom<RawTernaryMlp> for TernaryMlp {
    type Error = ExportError;

    fn try_from(raw: RawTernaryMlp) -> Result<Self> {
        let [l1, l2, l3] = raw.layers;
        for (layer, expected) in [&l1, &l2, &l3].into_iter().zip(LayerId::ALL) {
            if layer.id != expected {
                return Err(ExportError::InvalidWeights(format!(
                    "layer {} stored at position {}",
                    layer.id, expected
                )));
            }
        }
        let shifts = [l1.shift, l2.shift, l3.shift];
        let mut mlp = Self::new([l1.weights, l2.weights, l3.weights])?;
        for (layer, shift) in mlp.layers.iter_mut().zip(shifts) {
            if let Some(shift) = shift {
                layer.set_shift(shift)?;
            }
        }
        Ok(mlp)
    }
}

impl TernaryMlp {
    /// Build an uncalibrated network from three weight matrices.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if a layer's input width differs from the
    /// previous layer's output width.
    pub fn new(weights: [TernaryMatrix; 3]) -> Result<Self> {
        let [w1, w2, w3] = weights;
        for (prev, next) in [(&w1, &w2), (&w2, &w3)] {
            if prev.rows() != next.cols() {
                return Err(ExportError::ShapeMismatch {
                    expected: vec![next.rows(), prev.rows()],
                    actual: vec![next.rows(), next.cols()],
                });
            }
        }
        Ok(Self {
            layers: [
                Layer::new(LayerId::L1, w1),
                Layer::new(LayerId::L2, w2),
                Layer::new(LayerId::L3, w3),
            ],
        })
    }

    /// Build a network with already known shifts, e.g. to replay an export.
    ///
    /// # Errors
    ///
    /// Returns error if the shapes do not chain.
    pub fn with_shifts(weights: [TernaryMatrix; 3], shifts: [u32; 3]) -> Result<Self> {
        let mut mlp = Self::new(weights)?;
        for (layer, shift) in mlp.layers.iter_mut().zip(shifts) {
            layer.set_shift(shift)?;
        }
        Ok(mlp)
    }

    /// Layer by position.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.index()]
    }

    pub(crate) fn layer_mut(&mut self, id: LayerId) -> &mut Layer {
        &mut self.layers[id.index()]
    }

    /// All layers in evaluation order.
    #[must_use]
    pub fn layers(&self) -> &[Layer; 3] {
        &self.layers
    }

    /// Input width of the network.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.layers[0].in_features()
    }

    /// Number of output scores.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.layers[2].out_features()
    }

    /// Whether every layer has a shift.
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.layers.iter().all(Layer::is_calibrated)
    }

    /// All three shifts, if calibrated.
    #[must_use]
    pub fn shifts(&self) -> Option<[u32; 3]> {
        Some([
            self.layers[0].shift()?,
            self.layers[1].shift()?,
            self.layers[2].shift()?,
        ])
    }
}

/// Trained floating-point weights of the three layers.
#[derive(Debug, Clone)]
pub struct FloatModel {
    weights: [Tensor; 3],
}

impl FloatModel {
    /// Wrap three `[out_features, in_features]` tensors.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWeights` if a tensor is not 2-D, or `ShapeMismatch`
    /// if widths do not chain.
    pub fn from_tensors(weights: [Tensor; 3]) -> Result<Self> {
        let mut dims = Vec::with_capacity(3);
        for (id, w) in LayerId::ALL.iter().zip(&weights) {
            let (rows, cols) = w.dims2().map_err(|_| {
                ExportError::InvalidWeights(format!(
                    "layer {id} weight must be 2D, got {:?}",
                    w.dims()
                ))
            })?;
            dims.push((rows, cols));
        }
        for pair in dims.windows(2) {
            let ((prev_rows, _), (rows, cols)) = (pair[0], pair[1]);
            if prev_rows != cols {
                return Err(ExportError::ShapeMismatch {
                    expected: vec![rows, prev_rows],
                    actual: vec![rows, cols],
                });
            }
        }
        Ok(Self { weights })
    }

    /// Load weights from a safetensors file.
    ///
    /// The tensors must match the reference architecture
    /// (784 -> 256 -> 128 -> 10).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, a tensor is missing, or a
    /// shape does not match.
    pub fn load<P: AsRef<Path>>(path: P, tensor_names: &[String]) -> Result<Self> {
        let path = path.as_ref();
        if tensor_names.len() != 3 {
            return Err(ExportError::InvalidConfig(format!(
                "expected 3 layer tensor names, got {}",
                tensor_names.len()
            )));
        }

        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)?;
        let mut take = |id: LayerId| -> Result<Tensor> {
            let name = &tensor_names[id.index()];
            let tensor = tensors
                .remove(name)
                .ok_or_else(|| ExportError::MissingTensor(name.clone()))?;
            let expected = [id.out_features(), id.in_features()];
            if tensor.dims() != expected {
                return Err(ExportError::ShapeMismatch {
                    expected: expected.to_vec(),
                    actual: tensor.dims().to_vec(),
                });
            }
            Ok(tensor)
        };

        let weights = [take(LayerId::L1)?, take(LayerId::L2)?, take(LayerId::L3)?];
        tracing::info!("Loaded float model from {}", path.display());
        Self::from_tensors(weights)
    }

    /// Float weights of one layer.
    #[must_use]
    pub fn weight(&self, id: LayerId) -> &Tensor {
        &self.weights[id.index()]
    }

    /// Quantize every layer to ternary, producing an uncalibrated network.
    ///
    /// # Errors
    ///
    /// Returns error if quantization fails.
    pub fn quantize(&self) -> Result<TernaryMlp> {
        let mut quantized = Vec::with_capacity(3);
        for id in LayerId::ALL {
            let matrix = quantize_tensor(self.weight(id))?;
            let stats = matrix.stats();
            tracing::info!(
                layer = %id,
                rows = matrix.rows(),
                cols = matrix.cols(),
                sparsity = stats.sparsity(),
                "quantized layer"
            );
            quantized.push(matrix);
        }
        let weights: [TernaryMatrix; 3] = quantized
            .try_into()
            .map_err(|_| ExportError::InvalidWeights("expected 3 layers".into()))?;
        TernaryMlp::new(weights)
    }
}
