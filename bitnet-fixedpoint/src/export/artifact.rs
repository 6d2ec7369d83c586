//! Immutable per-layer export data.

use trit_burst::PackedBlock;

use crate::error::{ExportError, Result};
use crate::model::{LayerId, TernaryMlp};
use crate::quantization::TernaryMatrix;

/// Everything the accelerator needs for one layer.
#[derive(Debug, Clone)]
pub struct LayerArtifact {
    /// Layer position.
    pub layer: LayerId,
    /// Calibrated right-shift.
    pub shift: u32,
    /// Plain ternary table, row-major.
    pub weights: TernaryMatrix,
    /// 2-bit burst image.
    pub packed: PackedBlock,
    /// Byte offset of this layer in the concatenated DDR image.
    pub ddr_offset: usize,
}

impl LayerArtifact {
    /// Output rows (M).
    #[must_use]
    pub fn m(&self) -> usize {
        self.weights.rows()
    }

    /// Input columns (K).
    #[must_use]
    pub fn k(&self) -> usize {
        self.weights.cols()
    }

    /// Bytes occupied in DDR.
    #[must_use]
    pub fn ddr_bytes(&self) -> usize {
        self.packed.ddr_bytes()
    }
}

/// Calibrated network frozen into export form.
#[derive(Debug, Clone)]
pub struct FixedPointArtifact {
    layers: Vec<LayerArtifact>,
}

impl FixedPointArtifact {
    /// Pack every layer and lay them out back to back in DDR.
    ///
    /// # Errors
    ///
    /// Returns `Uncalibrated` if a layer has no shift, or a packing error.
    pub fn build(mlp: &TernaryMlp) -> Result<Self> {
        let mut offset = 0;
        let mut layers = Vec::with_capacity(LayerId::ALL.len());
        for layer in mlp.layers() {
            let shift = layer.shift().ok_or(ExportError::Uncalibrated(layer.id()))?;
            let packed = layer.weights().pack()?;
            let bytes = packed.ddr_bytes();
            layers.push(LayerArtifact {
                layer: layer.id(),
                shift,
                weights: layer.weights().clone(),
                packed,
                ddr_offset: offset,
            });
            offset += bytes;
        }
        Ok(Self { layers })
    }

    /// Layers in evaluation order.
    #[must_use]
    pub fn layers(&self) -> &[LayerArtifact] {
        &self.layers
    }

    /// Artifact of one layer.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> &LayerArtifact {
        &self.layers[id.index()]
    }

    /// Size of the concatenated DDR image.
    #[must_use]
    pub fn total_ddr_bytes(&self) -> usize {
        self.layers.iter().map(LayerArtifact::ddr_bytes).sum()
    }

    /// Concatenated little-endian DDR image of all layers.
    #[must_use]
    pub fn ddr_image(&self) -> Vec<u8> {
        let mut image = Vec::with_capacity(self.total_ddr_bytes());
        for layer in &self.layers {
            image.extend_from_slice(&layer.packed.to_le_bytes());
        }
        image
    }
}
