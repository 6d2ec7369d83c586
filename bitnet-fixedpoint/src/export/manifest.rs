//! Machine-readable export summary (`manifest.json`).

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationReport;
use crate::error::Result;
use crate::verify::VerificationReport;

use super::artifact::FixedPointArtifact;

/// Per-layer entry of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    /// Symbol prefix (`L1`, `L2`, `L3`).
    pub name: String,
    /// Output rows.
    pub m: usize,
    /// Input columns.
    pub k: usize,
    /// Right-shift.
    pub shift: u32,
    /// 128-column tiles per row.
    pub tiles_per_row: usize,
    /// Number of packed `u32` words.
    pub packed_words: usize,
    /// Byte offset in the concatenated DDR image.
    pub ddr_offset: usize,
    /// Bytes in DDR.
    pub ddr_bytes: usize,
    /// Fraction of zero weights.
    pub sparsity: f32,
}

/// Summary of one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Crate version that produced the artifacts.
    pub generator: String,
    /// Layers in evaluation order.
    pub layers: Vec<LayerEntry>,
    /// Size of the concatenated DDR image.
    pub total_ddr_bytes: usize,
    /// Number of samples in the test corpus header.
    pub test_images: usize,
    /// Calibration outcome, if calibration ran in this process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationReport>,
    /// Verification outcome, if verification was enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
}

impl Manifest {
    /// Describe `artifact` and a corpus of `test_images` samples.
    #[must_use]
    pub fn new(artifact: &FixedPointArtifact, test_images: usize) -> Self {
        let layers = artifact
            .layers()
            .iter()
            .map(|l| LayerEntry {
                name: l.layer.name().to_string(),
                m: l.m(),
                k: l.k(),
                shift: l.shift,
                tiles_per_row: l.packed.geometry().tiles_per_row(),
                packed_words: l.packed.words().len(),
                ddr_offset: l.ddr_offset,
                ddr_bytes: l.ddr_bytes(),
                sparsity: l.weights.stats().sparsity(),
            })
            .collect();

        Self {
            generator: concat!("bitnet-export ", env!("CARGO_PKG_VERSION")).to_string(),
            layers,
            total_ddr_bytes: artifact.total_ddr_bytes(),
            test_images,
            calibration: None,
            verification: None,
        }
    }

    /// Attach the calibration report.
    #[must_use]
    pub fn with_calibration(mut self, report: CalibrationReport) -> Self {
        self.calibration = Some(report);
        self
    }

    /// Attach the verification report.
    #[must_use]
    pub fn with_verification(mut self, report: VerificationReport) -> Self {
        self.verification = Some(report);
        self
    }
}

/// Write `manifest` as pretty-printed JSON.
///
/// # Errors
///
/// Returns error if serialization or writing fails.
pub fn write_manifest<W: Write>(out: &mut W, manifest: &Manifest) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, manifest)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::LayerCalibration;
    use crate::model::{LayerId, TernaryMlp};
    use crate::quantization::TernaryMatrix;

    fn artifact() -> FixedPointArtifact {
        let mlp = TernaryMlp::with_shifts(
            [
                TernaryMatrix::new(vec![1; 2 * 200], 2, 200).unwrap(),
                TernaryMatrix::zeros(2, 2),
                TernaryMatrix::new(vec![1, 0, 0, -1], 2, 2).unwrap(),
            ],
            [9, 0, 0],
        )
        .unwrap();
        FixedPointArtifact::build(&mlp).unwrap()
    }

    #[test]
    fn test_manifest_layers() {
        let manifest = Manifest::new(&artifact(), 5);
        assert_eq!(manifest.layers.len(), 3);
        let l1 = &manifest.layers[0];
        assert_eq!(l1.name, "L1");
        assert_eq!((l1.m, l1.k, l1.shift), (2, 200, 9));
        assert_eq!(l1.tiles_per_row, 2);
        assert_eq!(l1.packed_words, 32);
        assert_eq!(l1.ddr_bytes, 128);
        assert_eq!(manifest.layers[1].ddr_offset, 128);
        assert_eq!(manifest.layers[2].ddr_offset, 192);
        assert_eq!(manifest.total_ddr_bytes, 256);
        assert!((manifest.layers[1].sparsity - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_manifest_json() {
        let manifest = Manifest::new(&artifact(), 5).with_calibration(CalibrationReport {
            layers: vec![LayerCalibration {
                layer: LayerId::L1,
                max_abs_acc: 40_000,
                shift: 9,
            }],
            samples: 5,
        });

        let mut buf = Vec::new();
        write_manifest(&mut buf, &manifest).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["layers"][0]["name"], "L1");
        assert_eq!(value["layers"][0]["shift"], 9);
        assert_eq!(value["total_ddr_bytes"], 256);
        assert_eq!(value["calibration"]["layers"][0]["max_abs_acc"], 40_000);
        assert!(value.get("verification").is_none());

        let back: Manifest = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, manifest);
    }
}
