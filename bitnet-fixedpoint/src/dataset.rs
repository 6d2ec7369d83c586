//! Held-out samples for calibration, verification and the test corpus.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::quantization::quantize_sample;

/// One integer-quantized sample with its class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// INT8 input vector.
    pub input: Vec<i8>,
    /// Class label.
    pub label: u8,
}

/// Labeled float samples normalized to [0, 1], fully held in memory.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    images: Vec<f32>,
    labels: Vec<u8>,
    width: usize,
}

impl LabeledDataset {
    /// Build from flattened row-major images and their labels.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `images.len() != labels.len() * width`.
    pub fn from_parts(images: Vec<f32>, labels: Vec<u8>, width: usize) -> Result<Self> {
        if images.len() != labels.len() * width {
            return Err(ExportError::ShapeMismatch {
                expected: vec![labels.len(), width],
                actual: vec![images.len()],
            });
        }
        Ok(Self {
            images,
            labels,
            width,
        })
    }

    /// Load `[N, width]` images and `[N]` labels from a safetensors file.
    ///
    /// Labels may be stored as `u8`, `u32` or `i64`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, a tensor is missing, shapes
    /// disagree, or a label does not fit in `u8`.
    pub fn load<P: AsRef<Path>>(path: P, images_tensor: &str, labels_tensor: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)?;

        let images = tensors
            .remove(images_tensor)
            .ok_or_else(|| ExportError::MissingTensor(images_tensor.to_string()))?;
        let labels = tensors
            .remove(labels_tensor)
            .ok_or_else(|| ExportError::MissingTensor(labels_tensor.to_string()))?;

        let (count, width) = images.dims2()?;
        if labels.dims() != [count] {
            return Err(ExportError::ShapeMismatch {
                expected: vec![count],
                actual: labels.dims().to_vec(),
            });
        }

        let images = images
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let labels = labels
            .to_dtype(DType::I64)?
            .to_vec1::<i64>()?
            .into_iter()
            .map(|l| {
                u8::try_from(l)
                    .map_err(|_| ExportError::InvalidDataset(format!("label {l} out of range")))
            })
            .collect::<Result<Vec<u8>>>()?;

        tracing::info!(
            samples = count,
            width,
            "Loaded dataset from {}",
            path.display()
        );
        Self::from_parts(images, labels, width)
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Values per sample.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Class labels.
    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Float image `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn image(&self, index: usize) -> &[f32] {
        &self.images[index * self.width..(index + 1) * self.width]
    }

    /// All images as an `f32` tensor `[N, width]`.
    ///
    /// # Errors
    ///
    /// Returns error if tensor creation fails.
    pub fn images_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(
            &self.images,
            (self.len(), self.width),
            device,
        )?)
    }

    /// First `count` samples, quantized to INT8 (fewer if the dataset is
    /// smaller).
    #[must_use]
    pub fn quantized(&self, count: usize) -> Vec<LabeledSample> {
        (0..self.len().min(count))
            .map(|i| LabeledSample {
                input: quantize_sample(self.image(i)),
                label: self.labels[i],
            })
            .collect()
    }

    /// Calibration view over the first `limit` samples (all when `None`).
    #[must_use]
    pub fn calibration_set(&self, limit: Option<usize>) -> CalibrationDataset {
        let count = limit.map_or(self.len(), |l| l.min(self.len()));
        CalibrationDataset {
            samples: (0..count).map(|i| quantize_sample(self.image(i))).collect(),
            width: self.width,
        }
    }
}

/// Ordered, replayable INT8 activation vectors used to pick shifts.
///
/// Read-only once built; each calibration pass traverses it once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalibrationDataset {
    samples: Vec<Vec<i8>>,
    width: usize,
}

impl CalibrationDataset {
    /// Build from activation vectors that all share one width.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the vectors differ in length.
    pub fn new(samples: Vec<Vec<i8>>) -> Result<Self> {
        let width = samples.first().map_or(0, Vec::len);
        if let Some(bad) = samples.iter().find(|s| s.len() != width) {
            return Err(ExportError::ShapeMismatch {
                expected: vec![width],
                actual: vec![bad.len()],
            });
        }
        Ok(Self { samples, width })
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values per sample.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Samples in order.
    #[must_use]
    pub fn samples(&self) -> &[Vec<i8>] {
        &self.samples
    }

    /// Iterate over samples in order.
    pub fn iter(&self) -> impl Iterator<Item = &[i8]> + '_ {
        self.samples.iter().map(Vec::as_slice)
    }
}
