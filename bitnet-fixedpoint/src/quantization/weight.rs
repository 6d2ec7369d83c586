//! Weight quantization for ternary fixed-point export.
//!
//! Implements per-tensor AbsMean quantization:
//! `W_q = round_ties_even(clamp(W / mean(|W|), -1, 1))`.

use candle_core::{DType, Device, Tensor};
use serde::{Deserialize, Serialize};
use trit_burst::{PackedBlock, Trit};

use crate::error::{ExportError, Result};

/// Row-major ternary weight matrix, `rows` outputs by `cols` inputs.
///
/// Every element is -1, 0 or +1; constructors reject anything else.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTernaryMatrix")]
pub struct TernaryMatrix {
    data: Vec<i8>,
    shape: (usize, usize),
}

/// Unchecked wire form; deserialization goes through `TernaryMatrix::new`.
#[derive(Deserialize)]
struct RawTernaryMatrix {
    data: Vec<i8>,
    shape: (usize, usize),
}

impl TryFrom<RawTernaryMatrix> for TernaryMatrix {
    type Error = ExportError;

    fn try_from(raw: RawTernaryMatrix) -> Result<Self> {
        Self::new(raw.data, raw.shape.0, raw.shape.1)
    }
}

impl std::fmt::Debug for TernaryMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TernaryMatrix")
            .field("shape", &self.shape)
            .field("sparsity", &self.stats().sparsity())
            .finish_non_exhaustive()
    }
}

/// Value histogram of a ternary matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TernaryStats {
    /// Number of -1 weights.
    pub negative: usize,
    /// Number of 0 weights.
    pub zero: usize,
    /// Number of +1 weights.
    pub positive: usize,
}

impl TernaryStats {
    /// Total number of weights.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.negative + self.zero + self.positive
    }

    /// Fraction of zero weights (1.0 for an empty matrix).
    #[must_use]
    pub fn sparsity(&self) -> f32 {
        if self.total() == 0 {
            return 1.0;
        }
        self.zero as f32 / self.total() as f32
    }
}

impl TernaryMatrix {
    /// Create from row-major ternary values.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `data.len() != rows * cols`, or
    /// `InvalidWeights` if a value is outside {-1, 0, +1}.
    pub fn new(data: Vec<i8>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ExportError::ShapeMismatch {
                expected: vec![rows, cols],
                actual: vec![data.len()],
            });
        }
        if let Some((index, value)) = data.iter().enumerate().find(|(_, v)| !(-1..=1).contains(*v)) {
            return Err(ExportError::InvalidWeights(format!(
                "value {value} at index {index} is not ternary"
            )));
        }
        Ok(Self {
            data,
            shape: (rows, cols),
        })
    }

    /// All-zero matrix.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0; rows * cols],
            shape: (rows, cols),
        }
    }

    /// Output rows (M).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.shape.0
    }

    /// Input columns (K).
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.shape.1
    }

    /// `(rows, cols)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Row-major values.
    #[must_use]
    pub fn as_slice(&self) -> &[i8] {
        &self.data
    }

    /// One output row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= rows()`.
    #[must_use]
    pub fn row(&self, row: usize) -> &[i8] {
        assert!(row < self.rows(), "row out of bounds");
        let cols = self.cols();
        &self.data[row * cols..(row + 1) * cols]
    }

    /// Iterate over output rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[i8]> + '_ {
        let cols = self.cols();
        (0..self.rows()).map(move |r| &self.data[r * cols..(r + 1) * cols])
    }

    /// Weight at `(row, col)` as a trit.
    ///
    /// # Panics
    ///
    /// Panics if out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Trit {
        match self.row(row)[col] {
            1 => Trit::P,
            -1 => Trit::N,
            0 => Trit::Z,
            v => unreachable!("non-ternary weight {v} in TernaryMatrix"),
        }
    }

    /// Check whether every weight is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Count weights by value.
    #[must_use]
    pub fn stats(&self) -> TernaryStats {
        let mut stats = TernaryStats::default();
        for &v in &self.data {
            match v {
                1 => stats.positive += 1,
                -1 => stats.negative += 1,
                0 => stats.zero += 1,
                v => unreachable!("non-ternary weight {v} in TernaryMatrix"),
            }
        }
        stats
    }

    /// Pack into the 2-bit burst layout.
    ///
    /// # Errors
    ///
    /// Never fails for a valid matrix; errors from the packer are forwarded.
    pub fn pack(&self) -> Result<PackedBlock> {
        Ok(PackedBlock::pack(&self.data, self.rows(), self.cols())?)
    }

    /// Rebuild a matrix from a packed block.
    ///
    /// # Errors
    ///
    /// Returns error if the block contains reserved codes or set padding.
    pub fn from_packed(block: &PackedBlock) -> Result<Self> {
        let geometry = block.geometry();
        Self::new(block.unpack()?, geometry.rows, geometry.cols)
    }

    /// Convert to an `f32` tensor of shape `[rows, cols]`.
    ///
    /// # Errors
    ///
    /// Returns error if tensor creation fails.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        let values: Vec<f32> = self.data.iter().map(|&v| f32::from(v)).collect();
        Ok(Tensor::from_vec(values, self.shape, device)?)
    }
}

/// Quantize a row-major float matrix to ternary.
///
/// # Algorithm
///
/// 1. `alpha = mean(|W|)` over the whole matrix
/// 2. `alpha == 0` yields the all-zero matrix
/// 3. otherwise `W_q = round_ties_even(clamp(W / alpha, -1, 1))`
///
/// `alpha` is accumulated in `f64`. Against a reference that sums `|W|` in
/// `f32`, a weight at exactly `±alpha / 2` can resolve its tie differently.
///
/// # Errors
///
/// Returns `ShapeMismatch` if `values.len() != rows * cols`, or
/// `InvalidWeights` if any value is not finite.
///
/// # Examples
///
/// ```
/// use bitnet_fixedpoint::quantize_weights;
///
/// // alpha = 1.0: 0.5 is a tie and rounds to even (0), -1.5 clamps to -1.
/// let q = quantize_weights(&[0.5, -1.5, 1.0, 1.0], 1, 4).unwrap();
/// assert_eq!(q.as_slice(), &[0, -1, 1, 1]);
/// ```
pub fn quantize_weights(values: &[f32], rows: usize, cols: usize) -> Result<TernaryMatrix> {
    if values.len() != rows * cols {
        return Err(ExportError::ShapeMismatch {
            expected: vec![rows, cols],
            actual: vec![values.len()],
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(ExportError::InvalidWeights(format!(
            "non-finite weight at index {index}"
        )));
    }

    let alpha = abs_mean(values);
    if alpha == 0.0 {
        tracing::debug!(rows, cols, "degenerate all-zero layer, quantizing to zeros");
        return Ok(TernaryMatrix::zeros(rows, cols));
    }

    let data = values
        .iter()
        .map(|&w| (w / alpha).clamp(-1.0, 1.0).round_ties_even() as i8)
        .collect();

    Ok(TernaryMatrix {
        data,
        shape: (rows, cols),
    })
}

/// Quantize a 2-D weight tensor `[out_features, in_features]` to ternary.
///
/// # Errors
///
/// Returns `InvalidWeights` if the tensor is not 2-D or holds non-finite
/// values.
pub fn quantize_tensor(weight: &Tensor) -> Result<TernaryMatrix> {
    let dims = weight.shape().dims();
    if dims.len() != 2 {
        return Err(ExportError::InvalidWeights(format!(
            "weight must be 2D [out_features, in_features], got {dims:?}"
        )));
    }
    let (rows, cols) = (dims[0], dims[1]);
    let values = weight.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    quantize_weights(&values, rows, cols)
}

/// Mean absolute value, accumulated in `f64` and narrowed to `f32`.
///
/// A float32 running sum can land a few ulps away from this value, so a
/// weight sitting exactly on a ±0.5·α tie may round the other way than in
/// an `f32`-accumulated reference.
fn abs_mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|v| f64::from(v.abs())).sum();
    (sum / values.len() as f64) as f32
}
