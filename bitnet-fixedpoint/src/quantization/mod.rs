//! Quantization modules.
//!
//! This module provides:
//! - **Weight quantization**: AbsMean -> {-1, 0, +1}
//! - **Input quantization**: [0, 1] -> INT8 by scaling with 127

mod activation;
mod weight;

pub use activation::{quantize_input, quantize_sample, INPUT_SCALE};
pub use weight::{quantize_tensor, quantize_weights, TernaryMatrix, TernaryStats};
