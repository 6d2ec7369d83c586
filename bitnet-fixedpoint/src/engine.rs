//! Bit-exact integer forward pass.
//!
//! This is the reference the accelerator must reproduce:
//!
//! ```text
//! acc[row] = sum_col W[row, col] * x[col]          (i32, exact)
//! y[row]   = clamp(acc[row] >> shift, -128, 127)   (arithmetic shift)
//! y[row]   = max(y[row], 0)                        (all but the last layer)
//! ```
//!
//! All functions are pure; the engine holds no state.

use crate::model::{Layer, LayerId, TernaryMlp};
use crate::quantization::TernaryMatrix;

/// Smallest 8-bit activation.
pub const ACT_MIN: i32 = i8::MIN as i32;

/// Largest 8-bit activation.
pub const ACT_MAX: i32 = i8::MAX as i32;

/// Exact integer dot product of every weight row with `input`.
///
/// # Panics
///
/// Panics if `input.len()` differs from the matrix width.
#[must_use]
pub fn accumulate(weights: &TernaryMatrix, input: &[i8]) -> Vec<i32> {
    assert_eq!(
        input.len(),
        weights.cols(),
        "activation width does not match layer input width"
    );

    weights
        .iter_rows()
        .map(|row| {
            row.iter()
                .zip(input)
                .map(|(&w, &x)| match w {
                    1 => i32::from(x),
                    -1 => -i32::from(x),
                    0 => 0,
                    _ => unreachable!("non-ternary weight {w} in TernaryMatrix"),
                })
                .sum()
        })
        .collect()
}

/// Arithmetic right shift; rounds toward negative infinity.
///
/// Shifts of 32 or more saturate to the sign (`0` or `-1`).
#[must_use]
pub const fn shift_right(acc: i32, shift: u32) -> i32 {
    if shift >= i32::BITS {
        acc >> (i32::BITS - 1)
    } else {
        acc >> shift
    }
}

/// Rescale one accumulator to 8 bits, optionally rectifying.
#[must_use]
pub fn requantize(acc: i32, shift: u32, rectify: bool) -> i8 {
    let clamped = shift_right(acc, shift).clamp(ACT_MIN, ACT_MAX);
    let out = if rectify { clamped.max(0) } else { clamped };
    out as i8
}

/// Run one layer. Hidden layers are rectified, the output layer is not.
///
/// # Panics
///
/// Panics if the layer has no shift yet; evaluating an uncalibrated layer
/// is a programming error.
#[must_use]
pub fn layer_forward(layer: &Layer, input: &[i8]) -> Vec<i8> {
    let shift = layer
        .shift()
        .unwrap_or_else(|| panic!("layer {} evaluated before calibration", layer.id()));
    let rectify = !layer.id().is_output();

    accumulate(layer.weights(), input)
        .into_iter()
        .map(|acc| requantize(acc, shift, rectify))
        .collect()
}

/// Activations feeding `layer`, computed by replaying all earlier layers.
///
/// For `LayerId::L1` this is the input itself.
///
/// # Panics
///
/// Panics if an earlier layer is not calibrated.
#[must_use]
pub fn forward_to(mlp: &TernaryMlp, input: &[i8], layer: LayerId) -> Vec<i8> {
    layer
        .predecessors()
        .iter()
        .fold(input.to_vec(), |x, &id| layer_forward(mlp.layer(id), &x))
}

/// Full forward pass: returns the output layer's scores.
///
/// # Panics
///
/// Panics if any layer is not calibrated.
#[must_use]
pub fn forward(mlp: &TernaryMlp, input: &[i8]) -> Vec<i8> {
    let hidden = forward_to(mlp, input, LayerId::L3);
    layer_forward(mlp.layer(LayerId::L3), &hidden)
}

/// Index of the largest score; the first one wins on ties.
///
/// Returns 0 for an empty slice.
#[must_use]
pub fn argmax(scores: &[i8]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, i8::MIN), |(best, best_score), (i, &s)| {
            if s > best_score {
                (i, s)
            } else {
                (best, best_score)
            }
        })
        .0
}

/// Predicted class for one input.
///
/// # Panics
///
/// Panics if any layer is not calibrated.
#[must_use]
pub fn predict(mlp: &TernaryMlp, input: &[i8]) -> usize {
    argmax(&forward(mlp, input))
}
