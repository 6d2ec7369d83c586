//! Input quantization to INT8.
//!
//! Samples normalized to [0, 1] are scaled by 127, clamped to the signed
//! 8-bit range and truncated toward zero.

/// Scale applied to a normalized input value.
pub const INPUT_SCALE: f32 = 127.0;

/// Quantize one normalized input value.
///
/// # Examples
///
/// ```
/// use bitnet_fixedpoint::quantization::quantize_input;
///
/// assert_eq!(quantize_input(1.0), 127);
/// assert_eq!(quantize_input(0.5), 63); // 63.5 truncates
/// assert_eq!(quantize_input(2.0), 127);
/// ```
#[must_use]
pub fn quantize_input(x: f32) -> i8 {
    (x * INPUT_SCALE).clamp(-128.0, 127.0) as i8
}

/// Quantize a whole sample.
#[must_use]
pub fn quantize_sample(sample: &[f32]) -> Vec<i8> {
    sample.iter().copied().map(quantize_input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_endpoints() {
        assert_eq!(quantize_input(0.0), 0);
        assert_eq!(quantize_input(1.0), 127);
        assert_eq!(quantize_input(-1.0), -127);
        assert_eq!(quantize_input(-5.0), -128);
    }

    #[test]
    fn test_truncates_toward_zero() {
        assert_eq!(quantize_input(0.999), 126);
        assert_eq!(quantize_input(-0.999), -126);
        assert_eq!(quantize_input(1.0 / 254.0), 0);
    }

    #[test]
    fn test_quantize_sample() {
        assert_eq!(quantize_sample(&[0.0, 0.25, 1.0]), vec![0, 31, 127]);
    }
}
