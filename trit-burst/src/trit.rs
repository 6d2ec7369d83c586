//! Ternary weight type and its 2-bit burst code.
//!
//! A trit is a single ternary weight:
//! - `N` (Negative): -1
//! - `Z` (Zero): 0
//! - `P` (Positive): +1

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;

use crate::error::{BurstError, Result};

/// Number of bits one trit occupies in a packed word.
pub const CODE_BITS: usize = 2;

/// Mask selecting a single 2-bit code.
pub const CODE_MASK: u32 = 0b11;

/// A ternary weight with values {-1, 0, +1}.
///
/// # Burst code
///
/// | Variant | Value | Code   |
/// |---------|-------|--------|
/// | `Z`     |  0    | `0b00` |
/// | `P`     | +1    | `0b01` |
/// | `N`     | -1    | `0b10` |
///
/// `0b11` is reserved and never produced by the packer.
///
/// # Examples
///
/// ```
/// use trit_burst::Trit;
///
/// assert_eq!(Trit::P.code(), 0b01);
/// assert_eq!(Trit::from_code(0b10).unwrap(), Trit::N);
/// assert!(Trit::from_code(0b11).is_none());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Trit {
    /// Negative trit (-1).
    N = -1,
    /// Zero trit (0).
    #[default]
    Z = 0,
    /// Positive trit (+1).
    P = 1,
}

impl Trit {
    /// Create a trit from an integer value.
    ///
    /// # Errors
    ///
    /// Returns `BurstError::InvalidValue` if value is not -1, 0, or +1.
    ///
    /// # Examples
    ///
    /// ```
    /// use trit_burst::Trit;
    ///
    /// assert_eq!(Trit::from_value(-1).unwrap(), Trit::N);
    /// assert!(Trit::from_value(2).is_err());
    /// ```
    pub const fn from_value(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(Trit::N),
            0 => Ok(Trit::Z),
            1 => Ok(Trit::P),
            _ => Err(BurstError::InvalidValue(value)),
        }
    }

    /// Get the integer value of the trit.
    #[must_use]
    pub const fn value(self) -> i8 {
        self as i8
    }

    /// Check if the trit is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        matches!(self, Trit::Z)
    }

    /// 2-bit code used in packed burst words.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Trit::Z => 0b00,
            Trit::P => 0b01,
            Trit::N => 0b10,
        }
    }

    /// Decode a 2-bit code. Returns `None` for the reserved `0b11`.
    ///
    /// Only the low two bits of `code` are inspected.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code & CODE_MASK {
            0b00 => Some(Trit::Z),
            0b01 => Some(Trit::P),
            0b10 => Some(Trit::N),
            _ => None,
        }
    }

    /// Multiply an integer activation by this weight.
    ///
    /// Reduces to add, subtract or skip; no multiplier is needed.
    #[must_use]
    pub const fn apply(self, x: i32) -> i32 {
        match self {
            Trit::P => x,
            Trit::N => -x,
            Trit::Z => 0,
        }
    }
}

impl Neg for Trit {
    type Output = Trit;

    fn neg(self) -> Self::Output {
        match self {
            Trit::N => Trit::P,
            Trit::Z => Trit::Z,
            Trit::P => Trit::N,
        }
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trit::N => write!(f, "-"),
            Trit::Z => write!(f, "0"),
            Trit::P => write!(f, "+"),
        }
    }
}

impl TryFrom<i8> for Trit {
    type Error = BurstError;

    fn try_from(value: i8) -> Result<Self> {
        Trit::from_value(i32::from(value))
    }
}

impl From<Trit> for i8 {
    fn from(trit: Trit) -> Self {
        trit.value()
    }
}

impl From<Trit> for i32 {
    fn from(trit: Trit) -> Self {
        trit.value() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trit_values() {
        assert_eq!(Trit::N.value(), -1);
        assert_eq!(Trit::Z.value(), 0);
        assert_eq!(Trit::P.value(), 1);
    }

    #[test]
    fn test_trit_from_value() {
        assert_eq!(Trit::from_value(-1).unwrap(), Trit::N);
        assert_eq!(Trit::from_value(0).unwrap(), Trit::Z);
        assert_eq!(Trit::from_value(1).unwrap(), Trit::P);
        assert_eq!(Trit::from_value(2), Err(BurstError::InvalidValue(2)));
        assert_eq!(Trit::try_from(-2i8), Err(BurstError::InvalidValue(-2)));
    }

    #[test]
    fn test_code_table() {
        assert_eq!(Trit::Z.code(), 0b00);
        assert_eq!(Trit::P.code(), 0b01);
        assert_eq!(Trit::N.code(), 0b10);
    }

    #[test]
    fn test_code_roundtrip() {
        for trit in [Trit::N, Trit::Z, Trit::P] {
            assert_eq!(Trit::from_code(trit.code()), Some(trit));
        }
        assert_eq!(Trit::from_code(0b11), None);
        // Upper bits are ignored.
        assert_eq!(Trit::from_code(0b101), Some(Trit::P));
    }

    #[test]
    fn test_apply() {
        assert_eq!(Trit::P.apply(42), 42);
        assert_eq!(Trit::N.apply(42), -42);
        assert_eq!(Trit::Z.apply(42), 0);
    }

    #[test]
    fn test_trit_negation() {
        assert_eq!(-Trit::P, Trit::N);
        assert_eq!(-Trit::N, Trit::P);
        assert_eq!(-Trit::Z, Trit::Z);
    }

    #[test]
    fn test_trit_display() {
        assert_eq!(format!("{}", Trit::N), "-");
        assert_eq!(format!("{}", Trit::Z), "0");
        assert_eq!(format!("{}", Trit::P), "+");
    }
}
