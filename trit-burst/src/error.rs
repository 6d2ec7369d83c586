//! Error types for trit-burst.

use thiserror::Error;

/// Result type alias for trit-burst operations.
pub type Result<T> = std::result::Result<T, BurstError>;

/// Errors that can occur while packing or unpacking burst images.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BurstError {
    /// Value is not a ternary weight.
    #[error("invalid ternary value: {0} (expected -1, 0, or +1)")]
    InvalidValue(i32),

    /// The reserved `0b11` code was found in a packed word.
    #[error("reserved 2-bit code 0b11 in word {word} at bit offset {bit_offset}")]
    InvalidEncoding {
        /// Index of the offending word in the block.
        word: usize,
        /// Bit offset of the code inside the word.
        bit_offset: usize,
    },

    /// Buffer length does not match the declared geometry.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// A padding slot of a ragged tile carries a non-zero weight.
    #[error("non-zero padding in row {row}, tile {tile}, position {position}")]
    NonZeroPadding {
        /// Row of the tile.
        row: usize,
        /// Tile index within the row.
        tile: usize,
        /// Position inside the tile.
        position: usize,
    },
}
