//! Ternary weights in the accelerator's 2-bit burst layout.
//!
//! This crate provides the storage side of ternary fixed-point export:
//! the `Trit` weight type, its 2-bit code, and `PackedBlock`, a weight
//! matrix tiled into 128-column groups where each tile fills exactly one
//! 256-bit DDR beat (eight `u32` words).
//!
//! # Quick Start
//!
//! ```rust
//! use trit_burst::{BurstGeometry, PackedBlock};
//!
//! // 2 x 130 matrix: the second tile of each row is ragged.
//! let weights: Vec<i8> = (0..260).map(|i| [1, 0, -1][i % 3]).collect();
//! let block = PackedBlock::pack(&weights, 2, 130)?;
//!
//! assert_eq!(block.geometry(), BurstGeometry::new(2, 130));
//! assert_eq!(block.words().len(), 2 * 2 * 8);
//! assert_eq!(block.ddr_bytes(), 2 * 2 * 32);
//! assert_eq!(block.unpack()?, weights);
//! # Ok::<(), trit_burst::BurstError>(())
//! ```
//!
//! # Encoding
//!
//! ```text
//! Value | Code
//! ------+-----
//!    0  | 00
//!   +1  | 01
//!   -1  | 10
//!       | 11  reserved, rejected on unpack
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]

mod burst;
mod error;
mod trit;

pub use burst::{
    BurstGeometry, PackedBlock, BEAT_BYTES, TILE_COLS, TRITS_PER_WORD, WORDS_PER_BEAT,
};
pub use error::{BurstError, Result};
pub use trit::{Trit, CODE_BITS, CODE_MASK};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::burst::{BurstGeometry, PackedBlock};
    pub use crate::trit::Trit;
    pub use crate::{BurstError, Result};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_workflow() {
        let weights = vec![1i8, -1, 0, 1, 0, 0, -1, -1];
        let block = PackedBlock::pack(&weights, 2, 4).unwrap();

        assert_eq!(block.geometry().tiles_per_row(), 1);
        assert_eq!(block.words().len(), 2 * WORDS_PER_BEAT);
        assert_eq!(block.ddr_bytes(), 2 * BEAT_BYTES);
        assert_eq!(block.count_nonzero(), 5);
        assert_eq!(block.unpack().unwrap(), weights);
    }

    #[test]
    fn test_constants() {
        assert_eq!(TILE_COLS, 128);
        assert_eq!(TRITS_PER_WORD, 16);
        assert_eq!(WORDS_PER_BEAT, 8);
        assert_eq!(BEAT_BYTES, 32);
    }
}
