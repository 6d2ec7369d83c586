//! Tiled 2-bit packing aligned to 256-bit DDR bursts.
//!
//! Each output row is split into tiles of 128 input columns. A tile is
//! packed into one beat of eight `u32` words, 16 weights per word:
//!
//! ```text
//! position p in tile  ->  word p / 16, bit offset (p % 16) * 2
//!
//! beat order: row 0 tile 0, row 0 tile 1, ..., row 1 tile 0, ...
//! ```
//!
//! The last tile of a row is zero-padded when the column count is not a
//! multiple of 128. Padding is dropped again on unpack.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BurstError, Result};
use crate::trit::{Trit, CODE_BITS, CODE_MASK};

/// Input columns covered by one tile.
pub const TILE_COLS: usize = 128;

/// Weights stored in one `u32` word.
pub const TRITS_PER_WORD: usize = 32 / CODE_BITS;

/// Words in one 256-bit beat.
pub const WORDS_PER_BEAT: usize = TILE_COLS / TRITS_PER_WORD;

/// Bytes in one 256-bit beat.
pub const BEAT_BYTES: usize = WORDS_PER_BEAT * 4;

/// Tile geometry of one weight matrix.
///
/// # Examples
///
/// ```
/// use trit_burst::BurstGeometry;
///
/// let l1 = BurstGeometry::new(256, 784);
/// assert_eq!(l1.tiles_per_row(), 7);
/// assert_eq!(l1.num_words(), 256 * 7 * 8);
/// assert_eq!(l1.ddr_bytes(), 256 * 7 * 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BurstGeometry {
    /// Output rows (M).
    pub rows: usize,
    /// Input columns (K).
    pub cols: usize,
}

impl BurstGeometry {
    /// Create a geometry for an `rows x cols` matrix.
    #[must_use]
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Tiles needed to cover one row.
    #[must_use]
    pub const fn tiles_per_row(&self) -> usize {
        self.cols.div_ceil(TILE_COLS)
    }

    /// Total beats in the block.
    #[must_use]
    pub const fn num_beats(&self) -> usize {
        self.rows * self.tiles_per_row()
    }

    /// Total `u32` words in the block.
    #[must_use]
    pub const fn num_words(&self) -> usize {
        self.num_beats() * WORDS_PER_BEAT
    }

    /// Size of the block in DDR, in bytes.
    #[must_use]
    pub const fn ddr_bytes(&self) -> usize {
        self.num_beats() * BEAT_BYTES
    }

    /// Number of logical weights (`rows * cols`).
    #[must_use]
    pub const fn num_weights(&self) -> usize {
        self.rows * self.cols
    }

    /// Index of the first word of the beat holding `(row, tile)`.
    #[must_use]
    pub const fn beat_offset(&self, row: usize, tile: usize) -> usize {
        (row * self.tiles_per_row() + tile) * WORDS_PER_BEAT
    }
}

/// Packed 2-bit image of one ternary weight matrix.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPackedBlock")]
pub struct PackedBlock {
    words: Vec<u32>,
    geometry: BurstGeometry,
}

/// Unchecked wire form; deserialization goes through `from_words`.
#[derive(Deserialize)]
struct RawPackedBlock {
    words: Vec<u32>,
    geometry: BurstGeometry,
}

impl TryFrom<RawPackedBlock> for PackedBlock {
    type Error = BurstError;

    fn try_from(raw: RawPackedBlock) -> Result<Self> {
        Self::from_words(raw.words, raw.geometry)
    }
}

impl PackedBlock {
    /// Pack a row-major ternary matrix.
    ///
    /// # Arguments
    ///
    /// * `values` - `rows * cols` weights in {-1, 0, +1}, row-major
    /// * `rows` - Output rows (M)
    /// * `cols` - Input columns (K)
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `values.len() != rows * cols`, or
    /// `InvalidValue` if any weight is not ternary.
    ///
    /// # Examples
    ///
    /// ```
    /// use trit_burst::PackedBlock;
    ///
    /// let block = PackedBlock::pack(&[1, -1, 0, 1], 1, 4).unwrap();
    /// assert_eq!(block.words()[0], 0b01_00_10_01);
    /// assert_eq!(block.unpack().unwrap(), vec![1, -1, 0, 1]);
    /// ```
    pub fn pack(values: &[i8], rows: usize, cols: usize) -> Result<Self> {
        let geometry = BurstGeometry::new(rows, cols);
        if values.len() != geometry.num_weights() {
            return Err(BurstError::ShapeMismatch {
                expected: geometry.num_weights(),
                actual: values.len(),
            });
        }

        let mut words = Vec::with_capacity(geometry.num_words());
        for row in values.chunks_exact(cols.max(1)).take(rows) {
            for tile in 0..geometry.tiles_per_row() {
                let mut beat = [0u32; WORDS_PER_BEAT];
                let start = tile * TILE_COLS;
                let end = (start + TILE_COLS).min(cols);
                for (pos, &value) in row[start..end].iter().enumerate() {
                    let trit = Trit::try_from(value)?;
                    beat[pos / TRITS_PER_WORD] |=
                        trit.code() << ((pos % TRITS_PER_WORD) * CODE_BITS);
                }
                words.extend_from_slice(&beat);
            }
        }

        Ok(Self { words, geometry })
    }

    /// Wrap an existing word buffer.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the buffer length does not match the
    /// geometry.
    pub fn from_words(words: Vec<u32>, geometry: BurstGeometry) -> Result<Self> {
        if words.len() != geometry.num_words() {
            return Err(BurstError::ShapeMismatch {
                expected: geometry.num_words(),
                actual: words.len(),
            });
        }
        Ok(Self { words, geometry })
    }

    /// Packed words in burst order.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Consume the block and return its words.
    #[must_use]
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// Geometry of the packed matrix.
    #[must_use]
    pub const fn geometry(&self) -> BurstGeometry {
        self.geometry
    }

    /// Size of the block in DDR, in bytes.
    #[must_use]
    pub const fn ddr_bytes(&self) -> usize {
        self.geometry.ddr_bytes()
    }

    /// The eight words of one beat.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `tile` is out of range.
    #[must_use]
    pub fn beat(&self, row: usize, tile: usize) -> &[u32] {
        assert!(row < self.geometry.rows, "row out of bounds");
        assert!(tile < self.geometry.tiles_per_row(), "tile out of bounds");
        let offset = self.geometry.beat_offset(row, tile);
        &self.words[offset..offset + WORDS_PER_BEAT]
    }

    /// Decode the weight at `(row, col)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEncoding` if the slot holds the reserved code.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of range.
    pub fn get(&self, row: usize, col: usize) -> Result<Trit> {
        assert!(col < self.geometry.cols, "column out of bounds");
        let (word, bit_offset) = self.locate(row, col / TILE_COLS, col % TILE_COLS);
        self.decode(word, bit_offset)
    }

    /// Decode the block back into a row-major `i8` matrix.
    ///
    /// Padding slots of ragged tiles must be zero and are dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEncoding` for the reserved `0b11` code, or
    /// `NonZeroPadding` if a padding slot is set.
    pub fn unpack(&self) -> Result<Vec<i8>> {
        let BurstGeometry { rows, cols } = self.geometry;
        let mut values = Vec::with_capacity(rows * cols);

        for row in 0..rows {
            for tile in 0..self.geometry.tiles_per_row() {
                for position in 0..TILE_COLS {
                    let (word, bit_offset) = self.locate(row, tile, position);
                    let trit = self.decode(word, bit_offset)?;
                    if tile * TILE_COLS + position < cols {
                        values.push(trit.value());
                    } else if !trit.is_zero() {
                        return Err(BurstError::NonZeroPadding {
                            row,
                            tile,
                            position,
                        });
                    }
                }
            }
        }

        Ok(values)
    }

    /// Count non-zero weights.
    #[must_use]
    pub fn count_nonzero(&self) -> usize {
        // Every non-zero code has exactly one of its two bits set.
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Little-endian byte image, as laid out in DDR.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn locate(&self, row: usize, tile: usize, position: usize) -> (usize, usize) {
        let word = self.geometry.beat_offset(row, tile) + position / TRITS_PER_WORD;
        (word, (position % TRITS_PER_WORD) * CODE_BITS)
    }

    fn decode(&self, word: usize, bit_offset: usize) -> Result<Trit> {
        let code = (self.words[word] >> bit_offset) & CODE_MASK;
        Trit::from_code(code).ok_or(BurstError::InvalidEncoding { word, bit_offset })
    }
}

impl fmt::Debug for PackedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PackedBlock({}x{}, tiles/row={}, words={}, nonzero={})",
            self.geometry.rows,
            self.geometry.cols,
            self.geometry.tiles_per_row(),
            self.words.len(),
            self.count_nonzero()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(rows: usize, cols: usize) -> Vec<i8> {
        (0..rows * cols)
            .map(|i| match (i * 7 + i / 3) % 3 {
                0 => 0,
                1 => 1,
                _ => -1,
            })
            .collect()
    }

    #[test]
    fn test_geometry_layers() {
        let l1 = BurstGeometry::new(256, 784);
        assert_eq!(l1.tiles_per_row(), 7);
        assert_eq!(l1.ddr_bytes(), 57_344);

        let l2 = BurstGeometry::new(128, 256);
        assert_eq!(l2.tiles_per_row(), 2);
        assert_eq!(l2.num_words(), 2048);

        let l3 = BurstGeometry::new(10, 128);
        assert_eq!(l3.tiles_per_row(), 1);
        assert_eq!(l3.ddr_bytes(), 320);
    }

    #[test]
    fn test_all_zero_block() {
        let block = PackedBlock::pack(&[0; 8], 2, 4).unwrap();
        assert_eq!(block.words().len(), 16);
        assert!(block.words().iter().all(|&w| w == 0));
        assert_eq!(block.count_nonzero(), 0);
    }

    #[test]
    fn test_bit_positions() {
        let mut values = vec![0i8; 128];
        values[0] = 1;
        values[15] = -1;
        values[16] = 1;
        values[127] = -1;
        let block = PackedBlock::pack(&values, 1, 128).unwrap();
        let words = block.words();

        assert_eq!(words[0], 0b01 | (0b10 << 30));
        assert_eq!(words[1], 0b01);
        assert_eq!(words[7], 0b10 << 30);
        assert!(words[2..7].iter().all(|&w| w == 0));
    }

    #[test]
    fn test_ragged_row_of_ones() {
        let values = vec![1i8; 130];
        let block = PackedBlock::pack(&values, 1, 130).unwrap();

        assert_eq!(block.geometry().tiles_per_row(), 2);
        assert!(block.beat(0, 0).iter().all(|&w| w == 0x5555_5555));
        assert_eq!(block.beat(0, 1)[0], 0b0101);
        assert!(block.beat(0, 1)[1..].iter().all(|&w| w == 0));

        assert_eq!(block.unpack().unwrap(), values);
    }

    #[test]
    fn test_row_major_tile_major_order() {
        let mut values = vec![0i8; 2 * 200];
        values[130] = 1; // row 0, tile 1, position 2
        values[200] = -1; // row 1, tile 0, position 0
        let block = PackedBlock::pack(&values, 2, 200).unwrap();

        assert_eq!(block.words()[8], 0b01 << 4);
        assert_eq!(block.words()[16], 0b10);
        assert_eq!(block.get(0, 130).unwrap(), Trit::P);
        assert_eq!(block.get(1, 0).unwrap(), Trit::N);
    }

    #[test]
    fn test_roundtrip_various_shapes() {
        for &(rows, cols) in &[(1, 1), (3, 127), (4, 128), (5, 129), (10, 128), (7, 784)] {
            let values = pattern(rows, cols);
            let block = PackedBlock::pack(&values, rows, cols).unwrap();
            assert_eq!(block.words().len(), block.geometry().num_words());
            assert_eq!(block.unpack().unwrap(), values, "shape {rows}x{cols}");
        }
    }

    #[test]
    fn test_count_nonzero_matches_plain() {
        let values = pattern(6, 300);
        let block = PackedBlock::pack(&values, 6, 300).unwrap();
        let plain = values.iter().filter(|&&v| v != 0).count();
        assert_eq!(block.count_nonzero(), plain);
    }

    #[test]
    fn test_rejects_non_ternary() {
        assert_eq!(
            PackedBlock::pack(&[0, 2], 1, 2),
            Err(BurstError::InvalidValue(2))
        );
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert_eq!(
            PackedBlock::pack(&[0, 1, 1], 2, 2),
            Err(BurstError::ShapeMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert!(PackedBlock::from_words(vec![0; 7], BurstGeometry::new(1, 4)).is_err());
    }

    #[test]
    fn test_deserialize_checks_word_count() {
        let short = r#"{"words":[0],"geometry":{"rows":1,"cols":128}}"#;
        assert!(serde_json::from_str::<PackedBlock>(short).is_err());

        let block = PackedBlock::pack(&pattern(2, 130), 2, 130).unwrap();
        let json = serde_json::to_string(&block).unwrap();
        let back: PackedBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.unpack().unwrap(), pattern(2, 130));
    }

    #[test]
    fn test_reserved_code_rejected() {
        let mut words = vec![0u32; 8];
        words[1] = 0b11 << 6;
        let block = PackedBlock::from_words(words, BurstGeometry::new(1, 128)).unwrap();
        assert_eq!(
            block.unpack(),
            Err(BurstError::InvalidEncoding {
                word: 1,
                bit_offset: 6
            })
        );
    }

    #[test]
    fn test_non_zero_padding_rejected() {
        let mut words = vec![0u32; 16];
        words[8] = 0b01 << 4; // tile 1, position 2 -> column 130, beyond K=129
        let block = PackedBlock::from_words(words, BurstGeometry::new(1, 129)).unwrap();
        assert_eq!(
            block.unpack(),
            Err(BurstError::NonZeroPadding {
                row: 0,
                tile: 1,
                position: 2
            })
        );
    }

    #[test]
    fn test_le_bytes() {
        let block = PackedBlock::pack(&[1, -1, 0, 1], 1, 4).unwrap();
        let bytes = block.to_le_bytes();
        assert_eq!(bytes.len(), block.ddr_bytes());
        assert_eq!(bytes[0], 0b01_00_10_01);
        assert!(bytes[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_columns() {
        let block = PackedBlock::pack(&[], 3, 0).unwrap();
        assert!(block.words().is_empty());
        assert!(block.unpack().unwrap().is_empty());
    }
}
