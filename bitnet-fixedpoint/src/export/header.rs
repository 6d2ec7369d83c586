//! C header rendering.
//!
//! Two headers are produced: the weights header with per-layer constants,
//! plain `int8_t` tables and packed `uint32_t` burst tables, and the test
//! data header with the labeled INT8 corpus.

use std::io::Write;

use crate::dataset::LabeledSample;
use crate::error::{ExportError, Result};

use super::artifact::{FixedPointArtifact, LayerArtifact};

const BANNER: &str = "/* Auto-generated by bitnet-export. Do not edit. */";

/// Packed words per header line (one DDR beat).
const WORDS_PER_LINE: usize = 8;

/// Image values per header line (one 28-pixel MNIST row).
const PIXELS_PER_LINE: usize = 28;

fn join<T: ToString>(values: &[T], sep: &str) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn write_plain_table<W: Write>(out: &mut W, layer: &LayerArtifact) -> Result<()> {
    let name = layer.layer.name();
    let (m, k) = (layer.m(), layer.k());
    writeln!(out, "/* {name}: {m} x {k} ternary weights (row-major) */")?;
    writeln!(
        out,
        "static const int8_t {}_weights[{}] = {{",
        name.to_lowercase(),
        m * k
    )?;
    for (i, row) in layer.weights.iter_rows().enumerate() {
        let comma = if i + 1 < m { "," } else { "" };
        writeln!(out, "  {}{comma}", join(row, ", "))?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;
    Ok(())
}

fn write_packed_table<W: Write>(out: &mut W, layer: &LayerArtifact) -> Result<()> {
    let name = layer.layer.name();
    let geometry = layer.packed.geometry();
    let words = layer.packed.words();
    writeln!(
        out,
        "/* {name}: 2-bit packed weights for DDR3 ({} rows x {} tiles x {} words) */",
        geometry.rows,
        geometry.tiles_per_row(),
        trit_burst::WORDS_PER_BEAT
    )?;
    writeln!(
        out,
        "static const uint32_t {}_packed[{}] = {{",
        name.to_lowercase(),
        words.len()
    )?;
    let lines = words.chunks(WORDS_PER_LINE).count();
    for (i, chunk) in words.chunks(WORDS_PER_LINE).enumerate() {
        let line = chunk
            .iter()
            .map(|w| format!("0x{w:08X}"))
            .collect::<Vec<_>>()
            .join(", ");
        let comma = if i + 1 < lines { "," } else { "" };
        writeln!(out, "  {line}{comma}")?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;
    Ok(())
}

/// Write the weights header (`mnist_weights.h`).
///
/// # Errors
///
/// Returns error if writing fails.
pub fn write_weights_header<W: Write>(out: &mut W, artifact: &FixedPointArtifact) -> Result<()> {
    writeln!(out, "{BANNER}")?;
    writeln!(out, "#ifndef MNIST_WEIGHTS_H")?;
    writeln!(out, "#define MNIST_WEIGHTS_H")?;
    writeln!(out)?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;

    for layer in artifact.layers() {
        let name = layer.layer.name();
        writeln!(out, "#define {name}_M {}", layer.m())?;
        writeln!(out, "#define {name}_K {}", layer.k())?;
        writeln!(out, "#define {name}_SHIFT {}", layer.shift)?;
    }
    writeln!(out)?;

    for layer in artifact.layers() {
        write_plain_table(out, layer)?;
    }
    for layer in artifact.layers() {
        write_packed_table(out, layer)?;
    }

    writeln!(out, "/* DDR3 byte sizes per layer (for offset computation) */")?;
    for layer in artifact.layers() {
        writeln!(out, "#define {}_DDR3_BYTES {}", layer.layer.name(), layer.ddr_bytes())?;
    }
    writeln!(out)?;
    writeln!(out, "#endif /* MNIST_WEIGHTS_H */")?;
    Ok(())
}

/// Write the test corpus header (`mnist_test_data.h`).
///
/// # Errors
///
/// Returns `InvalidDataset` for an empty corpus, `ShapeMismatch` if samples
/// differ in width, or an I/O error.
pub fn write_test_data_header<W: Write>(out: &mut W, corpus: &[LabeledSample]) -> Result<()> {
    let Some(first) = corpus.first() else {
        return Err(ExportError::InvalidDataset(
            "test corpus is empty".to_string(),
        ));
    };
    let width = first.input.len();
    if let Some(bad) = corpus.iter().find(|s| s.input.len() != width) {
        return Err(ExportError::ShapeMismatch {
            expected: vec![width],
            actual: vec![bad.input.len()],
        });
    }
    let count = corpus.len();

    writeln!(out, "{BANNER}")?;
    writeln!(out, "#ifndef MNIST_TEST_DATA_H")?;
    writeln!(out, "#define MNIST_TEST_DATA_H")?;
    writeln!(out)?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;
    writeln!(out, "#define NUM_TEST_IMAGES {count}")?;
    writeln!(out, "#define IMAGE_SIZE {width}")?;
    writeln!(out)?;

    let labels: Vec<u8> = corpus.iter().map(|s| s.label).collect();
    writeln!(out, "static const int test_labels[{count}] = {{")?;
    writeln!(out, "  {}", join(&labels, ", "))?;
    writeln!(out, "}};")?;
    writeln!(out)?;

    writeln!(out, "static const int8_t test_images[{count}][IMAGE_SIZE] = {{")?;
    for (i, sample) in corpus.iter().enumerate() {
        write!(out, "  {{")?;
        let lines = sample.input.chunks(PIXELS_PER_LINE).count();
        for (r, chunk) in sample.input.chunks(PIXELS_PER_LINE).enumerate() {
            let sep = if r + 1 < lines { "," } else { "" };
            write!(out, "\n    {}{sep}", join(chunk, ","))?;
        }
        let comma = if i + 1 < count { "," } else { "" };
        writeln!(out, "\n  }}{comma}")?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;
    writeln!(out, "#endif /* MNIST_TEST_DATA_H */")?;
    Ok(())
}
