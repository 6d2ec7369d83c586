//! Accelerator artifacts.
//!
//! This module provides:
//! - [`FixedPointArtifact`]: a calibrated network frozen into export form
//! - C headers for the weights and the test corpus
//! - A JSON manifest with shifts, shapes and DDR layout

mod artifact;
mod header;
mod manifest;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub use artifact::{FixedPointArtifact, LayerArtifact};
pub use header::{write_test_data_header, write_weights_header};
pub use manifest::{write_manifest, LayerEntry, Manifest};

use crate::dataset::LabeledSample;
use crate::error::Result;

/// File name of the weights header.
pub const WEIGHTS_HEADER: &str = "mnist_weights.h";

/// File name of the test corpus header.
pub const TEST_DATA_HEADER: &str = "mnist_test_data.h";

/// File name of the manifest.
pub const MANIFEST: &str = "manifest.json";

/// Paths written by [`export_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    /// Weights header.
    pub weights_header: PathBuf,
    /// Test corpus header.
    pub test_data_header: PathBuf,
    /// Manifest, when requested.
    pub manifest: Option<PathBuf>,
}

fn write_file<F>(path: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut out = BufWriter::new(File::create(path)?);
    render(&mut out)?;
    out.flush()?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Write all artifacts into `out_dir`, creating it if needed.
///
/// Headers are rendered into memory first so that a bad corpus never
/// leaves a partial set of files behind.
///
/// # Errors
///
/// Returns error if the corpus is empty or ragged, or on I/O failure.
pub fn export_all(
    out_dir: &Path,
    artifact: &FixedPointArtifact,
    corpus: &[LabeledSample],
    manifest: Option<&Manifest>,
) -> Result<ExportedFiles> {
    let mut weights = Vec::new();
    write_weights_header(&mut weights, artifact)?;
    let mut test_data = Vec::new();
    write_test_data_header(&mut test_data, corpus)?;

    fs::create_dir_all(out_dir)?;

    let weights_header = out_dir.join(WEIGHTS_HEADER);
    write_file(&weights_header, |out| Ok(out.write_all(&weights)?))?;

    let test_data_header = out_dir.join(TEST_DATA_HEADER);
    write_file(&test_data_header, |out| Ok(out.write_all(&test_data)?))?;

    let manifest = match manifest {
        Some(m) => {
            let path = out_dir.join(MANIFEST);
            write_file(&path, |out| write_manifest(out, m))?;
            Some(path)
        }
        None => None,
    };

    Ok(ExportedFiles {
        weights_header,
        test_data_header,
        manifest,
    })
}
