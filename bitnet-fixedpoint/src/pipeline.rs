//! End-to-end export driven by an [`ExportConfig`].
//!
//! Load -> quantize -> calibrate -> check -> verify -> write. Every fatal
//! check runs before the first file is created.

use candle_core::Device;

use crate::calibration::{CalibrationReport, ShiftCalibrator};
use crate::config::ExportConfig;
use crate::dataset::LabeledDataset;
use crate::error::Result;
use crate::export::{export_all, ExportedFiles, FixedPointArtifact, Manifest};
use crate::model::{FloatModel, TernaryMlp};
use crate::verify::{
    check_packing, check_shift_bounds, degenerate_layers, evaluate, VerificationReport,
};

/// A quantized network with its calibrated shifts.
#[derive(Debug, Clone)]
pub struct CalibratedModel {
    /// Network with every shift fixed.
    pub mlp: TernaryMlp,
    /// Calibration outcome.
    pub report: CalibrationReport,
    /// Dataset the shifts were chosen on.
    pub dataset: LabeledDataset,
}

/// Outcome of a full export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Written files.
    pub files: ExportedFiles,
    /// Calibration outcome.
    pub calibration: CalibrationReport,
    /// Verification outcome, if enabled.
    pub verification: Option<VerificationReport>,
    /// Total bytes of packed weights in DDR.
    pub total_ddr_bytes: usize,
}

/// Export pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ExportConfig,
    device: Device,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if validation fails.
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            device: Device::Cpu,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    fn calibrator(&self) -> ShiftCalibrator {
        ShiftCalibrator::new().with_parallel(self.config.calibration.parallel)
    }

    /// Load the float model and the labeled dataset.
    ///
    /// # Errors
    ///
    /// Returns error if either file cannot be loaded.
    pub fn load_inputs(&self) -> Result<(FloatModel, LabeledDataset)> {
        let model = FloatModel::load(&self.config.model.path, &self.config.model.layer_tensors)?;
        let dataset = LabeledDataset::load(
            &self.config.dataset.path,
            &self.config.dataset.images_tensor,
            &self.config.dataset.labels_tensor,
        )?;
        Ok((model, dataset))
    }

    /// Load, quantize and calibrate.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCalibrationSet` for an empty dataset, or any load,
    /// quantization or shape error.
    pub fn calibrate(&self) -> Result<CalibratedModel> {
        let (model, dataset) = self.load_inputs()?;
        let mut mlp = model.quantize()?;
        for id in degenerate_layers(&mlp) {
            tracing::warn!(layer = %id, "all weights quantized to zero");
        }

        let calibration_set = dataset.calibration_set(self.config.calibration.max_samples);
        tracing::info!(
            samples = calibration_set.len(),
            parallel = self.calibrator().is_parallel(),
            "calibrating shifts"
        );
        let report = self.calibrator().calibrate(&mut mlp, &calibration_set)?;

        Ok(CalibratedModel {
            mlp,
            report,
            dataset,
        })
    }

    /// Run the complete pipeline and write all artifacts.
    ///
    /// # Errors
    ///
    /// Returns error on any fatal condition; in that case no file is
    /// written.
    pub fn run(&self) -> Result<ExportSummary> {
        let CalibratedModel {
            mlp,
            report,
            dataset,
        } = self.calibrate()?;

        let calibration_set = dataset.calibration_set(self.config.calibration.max_samples);
        check_shift_bounds(&mlp, &calibration_set, &self.calibrator())?;
        check_packing(&mlp)?;

        let verification = if self.config.verification.enabled {
            Some(evaluate(
                &mlp,
                &dataset,
                self.config.verification.tolerance,
                &self.device,
            )?)
        } else {
            None
        };

        let artifact = FixedPointArtifact::build(&mlp)?;
        let corpus = dataset.quantized(self.config.export.test_images);

        let manifest = self.config.export.manifest.then(|| {
            let manifest = Manifest::new(&artifact, corpus.len()).with_calibration(report.clone());
            match &verification {
                Some(v) => manifest.with_verification(v.clone()),
                None => manifest,
            }
        });

        let files = export_all(
            &self.config.output_dir(),
            &artifact,
            &corpus,
            manifest.as_ref(),
        )?;

        Ok(ExportSummary {
            files,
            calibration: report,
            verification,
            total_ddr_bytes: artifact.total_ddr_bytes(),
        })
    }
}
