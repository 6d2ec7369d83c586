//! Configuration for the export pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Top-level configuration of one export run.
///
/// Every path is explicit; nothing is resolved relative to the location of
/// the binary.
///
/// # Example
///
/// ```rust
/// use bitnet_fixedpoint::ExportConfig;
///
/// let yaml = r#"
/// model:
///   path: "model.safetensors"
/// dataset:
///   path: "mnist_test.safetensors"
/// export:
///   output_dir: "generated"
/// "#;
/// let config: ExportConfig = serde_yaml::from_str(yaml).unwrap();
/// assert_eq!(config.model.layer_tensors[0], "fc1.weight");
/// assert_eq!(config.export.test_images, 100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Trained floating-point model.
    pub model: ModelSource,

    /// Held-out samples used for calibration, verification and the test corpus.
    pub dataset: DatasetSource,

    /// Shift calibration settings.
    #[serde(default)]
    pub calibration: CalibrationSettings,

    /// Integer-vs-float verification settings.
    #[serde(default)]
    pub verification: VerificationSettings,

    /// Artifact output settings.
    #[serde(default)]
    pub export: OutputSettings,
}

/// Location of the floating-point weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSource {
    /// Path to a safetensors file.
    pub path: String,

    /// Tensor names of the three linear layers, input layer first.
    #[serde(default = "default_layer_tensors")]
    pub layer_tensors: Vec<String>,
}

fn default_layer_tensors() -> Vec<String> {
    vec![
        "fc1.weight".into(),
        "fc2.weight".into(),
        "fc3.weight".into(),
    ]
}

/// Location of the held-out samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSource {
    /// Path to a safetensors file.
    pub path: String,

    /// Tensor holding `[N, 784]` images normalized to [0, 1].
    #[serde(default = "default_images_tensor")]
    pub images_tensor: String,

    /// Tensor holding `[N]` integer class labels.
    #[serde(default = "default_labels_tensor")]
    pub labels_tensor: String,
}

fn default_images_tensor() -> String {
    "images".into()
}
fn default_labels_tensor() -> String {
    "labels".into()
}

/// Shift calibration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Use at most this many samples (all when unset).
    #[serde(default)]
    pub max_samples: Option<usize>,

    /// Reduce per-pass maxima across threads.
    #[serde(default)]
    pub parallel: bool,
}

/// Verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSettings {
    /// Compare integer predictions against the float model.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tolerated accuracy drop, in percentage points, before warning.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_true() -> bool {
    true
}
fn default_tolerance() -> f64 {
    1.0
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: default_tolerance(),
        }
    }
}

/// Artifact output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory receiving the generated files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Number of labeled samples in the test corpus header.
    #[serde(default = "default_test_images")]
    pub test_images: usize,

    /// Also write `manifest.json`.
    #[serde(default = "default_true")]
    pub manifest: bool,
}

fn default_output_dir() -> String {
    "./generated".into()
}
fn default_test_images() -> usize {
    100
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            test_images: default_test_images(),
            manifest: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            model: ModelSource {
                path: "./model.safetensors".into(),
                layer_tensors: default_layer_tensors(),
            },
            dataset: DatasetSource {
                path: "./mnist_test.safetensors".into(),
                images_tensor: default_images_tensor(),
                labels_tensor: default_labels_tensor(),
            },
            calibration: CalibrationSettings::default(),
            verification: VerificationSettings::default(),
            export: OutputSettings::default(),
        }
    }
}

impl ExportConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Set the model path.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<String>) -> Self {
        self.model.path = path.into();
        self
    }

    /// Set the dataset path.
    #[must_use]
    pub fn with_dataset_path(mut self, path: impl Into<String>) -> Self {
        self.dataset.path = path.into();
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.export.output_dir = dir.into();
        self
    }

    /// Limit the number of calibration samples.
    #[must_use]
    pub fn with_max_calibration_samples(mut self, limit: usize) -> Self {
        self.calibration.max_samples = Some(limit);
        self
    }

    /// Enable or disable parallel calibration.
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.calibration.parallel = enabled;
        self
    }

    /// Set the number of test corpus samples.
    #[must_use]
    pub fn with_test_images(mut self, count: usize) -> Self {
        self.export.test_images = count;
        self
    }

    /// Output directory as a path.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.export.output_dir)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.model.path.is_empty() {
            return Err(ExportError::InvalidConfig("model.path is required".into()));
        }

        if self.model.layer_tensors.len() != 3 {
            return Err(ExportError::InvalidConfig(format!(
                "model.layer_tensors must name 3 tensors, got {}",
                self.model.layer_tensors.len()
            )));
        }

        if self.dataset.path.is_empty() {
            return Err(ExportError::InvalidConfig("dataset.path is required".into()));
        }

        if self.calibration.max_samples == Some(0) {
            return Err(ExportError::InvalidConfig(
                "calibration.max_samples must be > 0".into(),
            ));
        }

        if !self.verification.tolerance.is_finite() || self.verification.tolerance < 0.0 {
            return Err(ExportError::InvalidConfig(
                "verification.tolerance must be a non-negative number".into(),
            ));
        }

        if self.export.output_dir.is_empty() {
            return Err(ExportError::InvalidConfig(
                "export.output_dir is required".into(),
            ));
        }

        if self.export.test_images == 0 {
            return Err(ExportError::InvalidConfig(
                "export.test_images must be > 0".into(),
            ));
        }

        Ok(())
    }
}
