//! CLI entry point for bitnet-export.

use std::process::ExitCode;

use bitnet_fixedpoint::{ExportConfig, Pipeline, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bitnet-export")]
#[command(about = "Export a ternary BitNet MLP to fixed-point accelerator artifacts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample configuration file
    Init {
        /// Output path for config file
        #[arg(default_value = "export.yaml")]
        output: String,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        config: String,
    },
    /// Quantize and calibrate, then print the chosen shifts
    Calibrate {
        /// Path to configuration file
        config: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the full pipeline and write all artifacts
    Export {
        /// Path to configuration file
        config: String,
        /// Override the output directory
        #[arg(long)]
        output: Option<String>,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => {
            ExportConfig::default().to_file(&output)?;
            println!("✓ Configuration written to: {output}");
        }
        Commands::Validate { config } => {
            tracing::info!("Validating configuration: {}", config);
            let config = ExportConfig::from_file(&config)?;
            config.validate()?;
            println!("✓ Configuration is valid");
            println!("  Model: {}", config.model.path);
            println!("  Dataset: {}", config.dataset.path);
            println!("  Output: {}", config.export.output_dir);
        }
        Commands::Calibrate { config, json } => {
            tracing::info!("Calibrating with config: {}", config);
            let pipeline = Pipeline::new(ExportConfig::from_file(&config)?)?;
            let calibrated = pipeline.calibrate()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&calibrated.report)?);
            } else {
                println!("✓ Calibrated on {} samples", calibrated.report.samples);
                for layer in &calibrated.report.layers {
                    println!(
                        "  {}: max |acc| = {}, shift = {}",
                        layer.layer, layer.max_abs_acc, layer.shift
                    );
                }
            }
        }
        Commands::Export { config, output } => {
            tracing::info!("Exporting with config: {}", config);
            let mut config = ExportConfig::from_file(&config)?;
            if let Some(dir) = output {
                config = config.with_output_dir(dir);
            }
            let summary = Pipeline::new(config)?.run()?;

            let shifts: Vec<String> = summary
                .calibration
                .layers
                .iter()
                .map(|l| format!("{}={}", l.layer, l.shift))
                .collect();
            println!("✓ Shifts: {}", shifts.join(", "));
            if let Some(v) = &summary.verification {
                println!(
                    "  Accuracy: int {:.2}%, float {:.2}% (delta {:+.2})",
                    v.int_accuracy, v.float_accuracy, v.accuracy_delta
                );
            }
            println!("  DDR bytes: {}", summary.total_ddr_bytes);
            println!("  Wrote {}", summary.files.weights_header.display());
            println!("  Wrote {}", summary.files.test_data_header.display());
            if let Some(manifest) = &summary.files.manifest {
                println!("  Wrote {}", manifest.display());
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
