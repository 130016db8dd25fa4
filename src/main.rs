//! CLI Entry Point for devicedims
//!
//! Provides the command-line interface for:
//! - Running a full extraction pipeline (`run`)
//! - Listing the simulated-device catalog (`devices`)
//! - Probing host preconditions without doing any work (`check`)
//!
//! # Usage
//!
//! Run a full extraction:
//! ```bash
//! devicedims run
//! ```
//!
//! Check the host can run one at all:
//! ```bash
//! devicedims check
//! ```
//!
//! A pre-flight failure prints one actionable line and exits non-zero
//! without touching the output artifacts; any other failure is reported
//! with full diagnostic context.

use clap::{Parser, Subcommand};
use devicedims::config::Config;
use devicedims::error::HarvestError;
use devicedims::logging;
use devicedims::pipeline::Pipeline;
use devicedims::toolchain::{Toolchain, XcodeToolchain};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "devicedims")]
#[command(about = "Canonical device-screen geometry extraction", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full extraction pipeline and commit the dataset
    Run,

    /// Discover and print the simulated-device catalog, then exit
    Devices,

    /// Verify host preconditions (OS, toolchain binaries), then exit
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(message) = logging::init(&config.application) {
        eprintln!("error: {message}");
        return ExitCode::FAILURE;
    }

    let toolchain = Arc::new(XcodeToolchain::new(config.toolchain.clone()));
    let result = match cli.command {
        Commands::Run => run_extraction(toolchain, config).await,
        Commands::Devices => list_devices(toolchain).await,
        Commands::Check => check_preconditions(toolchain).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_preflight() => {
            // Intentional early termination: one actionable line, no
            // diagnostic dump, artifacts untouched.
            eprintln!("{err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {:?}", anyhow::Error::from(err));
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, String> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(|err| err.to_string())?;
    config.validate()?;
    Ok(config)
}

async fn run_extraction(toolchain: Arc<XcodeToolchain>, config: Config) -> Result<(), HarvestError> {
    let mut pipeline = Pipeline::new(toolchain, config.output);
    let summary = pipeline.run().await?;
    println!(
        "Committed {} unique records for {} devices ({} {})",
        summary.unique_records,
        summary.devices_measured,
        summary.platform.name,
        summary.platform.version
    );
    Ok(())
}

async fn list_devices(toolchain: Arc<XcodeToolchain>) -> Result<(), HarvestError> {
    toolchain.preflight().await?;
    let devices = toolchain.discover_devices().await?;
    if devices.is_empty() {
        return Err(HarvestError::NoDevices);
    }
    for device in devices {
        println!("{device}");
    }
    Ok(())
}

async fn check_preconditions(toolchain: Arc<XcodeToolchain>) -> Result<(), HarvestError> {
    toolchain.preflight().await?;
    println!("All preconditions satisfied");
    Ok(())
}
