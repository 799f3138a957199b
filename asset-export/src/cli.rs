///
/// This module implements the full CLI interface for asset-export—handling
/// command parsing, argument validation, main entrypoints, and user-visible
/// invocations.
///
/// All core business logic (data models, the consumer loop, connectors)
/// lives in the [`asset-export-core`] crate. This module is strictly for
/// CLI glue, ergonomic argument exposure, and orchestration.
///
/// ## How To Use
/// - For command-line users: use the installed `asset-export` binary with
///   `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed
///   [`Cli`].
///
/// ## Extending
/// When adding subcommands, update [`Commands`] below and keep all
/// non-trivial business logic inside `asset-export-core`.
///
use crate::load_config::load_config;
use anyhow::Result;
use asset_export_core::pipeline::Pipeline;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for asset-export: ship repository content assets to their configured
/// destination platforms.
#[derive(Parser)]
#[clap(
    name = "asset-export",
    version,
    about = "Consume the repository change journal and export flagged assets to object storage or the marketing platform"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consume the change journal from the last checkpoint and export every
    /// flagged asset
    Consume {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Export a single asset now, honouring its export directive
    Export {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Repository path of the asset, e.g. /content/dam/brand/logo.png
        #[clap(long)]
        asset_path: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Consume { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "consume", "starting journal consumption");
            let pipeline = Pipeline::from_config(config)?;
            match pipeline.consume().await {
                Ok(report) => {
                    tracing::info!(
                        command = "consume",
                        events = report.events_processed,
                        exported = report.exported,
                        dead_letters = report.dead_letters.len(),
                        "journal consumption complete"
                    );
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "consume", error = %e, "journal consumption failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Export { config, asset_path } => {
            let config = load_config(config)?;
            tracing::info!(command = "export", asset = %asset_path, "starting single-asset export");
            let pipeline = Pipeline::from_config(config)?;
            match pipeline.export_one(&asset_path).await {
                Ok(outcome) => {
                    tracing::info!(command = "export", asset = %asset_path, ?outcome, "single-asset export complete");
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "export", asset = %asset_path, error = %e, "single-asset export failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
