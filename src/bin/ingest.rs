//! Recipe corpus ingestion, as a one-shot job or an HTTP service.
//! Run with: cargo run --bin apex-ingest -- [run --source DIR | serve --port N]

use std::path::PathBuf;

use anyhow::{Context, Result};
use apex_ai::config::IngestConfig;
use apex_ai::ingest::{IngestService, serve_ingest};
use apex_ai::start_apex_ai::{init_tracing, shutdown_signal};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "apex-ingest")]
#[command(about = "Index the how-to-cook recipes into Chroma", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the collection once and print the report
    Run {
        /// Markdown corpus directory
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Expose the job over HTTP
    Serve {
        /// Listen port (defaults to PORT or 3001)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = IngestConfig::from_env().context("invalid ingestion configuration")?;
    let service = IngestService::from_config(&config).context("failed to build ingestion service")?;

    match cli.command.unwrap_or(Commands::Run { source: None }) {
        Commands::Run { source } => {
            let service = match source {
                Some(dir) => service.with_source_dir(dir),
                None => service,
            };
            info!(source = %service.source_dir().display(), "Starting ingestion");
            let report = service.run().await.context("ingestion failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                anyhow::bail!("ingestion did not complete");
            }
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            serve_ingest(service, port, shutdown_signal())
                .await
                .context("ingestion service failed")?;
        }
    }
    Ok(())
}
