//! Chatloom - conversation capture and resumable export pipeline.
//!
//! Main entry point for the chatloom CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd_capture;
mod cmd_export;
mod config;
mod renderers;

use config::AppConfig;

/// Chatloom CLI.
#[derive(Parser)]
#[command(name = "chatloom")]
#[command(about = "Reconstruct and export conversations from document-tree snapshots")]
#[command(version)]
struct Cli {
    /// Configuration file path (JSON; built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct turns from a page snapshot and print them as JSON
    Capture {
        /// Page snapshot file (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        /// Emit flattened per-message records instead of turn pairs
        #[arg(long)]
        messages: bool,
    },

    /// Run the full export pipeline over a page snapshot
    Export {
        /// Page snapshot file (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        /// Output file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (json, markdown, pdf, image)
        #[arg(long, default_value = "json")]
        format: String,

        /// Preferred font size for rendered formats
        #[arg(long)]
        font_size: Option<u32>,

        /// Session identifier for pending-state persistence (defaults to the
        /// snapshot's URL)
        #[arg(long)]
        session: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Capture { snapshot, messages } => {
            cmd_capture::run(&config, &snapshot, messages).await
        }
        Commands::Export {
            snapshot,
            output,
            format,
            font_size,
            session,
        } => {
            let format = cmd_export::parse_format(&format)?;
            cmd_export::run(
                &config,
                cmd_export::ExportArgs {
                    snapshot,
                    output,
                    format,
                    font_size,
                    session,
                },
            )
            .await
        }
    }
}
