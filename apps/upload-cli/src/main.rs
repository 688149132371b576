//! Command-line uploader entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Upload a media file to the platform in resumable chunks.
#[derive(Parser)]
#[command(name = "kmcp-upload")]
#[command(version, about, long_about = None)]
struct Cli {
    /// File to upload
    file: PathBuf,

    /// Configuration file path (default: ~/.config/kmcp/upload.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial chunk size in KiB
    #[arg(long, value_name = "N")]
    chunk_kb: Option<f64>,

    /// Keep every chunk at the initial size
    #[arg(long)]
    no_adaptive: bool,

    /// Print the upload report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting kmcp-upload");

    let config = config::Config::load(cli.config.as_deref())?;
    let overrides = app::Overrides {
        chunk_kb: cli.chunk_kb,
        no_adaptive: cli.no_adaptive,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(&cli.file, config, &overrides, cli.json))
}
