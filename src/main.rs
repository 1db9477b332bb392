//! mozbuilds - Mozilla Android build finder
//!
//! Entry point: sets up logging, parses the command line and runs it.

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mozbuilds::commands::{self, Cli};
use mozbuilds::{APP_NAME, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    debug!("{} v{} starting", APP_NAME, VERSION);
    commands::run(cli).await
}

/// Log to stderr; `RUST_LOG` wins over `-v`
fn init_logging(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}
