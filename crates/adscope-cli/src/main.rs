//! Adscope - Ads Library scraper.
//!
//! Thin command-line shell over the scrape job orchestrator. Logs go to
//! stderr so job status JSON on stdout stays machine-readable.

mod cli;

use clap::Parser;
use tracing::info;

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,adscope=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting Adscope v{}", env!("CARGO_PKG_VERSION"));

    cli::run(cli::Cli::parse()).await
}
