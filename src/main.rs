//! maestro: dependency-ordered multi-host container orchestration CLI.

use anyhow::Result;
use clap::Parser;
use tracing::error;

use maestro_rs::cmd::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("maestro_rs={log_level}").into()),
        )
        .init();

    match cmd::dispatch::run(&cli).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}
