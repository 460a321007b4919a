//! Subcommand dispatch: loads the environment file, resolves it, and
//! drives either the Orchestrator (status/start/stop/restart/clean) or
//! the Container Controller directly (logs, which isn't part of the
//! dependency-ordered walk).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{self, Configuration};
use crate::controller::Controller;
use crate::orchestrator::{Command, Orchestrator, Outcome};
use crate::resolver;

use super::{Cli, Commands};

/// Run the parsed CLI invocation. Returns `Ok(true)` iff every targeted
/// operation succeeded -- the caller turns that into the process exit code.
pub async fn run(cli: &Cli) -> Result<bool> {
    let environment = config::load(&cli.file).with_context(|| format!("loading environment file '{}'", cli.file))?;
    environment.validate().context("validating environment")?;
    info!(environment = %environment.name, ships = environment.ships.len(), services = environment.services.len(), "environment loaded");

    let resolved = Arc::new(resolver::resolve(environment).context("resolving dependency graph")?);

    if let Commands::Logs { instance, tail } = &cli.command {
        let controller = Controller::new();
        let lines = controller
            .logs(&resolved, instance, *tail)
            .await
            .with_context(|| format!("fetching logs for '{instance}'"))?;
        for line in lines {
            println!("{line}");
        }
        return Ok(true);
    }

    let settings = Configuration {
        env_file: cli.file.clone(),
        ignore_ordering: cli.ignore_ordering,
        force_refresh: cli.force_refresh,
        concurrency_per_ship: cli.concurrency_per_ship.max(1),
        stop_on_failure: cli.stop_on_failure,
    };

    let (command, targets) = match &cli.command {
        Commands::Status { targets } => (Command::Status, targets),
        Commands::Start { targets } => (Command::Start, targets),
        Commands::Stop { targets } => (Command::Stop, targets),
        Commands::Restart { targets } => (Command::Restart, targets),
        Commands::Clean { targets } => (Command::Clean, targets),
        Commands::Logs { .. } => unreachable!("handled above"),
    };

    let cancellation = CancellationToken::new();
    let ctrl_c_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received interrupt, finishing in-flight work and stopping the walk");
            ctrl_c_token.cancel();
        }
    });

    let orchestrator = Orchestrator::new();
    let report = orchestrator.run(resolved, command, targets, &settings, cancellation).await;

    let mut names: Vec<String> = report.results.iter().map(|r| r.key().clone()).collect();
    names.sort();
    for name in names {
        let outcome = report.results.get(&name).map(|r| r.value().clone());
        match outcome {
            Some(Outcome::Success) => println!("{name}: ok"),
            Some(Outcome::Status(state)) => println!("{name}: {state}"),
            Some(Outcome::Failed(reason)) => {
                error!(instance = %name, %reason, "failed");
                println!("{name}: failed ({reason})");
            }
            Some(Outcome::Skipped(reason)) => {
                println!("{name}: skipped ({reason})");
            }
            None => {}
        }
    }

    Ok(report.all_succeeded())
}
