//! CLI command surface: subcommand parsing and dispatch. Kept thin --
//! the Config Loader, Dependency Resolver, Environment Composer,
//! Container Controller and Orchestrator do the actual work; this
//! module wires flags to them and reports the result.

pub mod dispatch;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "maestro")]
#[command(about = "Dependency-ordered multi-host container orchestration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the environment file.
    #[arg(short = 'f', long = "file", global = true, default_value = "./maestro.yaml")]
    pub file: String,

    /// Ignore dependency ordering: operate on exactly the matched
    /// instances, all at once, in no particular order.
    #[arg(short = 'o', long = "ignore-ordering", global = true)]
    pub ignore_ordering: bool,

    /// Force an image refresh (pull) even if already present locally.
    #[arg(short = 'r', long = "refresh", global = true)]
    pub force_refresh: bool,

    /// Concurrency limit per ship.
    #[arg(short = 'c', long = "concurrency", global = true, default_value_t = 1)]
    pub concurrency_per_ship: usize,

    /// Abort the walk on the first per-instance failure.
    #[arg(long = "stop-on-failure", global = true)]
    pub stop_on_failure: bool,

    /// Increase log verbosity. Repeatable (-v, -vv).
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report each targeted instance's current state.
    Status { targets: Vec<String> },
    /// Pull (if needed), create, start, and probe each targeted instance.
    Start { targets: Vec<String> },
    /// Stop each targeted instance and probe for the stopped state.
    Stop { targets: Vec<String> },
    /// Stop then start each targeted instance.
    Restart { targets: Vec<String> },
    /// Stop (best-effort) and remove each targeted instance's container.
    Clean { targets: Vec<String> },
    /// Tail a single instance's container log.
    Logs {
        instance: String,
        #[arg(long, default_value_t = 200)]
        tail: u32,
    },
}
