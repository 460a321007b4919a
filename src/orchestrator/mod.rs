//! Orchestrator: selects a target set, walks it in dependency order,
//! and dispatches per-instance `Container Controller` actions with
//! bounded per-ship parallelism.
//!
//! Scheduling is grounded on the teacher's `server::Manager` (a
//! `DashMap`-backed registry of work processed via
//! `semaphore.clone().acquire_owned().await` + `tokio::spawn`),
//! composed with the teacher's `system::Locker` pattern: here, one
//! `Locker` per ship, sized by `-c N`, gates container operations on
//! that ship, so two instances scheduled in the same level but on
//! different ships run fully concurrently. The walk advances to the
//! next service only once every instance in the current one has
//! terminated -- a failure doesn't abort later services unless
//! `--stop-on-failure` is set.

mod command;
mod error;
mod target;

pub use command::Command;
pub use error::OrchestratorError;
pub use target::TargetSet;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Configuration;
use crate::controller::{Controller, InstanceState};
use crate::resolver::ResolvedEnvironment;
use crate::system::Locker;

/// The result of one instance's operation, as recorded in the result
/// map the final reporter reads.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success,
    /// `status` doesn't mutate anything; its result is the observed state.
    Status(InstanceState),
    Failed(String),
    /// Never attempted -- the walk was interrupted or aborted under
    /// `--stop-on-failure` before this instance's level ran.
    Skipped(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Status(_))
    }
}

/// Per-instance results of one orchestrator run.
pub struct OrchestratorReport {
    pub results: Arc<DashMap<String, Outcome>>,
}

impl OrchestratorReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.value().is_success())
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.results
            .iter()
            .filter_map(|r| match r.value() {
                Outcome::Failed(reason) => Some((r.key().clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }
}

pub struct Orchestrator {
    controller: Arc<Controller>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            controller: Arc::new(Controller::new()),
        }
    }

    /// Select, order, and run `command` over `raw_targets`.
    pub async fn run(
        &self,
        resolved: Arc<ResolvedEnvironment>,
        command: Command,
        raw_targets: &[String],
        config: &Configuration,
        cancellation: CancellationToken,
    ) -> OrchestratorReport {
        let target_set = target::expand(&resolved, command, raw_targets, config.ignore_ordering);
        let results: Arc<DashMap<String, Outcome>> = Arc::new(DashMap::new());

        let lockers: Arc<HashMap<String, Arc<Locker>>> = Arc::new(
            resolved
                .environment
                .ships
                .keys()
                .map(|name| (name.clone(), Arc::new(Locker::with_capacity(config.concurrency_per_ship))))
                .collect(),
        );

        info!(command = %command, instances = target_set.instance_count(), "orchestrator run starting");

        let mut aborted = false;

        for level in &target_set.levels {
            if aborted {
                mark_skipped(&results, level, "walk aborted before this instance ran");
                continue;
            }

            if cancellation.is_cancelled() {
                mark_skipped(&results, level, "interrupted before this level ran");
                aborted = true;
                continue;
            }

            let mut handles = Vec::with_capacity(level.len());
            for instance_name in level {
                let controller = self.controller.clone();
                let resolved = resolved.clone();
                let lockers = lockers.clone();
                let results = results.clone();
                let instance_name = instance_name.clone();
                let force_refresh = config.force_refresh;
                let cancellation = cancellation.clone();

                handles.push(tokio::spawn(async move {
                    run_one(
                        &controller,
                        &resolved,
                        &lockers,
                        &results,
                        &instance_name,
                        command,
                        force_refresh,
                        &cancellation,
                    )
                    .await;
                }));
            }

            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "orchestrator worker task panicked");
                }
            }

            if config.stop_on_failure && level.iter().any(|i| matches!(results.get(i).map(|r| r.value().clone()), Some(Outcome::Failed(_)))) {
                warn!("stopping walk after failure in this level (--stop-on-failure)");
                aborted = true;
            }
        }

        OrchestratorReport { results }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one(
    controller: &Controller,
    resolved: &ResolvedEnvironment,
    lockers: &HashMap<String, Arc<Locker>>,
    results: &DashMap<String, Outcome>,
    instance_name: &str,
    command: Command,
    force_refresh: bool,
    cancellation: &CancellationToken,
) {
    let Some(instance) = resolved.environment.find_instance(instance_name) else {
        results.insert(instance_name.to_string(), Outcome::Failed("instance not found".to_string()));
        return;
    };
    let ship_name = instance.ship.clone();

    let Some(locker) = lockers.get(&ship_name) else {
        results.insert(instance_name.to_string(), Outcome::Failed(format!("unknown ship '{ship_name}'")));
        return;
    };

    let guard = tokio::select! {
        guard = locker.acquire() => guard,
        _ = cancellation.cancelled() => {
            results.insert(instance_name.to_string(), Outcome::Skipped("interrupted while waiting for the ship lock".to_string()));
            return;
        }
    };
    let _guard = match guard {
        Ok(g) => g,
        Err(e) => {
            results.insert(instance_name.to_string(), Outcome::Failed(e.to_string()));
            return;
        }
    };

    let outcome = match command {
        Command::Status => match controller.status(resolved, instance_name).await {
            Ok(state) => Outcome::Status(state),
            Err(e) => Outcome::Failed(e.to_string()),
        },
        Command::Start => controller
            .start(resolved, instance_name, force_refresh)
            .await
            .map(|_| Outcome::Success)
            .unwrap_or_else(|e| Outcome::Failed(e.to_string())),
        Command::Stop => controller
            .stop(resolved, instance_name)
            .await
            .map(|_| Outcome::Success)
            .unwrap_or_else(|e| Outcome::Failed(e.to_string())),
        Command::Restart => controller
            .restart(resolved, instance_name, force_refresh)
            .await
            .map(|_| Outcome::Success)
            .unwrap_or_else(|e| Outcome::Failed(e.to_string())),
        Command::Clean => controller
            .clean(resolved, instance_name)
            .await
            .map(|_| Outcome::Success)
            .unwrap_or_else(|e| Outcome::Failed(e.to_string())),
    };

    if let Outcome::Failed(ref reason) = outcome {
        warn!(instance = instance_name, %command, reason, "instance operation failed");
    } else {
        info!(instance = instance_name, %command, "instance operation completed");
    }

    results.insert(instance_name.to_string(), outcome);
}

fn mark_skipped(results: &DashMap<String, Outcome>, level: &[String], reason: &str) {
    for instance in level {
        results.insert(instance.clone(), Outcome::Skipped(reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_succeeds_only_when_every_outcome_is_success_or_status() {
        let results: Arc<DashMap<String, Outcome>> = Arc::new(DashMap::new());
        results.insert("a".to_string(), Outcome::Success);
        results.insert("b".to_string(), Outcome::Status(InstanceState::Running));
        let report = OrchestratorReport { results: results.clone() };
        assert!(report.all_succeeded());

        results.insert("c".to_string(), Outcome::Failed("boom".to_string()));
        assert!(!report.all_succeeded());
        assert_eq!(report.failures(), vec![("c".to_string(), "boom".to_string())]);
    }

    #[test]
    fn mark_skipped_records_every_instance_in_the_level() {
        let results: Arc<DashMap<String, Outcome>> = Arc::new(DashMap::new());
        mark_skipped(&results, &["a".to_string(), "b".to_string()], "aborted");
        assert_eq!(results.len(), 2);
        assert!(matches!(results.get("a").unwrap().value(), Outcome::Skipped(reason) if reason == "aborted"));
    }
}
