//! Exec probe: shell-interpreted command run against the orchestrator
//! host, retried up to `attempts` times with `delay` between tries.
//!
//! Shell-interpreted (`sh -c "<command>"`), not argv-split: a
//! `maestro.yaml` author who can set an `exec` check already has
//! equivalent access to the target ship's daemon, so this is accepted
//! risk rather than a gap to close.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::context::ProbeContext;
use super::error::ProbeError;

pub async fn run(command: &str, attempts: u32, delay: Duration, ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let tag = format!("exec({command})");

    for attempt in 1..=attempts.max(1) {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .envs(ctx.composed_env)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProbeError::Failure {
                tag: tag.clone(),
                reason: format!("failed to spawn: {e}"),
            })?;

        let status = child.wait().await.map_err(|e| ProbeError::Failure {
            tag: tag.clone(),
            reason: format!("failed to wait on child: {e}"),
        })?;

        if status.success() {
            debug!(%command, attempt, "exec probe succeeded");
            return Ok(());
        }

        warn!(%command, attempt, attempts, "exec probe attempt failed");
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(ProbeError::Failure {
        tag,
        reason: format!("command did not succeed within {attempts} attempts"),
    })
}
