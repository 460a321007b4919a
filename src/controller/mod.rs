//! Container Controller: the per-instance state machine that drives
//! pull/create/start/stop/remove against a ship's remote daemon and
//! gates transitions on the instance's lifecycle probes.

mod daemon;
mod error;
mod lifecycle;
mod registry;
mod state;

pub use daemon::DaemonPool;
pub use error::{ConnectionError, ControllerError};
pub use state::InstanceState;

use tracing::info;

use crate::compose::compose;
use crate::model::{CheckState, LifecycleChecks};
use crate::probes::{run_gate, ProbeContext};
use crate::resolver::ResolvedEnvironment;

/// Owns the per-ship daemon connection cache; cheap to clone-share via
/// `Arc` across orchestrator workers.
pub struct Controller {
    daemons: DaemonPool,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            daemons: DaemonPool::new(),
        }
    }

    async fn docker_for(
        &self,
        resolved: &ResolvedEnvironment,
        ship_name: &str,
        instance_name: &str,
    ) -> Result<bollard::Docker, ControllerError> {
        let ship = resolved.environment.ships.get(ship_name).ok_or_else(|| ControllerError::Other {
            instance: instance_name.to_string(),
            reason: format!("unknown ship '{ship_name}'"),
        })?;
        self.daemons
            .connect(ship)
            .await
            .map_err(|source| ControllerError::Connection {
                instance: instance_name.to_string(),
                source,
            })
    }

    pub async fn status(&self, resolved: &ResolvedEnvironment, instance_name: &str) -> Result<InstanceState, ControllerError> {
        let instance = resolved
            .environment
            .find_instance(instance_name)
            .ok_or_else(|| ControllerError::Other {
                instance: instance_name.to_string(),
                reason: "instance not found".to_string(),
            })?;
        let docker = self.docker_for(resolved, &instance.ship, instance_name).await?;
        lifecycle::status(&docker, instance).await
    }

    /// Pull (if needed), create, and start the instance's container,
    /// then gate on its `running` lifecycle checks.
    pub async fn start(&self, resolved: &ResolvedEnvironment, instance_name: &str, force_refresh: bool) -> Result<(), ControllerError> {
        let env = &resolved.environment;
        let instance = env.find_instance(instance_name).ok_or_else(|| ControllerError::Other {
            instance: instance_name.to_string(),
            reason: "instance not found".to_string(),
        })?;
        let service = env.service_of_instance(instance_name).expect("resolved instance belongs to a service");

        let docker = self.docker_for(resolved, &instance.ship, instance_name).await?;
        let image = instance.image.as_deref().unwrap_or(&service.image);

        lifecycle::ensure_image(&docker, instance, image, &env.registries, force_refresh).await?;

        let composed_env = compose(resolved, instance_name).map_err(|e| ControllerError::Other {
            instance: instance_name.to_string(),
            reason: e.to_string(),
        })?;

        lifecycle::create(&docker, instance, image, &composed_env).await?;
        lifecycle::start(&docker, instance).await?;
        info!(instance = instance_name, "container started");

        let ship = env.ships.get(&instance.ship).expect("validated instance ship reference");
        let gate = LifecycleChecks::merged(&service.lifecycle, &instance.lifecycle);
        let probe_ctx = ProbeContext::new(&ship.ip, instance, &composed_env);

        run_gate(gate.for_state(CheckState::Running), &probe_ctx)
            .await
            .map_err(|source| ControllerError::Probe {
                instance: instance_name.to_string(),
                source,
            })
    }

    /// Stop the instance's container, then gate on its `stopped`
    /// lifecycle checks.
    pub async fn stop(&self, resolved: &ResolvedEnvironment, instance_name: &str) -> Result<(), ControllerError> {
        let env = &resolved.environment;
        let instance = env.find_instance(instance_name).ok_or_else(|| ControllerError::Other {
            instance: instance_name.to_string(),
            reason: "instance not found".to_string(),
        })?;
        let service = env.service_of_instance(instance_name).expect("resolved instance belongs to a service");

        let docker = self.docker_for(resolved, &instance.ship, instance_name).await?;
        lifecycle::stop(&docker, instance).await?;
        info!(instance = instance_name, "container stopped");

        let composed_env = compose(resolved, instance_name).map_err(|e| ControllerError::Other {
            instance: instance_name.to_string(),
            reason: e.to_string(),
        })?;
        let ship = env.ships.get(&instance.ship).expect("validated instance ship reference");
        let gate = LifecycleChecks::merged(&service.lifecycle, &instance.lifecycle);
        let probe_ctx = ProbeContext::new(&ship.ip, instance, &composed_env);

        run_gate(gate.for_state(CheckState::Stopped), &probe_ctx)
            .await
            .map_err(|source| ControllerError::Probe {
                instance: instance_name.to_string(),
                source,
            })
    }

    pub async fn restart(&self, resolved: &ResolvedEnvironment, instance_name: &str, force_refresh: bool) -> Result<(), ControllerError> {
        self.stop(resolved, instance_name).await?;
        self.start(resolved, instance_name, force_refresh).await
    }

    /// Stop (best-effort) and remove the instance's container.
    pub async fn clean(&self, resolved: &ResolvedEnvironment, instance_name: &str) -> Result<(), ControllerError> {
        let env = &resolved.environment;
        let instance = env.find_instance(instance_name).ok_or_else(|| ControllerError::Other {
            instance: instance_name.to_string(),
            reason: "instance not found".to_string(),
        })?;
        let docker = self.docker_for(resolved, &instance.ship, instance_name).await?;

        let _ = lifecycle::stop(&docker, instance).await;
        lifecycle::remove(&docker, instance).await?;
        info!(instance = instance_name, "container removed");
        Ok(())
    }

    pub async fn logs(&self, resolved: &ResolvedEnvironment, instance_name: &str, tail: u32) -> Result<Vec<String>, ControllerError> {
        let env = &resolved.environment;
        let instance = env.find_instance(instance_name).ok_or_else(|| ControllerError::Other {
            instance: instance_name.to_string(),
            reason: "instance not found".to_string(),
        })?;
        let docker = self.docker_for(resolved, &instance.ship, instance_name).await?;
        lifecycle::logs(&docker, instance, tail).await
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}
