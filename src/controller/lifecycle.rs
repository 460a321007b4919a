//! Container create/start/stop/remove/pull, generalized from the
//! teacher's "one container per daemon process" model
//! (`environment::docker::container`/`power`) to "one container per
//! (ship, instance) pair" against a per-ship `bollard::Docker` handle.

use std::collections::{BTreeMap, HashMap};

use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, RestartPolicy as BollardRestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::model::volume::MountMode;
use crate::model::{Instance, NetMode, RegistryIndex};

use super::error::ControllerError;
use super::registry::credentials_for;
use super::state::InstanceState;

/// Inspect the remote daemon for the current state of `instance`'s
/// container.
pub async fn status(docker: &Docker, instance: &Instance) -> Result<InstanceState, ControllerError> {
    match docker.inspect_container(&instance.name, None).await {
        Ok(info) => {
            let running = info.state.as_ref().and_then(|s| s.running).unwrap_or(false);
            if running {
                Ok(InstanceState::Running)
            } else if info.state.as_ref().and_then(|s| s.started_at.clone()).is_some() {
                Ok(InstanceState::Stopped)
            } else {
                Ok(InstanceState::Created)
            }
        }
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(InstanceState::Absent),
        Err(source) => Err(ControllerError::Inspect {
            instance: instance.name.clone(),
            source,
        }),
    }
}

/// Pull `instance`'s resolved image if it isn't already present
/// locally, or unconditionally when `force_refresh` is set.
pub async fn ensure_image(
    docker: &Docker,
    instance: &Instance,
    image: &str,
    registries: &RegistryIndex,
    force_refresh: bool,
) -> Result<(), ControllerError> {
    if !force_refresh {
        match docker.inspect_image(image).await {
            Ok(_) => {
                debug!(%image, "image already present");
                return Ok(());
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                info!(%image, "image not found locally, pulling");
            }
            Err(e) => {
                warn!(%image, error = %e, "error inspecting image, attempting pull anyway");
            }
        }
    }

    let credentials = credentials_for(image, registries);
    let options = CreateImageOptions {
        from_image: image,
        ..Default::default()
    };

    let mut stream = docker.create_image(Some(options), None, credentials);
    while let Some(result) = stream.next().await {
        match result {
            Ok(progress) => {
                if let Some(status) = progress.status {
                    debug!(%image, %status, "pull progress");
                }
            }
            Err(source) => {
                return Err(ControllerError::Pull {
                    instance: instance.name.clone(),
                    source,
                })
            }
        }
    }

    info!(%image, "pulled image");
    Ok(())
}

/// Create (but do not start) the container for `instance`, using the
/// already-composed environment map.
pub async fn create(
    docker: &Docker,
    instance: &Instance,
    image: &str,
    composed_env: &BTreeMap<String, String>,
) -> Result<(), ControllerError> {
    let env_vars: Vec<String> = composed_env.iter().map(|(k, v)| format!("{k}={v}")).collect();

    let mut exposed_ports = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for port in &instance.ports {
        let key = format!("{}/{}", port.exposed_port, port.exposed_proto);
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: Some(port.bind_addr.clone()),
                host_port: Some(port.external_port.to_string()),
            }]),
        );
    }

    let mut binds = Vec::new();
    for (host_path, binding) in &instance.volumes {
        let mode = match binding.mode {
            MountMode::Ro => "ro",
            MountMode::Rw => "rw",
        };
        binds.push(format!("{}:{}:{}", host_path, binding.target, mode));
    }

    let mut container_volumes = HashMap::new();
    for path in &instance.container_volumes {
        container_volumes.insert(path.clone(), HashMap::new());
    }

    let network_mode = match &instance.net {
        NetMode::Bridge => "bridge".to_string(),
        NetMode::Host => "host".to_string(),
        NetMode::None => "none".to_string(),
        NetMode::Container(target) => format!("container:{target}"),
    };

    let restart_policy = instance.restart.as_ref().map(|policy| BollardRestartPolicy {
        name: restart_name(&policy.name),
        maximum_retry_count: policy.maximum_retry_count.map(|n| n as i64),
    });

    let links: Vec<String> = instance
        .links
        .iter()
        .map(|(target, alias)| format!("{target}:{alias}"))
        .collect();

    let extra_hosts: Vec<String> = instance
        .extra_hosts
        .iter()
        .map(|(host, ip)| format!("{host}:{ip}"))
        .collect();

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(binds),
        volumes_from: if instance.volumes_from.is_empty() {
            None
        } else {
            Some(instance.volumes_from.clone())
        },
        memory: instance.limits.memory.map(|m| m as i64),
        memory_swap: instance.limits.swap.map(|s| s as i64),
        cpu_quota: instance.limits.cpu.map(|c| (c * 100_000.0) as i64),
        cpu_period: instance.limits.cpu.map(|_| 100_000),
        privileged: Some(instance.privileged),
        cap_add: if instance.cap_add.is_empty() {
            None
        } else {
            Some(instance.cap_add.clone())
        },
        cap_drop: if instance.cap_drop.is_empty() {
            None
        } else {
            Some(instance.cap_drop.clone())
        },
        dns: if instance.dns.is_empty() {
            None
        } else {
            Some(instance.dns.clone())
        },
        extra_hosts: if extra_hosts.is_empty() { None } else { Some(extra_hosts) },
        links: if links.is_empty() { None } else { Some(links) },
        network_mode: Some(network_mode),
        restart_policy,
        log_config: instance.log_driver.as_ref().map(|driver| bollard::models::HostConfigLogConfig {
            typ: Some(driver.clone()),
            config: Some(instance.log_opt.clone()),
        }),
        ..Default::default()
    };

    let cmd = match &instance.command {
        Some(command) => Some(shell_words::split(command).map_err(|e| ControllerError::Other {
            instance: instance.name.clone(),
            reason: format!("invalid command '{command}': {e}"),
        })?),
        None => None,
    };

    let config = Config {
        hostname: Some(instance.name.clone()),
        image: Some(image.to_string()),
        env: Some(env_vars),
        cmd,
        exposed_ports: Some(exposed_ports),
        volumes: Some(container_volumes),
        host_config: Some(host_config),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: instance.name.clone(),
        platform: None,
    };

    docker
        .create_container(Some(options), config)
        .await
        .map(|_| ())
        .or_else(|e| {
            if let bollard::errors::Error::DockerResponseServerError { status_code: 409, .. } = e {
                debug!(instance = %instance.name, "container already exists");
                Ok(())
            } else {
                Err(ControllerError::Create {
                    instance: instance.name.clone(),
                    source: e,
                })
            }
        })
}

fn restart_name(name: &str) -> Option<RestartPolicyNameEnum> {
    match name {
        "no" => Some(RestartPolicyNameEnum::NO),
        "always" => Some(RestartPolicyNameEnum::ALWAYS),
        "on-failure" => Some(RestartPolicyNameEnum::ON_FAILURE),
        "unless-stopped" => Some(RestartPolicyNameEnum::UNLESS_STOPPED),
        _ => None,
    }
}

pub async fn start(docker: &Docker, instance: &Instance) -> Result<(), ControllerError> {
    let options = StartContainerOptions::<String>::default();
    match docker.start_container(&instance.name, Some(options)).await {
        Ok(_) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
        Err(source) => Err(ControllerError::Start {
            instance: instance.name.clone(),
            source,
        }),
    }
}

pub async fn stop(docker: &Docker, instance: &Instance) -> Result<(), ControllerError> {
    let options = StopContainerOptions {
        t: instance.stop_timeout as i64,
    };
    match docker.stop_container(&instance.name, Some(options)).await {
        Ok(_) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
        Err(source) => Err(ControllerError::Stop {
            instance: instance.name.clone(),
            source,
        }),
    }
}

pub async fn remove(docker: &Docker, instance: &Instance) -> Result<(), ControllerError> {
    let options = RemoveContainerOptions {
        force: true,
        v: false,
        ..Default::default()
    };
    match docker.remove_container(&instance.name, Some(options)).await {
        Ok(_) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
        Err(source) => Err(ControllerError::Remove {
            instance: instance.name.clone(),
            source,
        }),
    }
}

pub async fn logs(docker: &Docker, instance: &Instance, tail: u32) -> Result<Vec<String>, ControllerError> {
    let options = LogsOptions::<String> {
        stdout: true,
        stderr: true,
        tail: tail.to_string(),
        ..Default::default()
    };

    let mut stream = docker.logs(&instance.name, Some(options));
    let mut lines = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(output) => lines.push(output.to_string()),
            Err(source) => {
                return Err(ControllerError::Inspect {
                    instance: instance.name.clone(),
                    source,
                })
            }
        }
    }
    Ok(lines)
}
