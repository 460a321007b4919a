//! Instance entity: one container placement (service + ship + name).

use std::collections::HashMap;

use serde::Deserialize;

use super::lifecycle::{LifecycleChecks, RawLifecycleChecks};
use super::port::{parse_port, PortParseError, PortSpec, RawPort};
use super::volume::{parse_byte_size, RawRestartPolicy, RawVolume, RestartPolicy, VolumeBinding};

/// Network mode for a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetMode {
    Bridge,
    Host,
    Container(String),
    None,
}

impl NetMode {
    fn parse(s: &str) -> Result<Self, String> {
        if s == "bridge" {
            Ok(NetMode::Bridge)
        } else if s == "host" {
            Ok(NetMode::Host)
        } else if s == "none" {
            Ok(NetMode::None)
        } else if let Some(target) = s.strip_prefix("container:") {
            Ok(NetMode::Container(target.to_string()))
        } else {
            Err(format!("invalid net mode '{s}'"))
        }
    }
}

impl Default for NetMode {
    fn default() -> Self {
        NetMode::Bridge
    }
}

/// Resource limits; byte-size fields already normalized to bytes.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    pub memory: Option<u64>,
    pub cpu: Option<f64>,
    pub swap: Option<u64>,
}

/// A single container placement.
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub service: String,
    pub ship: String,
    pub image: Option<String>,
    pub ports: Vec<PortSpec>,
    pub volumes: HashMap<String, VolumeBinding>,
    pub container_volumes: Vec<String>,
    pub volumes_from: Vec<String>,
    pub env: HashMap<String, EnvValue>,
    pub privileged: bool,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub extra_hosts: HashMap<String, String>,
    pub stop_timeout: u32,
    pub limits: ResourceLimits,
    pub log_driver: Option<String>,
    pub log_opt: HashMap<String, String>,
    pub command: Option<String>,
    pub net: NetMode,
    pub restart: Option<RestartPolicy>,
    pub dns: Vec<String>,
    pub links: HashMap<String, String>,
    pub lifecycle: LifecycleChecks,
}

impl Instance {
    pub fn port_by_name(&self, name: &str) -> Option<&PortSpec> {
        self.ports.iter().find(|p| p.name == name)
    }
}

/// A user-supplied environment value, which may be a scalar or a
/// (possibly nested) list that gets space-joined when composed.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Scalar(String),
    Number(i64),
    List(Vec<EnvValue>),
}

impl EnvValue {
    /// Flatten nested lists into a single space-joined string.
    pub fn flatten(&self) -> String {
        match self {
            EnvValue::Scalar(s) => s.clone(),
            EnvValue::Number(n) => n.to_string(),
            EnvValue::List(items) => items
                .iter()
                .map(|v| v.flatten())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResourceLimits {
    pub memory: Option<String>,
    pub cpu: Option<f64>,
    pub swap: Option<String>,
}

impl RawResourceLimits {
    fn into_limits(self) -> Result<ResourceLimits, String> {
        Ok(ResourceLimits {
            memory: self.memory.as_deref().map(parse_byte_size).transpose()?,
            cpu: self.cpu,
            swap: self.swap.as_deref().map(parse_byte_size).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInstance {
    pub ship: String,
    pub image: Option<String>,
    #[serde(default)]
    pub ports: HashMap<String, RawPort>,
    #[serde(default)]
    pub volumes: HashMap<String, RawVolume>,
    #[serde(default)]
    pub container_volumes: Vec<String>,
    #[serde(default)]
    pub volumes_from: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub cap_add: Vec<String>,
    #[serde(default)]
    pub cap_drop: Vec<String>,
    #[serde(default)]
    pub extra_hosts: HashMap<String, String>,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u32,
    #[serde(default)]
    pub limits: RawResourceLimits,
    pub log_driver: Option<String>,
    #[serde(default)]
    pub log_opt: HashMap<String, String>,
    pub command: Option<String>,
    #[serde(default = "default_net")]
    pub net: String,
    pub restart: Option<RawRestartPolicy>,
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(default)]
    pub links: HashMap<String, String>,
    #[serde(default)]
    pub lifecycle: RawLifecycleChecks,
}

fn default_stop_timeout() -> u32 {
    10
}

fn default_net() -> String {
    "bridge".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum InstanceBuildError {
    #[error("instance '{instance}': {source}")]
    Port {
        instance: String,
        #[source]
        source: PortParseError,
    },
    #[error("instance '{instance}': {reason}")]
    Other { instance: String, reason: String },
}

impl RawInstance {
    pub fn into_instance(
        self,
        name: &str,
        service: &str,
    ) -> Result<Instance, InstanceBuildError> {
        let mut ports = Vec::new();
        for (port_name, raw_port) in &self.ports {
            let spec = parse_port(port_name, raw_port).map_err(|source| InstanceBuildError::Port {
                instance: name.to_string(),
                source,
            })?;
            ports.push(spec);
        }
        ports.sort_by(|a, b| a.name.cmp(&b.name));

        let mut volumes = HashMap::new();
        for (host_or_key, raw_volume) in self.volumes {
            let (host, binding) = match &raw_volume {
                RawVolume::Short(_) => raw_volume.clone().into_binding().map_err(|reason| {
                    InstanceBuildError::Other {
                        instance: name.to_string(),
                        reason,
                    }
                })?,
                RawVolume::Long { .. } => {
                    let target = raw_volume.target().map_err(|reason| InstanceBuildError::Other {
                        instance: name.to_string(),
                        reason,
                    })?;
                    let mode = raw_volume.mode().map_err(|reason| InstanceBuildError::Other {
                        instance: name.to_string(),
                        reason,
                    })?;
                    (
                        host_or_key.clone(),
                        VolumeBinding { target, mode },
                    )
                }
            };
            volumes.insert(host, binding);
        }

        let net = NetMode::parse(&self.net).map_err(|reason| InstanceBuildError::Other {
            instance: name.to_string(),
            reason,
        })?;

        let limits = self.limits.into_limits().map_err(|reason| InstanceBuildError::Other {
            instance: name.to_string(),
            reason,
        })?;

        Ok(Instance {
            name: name.to_string(),
            service: service.to_string(),
            ship: self.ship,
            image: self.image,
            ports,
            volumes,
            container_volumes: self.container_volumes,
            volumes_from: self.volumes_from,
            env: self.env,
            privileged: self.privileged,
            cap_add: self.cap_add,
            cap_drop: self.cap_drop,
            extra_hosts: self.extra_hosts,
            stop_timeout: self.stop_timeout,
            limits,
            log_driver: self.log_driver,
            log_opt: self.log_opt,
            command: self.command,
            net,
            restart: self.restart.map(|r| r.into_policy()),
            dns: self.dns,
            links: self.links,
            lifecycle: self.lifecycle.into_checks(),
        })
    }
}
