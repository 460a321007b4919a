//! Environment: the top-level validated entity graph.

use std::collections::HashMap;

use super::service::Service;
use super::ship::{RegistryIndex, Ship};

/// A named collection of ships, registries and services -- exactly one
/// per process.
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub schema_version: u32,
    pub ships: HashMap<String, Ship>,
    pub registries: RegistryIndex,
    pub services: HashMap<String, Service>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentValidationError {
    #[error("instance '{instance}' of service '{service}' references unknown ship '{ship}'")]
    UnknownShip {
        service: String,
        instance: String,
        ship: String,
    },
    #[error("service '{service}' requires unknown service '{dependency}'")]
    UnknownRequires { service: String, dependency: String },
    #[error("service '{service}' wants_info on unknown service '{dependency}'")]
    UnknownWantsInfo { service: String, dependency: String },
    #[error("instance '{instance}' volumes_from unknown sibling instance '{target}'")]
    UnknownVolumesFrom { instance: String, target: String },
    #[error("instance '{instance}' volumes_from '{target}' which is on a different ship ('{target_ship}' vs '{own_ship}')")]
    VolumesFromDifferentShip {
        instance: String,
        target: String,
        own_ship: String,
        target_ship: String,
    },
    #[error("instance '{instance}' links to unknown sibling instance '{target}'")]
    UnknownLink { instance: String, target: String },
    #[error("instance '{instance}' lifecycle check references unknown port '{port}'")]
    UnknownPort { instance: String, port: String },
}

impl Environment {
    /// Check the structural invariants that the Config Loader is
    /// responsible for: every ship reference resolves, every
    /// dependency name resolves, every `volumes_from`/`links` sibling
    /// exists and lives on the same ship, every named-port reference in
    /// a lifecycle check resolves. Does *not* check for dependency
    /// cycles -- that's the Dependency Resolver's job.
    pub fn validate(&self) -> Result<(), EnvironmentValidationError> {
        for service in self.services.values() {
            for dep in &service.requires {
                if !self.services.contains_key(dep) {
                    return Err(EnvironmentValidationError::UnknownRequires {
                        service: service.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            for dep in &service.wants_info {
                if !self.services.contains_key(dep) {
                    return Err(EnvironmentValidationError::UnknownWantsInfo {
                        service: service.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }

            for instance in service.instances.values() {
                if !self.ships.contains_key(&instance.ship) {
                    return Err(EnvironmentValidationError::UnknownShip {
                        service: service.name.clone(),
                        instance: instance.name.clone(),
                        ship: instance.ship.clone(),
                    });
                }

                for sibling_name in &instance.volumes_from {
                    let sibling = self.find_instance(sibling_name).ok_or_else(|| {
                        EnvironmentValidationError::UnknownVolumesFrom {
                            instance: instance.name.clone(),
                            target: sibling_name.clone(),
                        }
                    })?;
                    if sibling.ship != instance.ship {
                        return Err(EnvironmentValidationError::VolumesFromDifferentShip {
                            instance: instance.name.clone(),
                            target: sibling_name.clone(),
                            own_ship: instance.ship.clone(),
                            target_ship: sibling.ship.clone(),
                        });
                    }
                }

                for sibling_name in instance.links.keys() {
                    if self.find_instance(sibling_name).is_none() {
                        return Err(EnvironmentValidationError::UnknownLink {
                            instance: instance.name.clone(),
                            target: sibling_name.clone(),
                        });
                    }
                }

                for check in instance
                    .lifecycle
                    .running
                    .iter()
                    .chain(instance.lifecycle.stopped.iter())
                    .chain(service.lifecycle.running.iter())
                    .chain(service.lifecycle.stopped.iter())
                {
                    if let super::lifecycle::LifecycleCheck::Tcp { port, .. } = check {
                        if instance.port_by_name(port).is_none() {
                            return Err(EnvironmentValidationError::UnknownPort {
                                instance: instance.name.clone(),
                                port: port.clone(),
                            });
                        }
                    }
                    if let super::lifecycle::LifecycleCheck::Http {
                        port: super::lifecycle::PortRef::Named(name),
                        ..
                    } = check
                    {
                        if instance.port_by_name(name).is_none() {
                            return Err(EnvironmentValidationError::UnknownPort {
                                instance: instance.name.clone(),
                                port: name.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    pub fn find_instance(&self, name: &str) -> Option<&super::instance::Instance> {
        self.services
            .values()
            .find_map(|s| s.instances.get(name))
    }

    pub fn service_of_instance(&self, instance_name: &str) -> Option<&Service> {
        self.services
            .values()
            .find(|s| s.instances.contains_key(instance_name))
    }

    pub fn all_instances(&self) -> impl Iterator<Item = &super::instance::Instance> {
        self.services.values().flat_map(|s| s.instances.values())
    }
}
