//! YAML environment file loading: the Config Loader component.
//!
//! Reads the declarative file, resolves the schema version, applies
//! ship defaults, normalizes port specs, and validates structural
//! constraints. Does *not* resolve dependencies or compose container
//! environments -- those are later, explicit passes (`resolver`,
//! `compose`).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::model::service::RawService;
use crate::model::ship::RawShip;
use crate::model::{Environment, Registry, RegistryIndex, Service};

use super::error::ConfigError;

pub const MAX_SUPPORTED_SCHEMA: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
struct MaestroMeta {
    #[serde(default = "default_schema")]
    schema: u32,
}

fn default_schema() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct RawEnvironment {
    __maestro: Option<MaestroMeta>,
    name: String,
    #[serde(default)]
    registries: HashMap<String, Registry>,
    #[serde(default)]
    ship_defaults: RawShip,
    ships: HashMap<String, RawShip>,
    services: HashMap<String, RawService>,
}

/// Load and validate an environment file from `path`.
pub fn load(path: &str) -> Result<Environment, ConfigError> {
    let content = std::fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;

    load_str(&content, path)
}

/// Parse an already-read environment file. Exposed separately so tests
/// and tooling can exercise the loader without touching the filesystem.
pub fn load_str(content: &str, source_name: &str) -> Result<Environment, ConfigError> {
    let raw: RawEnvironment = serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
        path: source_name.to_string(),
        source,
    })?;

    let schema = raw.__maestro.map(|m| m.schema).unwrap_or_else(default_schema);
    if schema > MAX_SUPPORTED_SCHEMA {
        return Err(ConfigError::SchemaVersion {
            found: schema,
            max_supported: MAX_SUPPORTED_SCHEMA,
        });
    }
    debug!(schema, "resolved environment schema version");

    let mut ships = HashMap::new();
    for (name, raw_ship) in raw.ships {
        debug!(ship = %name, "applying ship defaults");
        let merged = raw_ship.merged_with_defaults(&raw.ship_defaults);
        let ship = merged.into_ship(&name).map_err(|reason| ConfigError::Ship {
            name: name.clone(),
            reason,
        })?;
        ships.insert(name, ship);
    }

    let mut services = HashMap::new();
    for (name, raw_service) in raw.services {
        let service: Service = raw_service.into_service(&name).map_err(|reason| ConfigError::Service {
            name: name.clone(),
            reason,
        })?;
        services.insert(name, service);
    }

    let env = Environment {
        name: raw.name,
        schema_version: schema,
        ships,
        registries: RegistryIndex::new(raw.registries),
        services,
    };

    env.validate()?;

    debug!(
        ships = env.ships.len(),
        services = env.services.len(),
        "environment loaded"
    );

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: demo
ship_defaults:
  docker_port: 2375
  timeout: 30
ships:
  vm1:
    ip: 10.0.0.5
services:
  redis:
    image: "redis:latest"
    instances:
      redis-1:
        ship: vm1
        ports:
          redis: "6379:6379"
  web:
    image: "web:latest"
    requires: [redis]
    instances:
      web-1:
        ship: vm1
"#;

    #[test]
    fn loads_sample_environment() {
        let env = load_str(SAMPLE, "<test>").unwrap();
        assert_eq!(env.name, "demo");
        assert_eq!(env.schema_version, 1);
        let ship = env.ships.get("vm1").unwrap();
        assert_eq!(ship.docker_port, 2375);
        assert_eq!(ship.timeout, 30);

        let web = env.services.get("web").unwrap();
        assert_eq!(web.requires, vec!["redis".to_string()]);
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let content = "__maestro:\n  schema: 99\nname: x\nships: {}\nservices: {}\n";
        let err = load_str(content, "<test>").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaVersion { found: 99, .. }));
    }

    #[test]
    fn unknown_ship_reference_is_rejected() {
        let content = r#"
name: demo
ships:
  vm1:
    ip: 10.0.0.5
services:
  web:
    image: "web:latest"
    instances:
      web-1:
        ship: vm2
"#;
        let err = load_str(content, "<test>").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn load_reads_an_environment_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maestro.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let env = load(path.to_str().unwrap()).unwrap();
        assert_eq!(env.name, "demo");
    }

    #[test]
    fn load_surfaces_io_errors_for_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.yaml");

        let err = load(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
