//! Environment Composer: builds the deterministic environment-variable
//! map injected into each instance's container at create time.
//!
//! `BTreeMap` (rather than `HashMap`) throughout, so iteration order --
//! and therefore any log/snapshot of a composed environment -- is
//! itself deterministic, not just its content.

mod error;

pub use error::ComposeError;

use std::collections::BTreeMap;

use crate::model::image::split_repo_tag;
use crate::resolver::ResolvedEnvironment;

/// Compose the full environment-variable map for `instance_name`.
///
/// Order of construction: discovery variables for every instance of
/// every service in `requires(S) ∪ wants_info(S) ∪ {S}` (transitively),
/// then the owning service's default `env`, then the instance's own
/// `env` -- each later layer overrides the previous on name collision,
/// so user-supplied values always win over discovery variables.
pub fn compose(resolved: &ResolvedEnvironment, instance_name: &str) -> Result<BTreeMap<String, String>, ComposeError> {
    let env = &resolved.environment;

    let instance = env
        .find_instance(instance_name)
        .ok_or_else(|| ComposeError::UnknownInstance(instance_name.to_string()))?;
    let service = env
        .service_of_instance(instance_name)
        .expect("instance looked up by name belongs to exactly one service");

    let mut vars = BTreeMap::new();

    let image_ref = instance.image.as_deref().unwrap_or(&service.image);
    let (repo, tag) = split_repo_tag(image_ref);
    vars.insert("DOCKER_IMAGE".to_string(), repo);
    vars.insert("DOCKER_TAG".to_string(), tag);
    vars.insert("SERVICE_NAME".to_string(), service.name.clone());
    vars.insert("CONTAINER_NAME".to_string(), instance.name.clone());

    let own_ship = env
        .ships
        .get(&instance.ship)
        .ok_or_else(|| ComposeError::UnknownShip {
            instance: instance.name.clone(),
            ship: instance.ship.clone(),
        })?;
    vars.insert("CONTAINER_HOST_ADDRESS".to_string(), own_ship.host_address().to_string());

    for dep_service_name in resolved.discovery_closure(&service.name) {
        let Some(dep_service) = env.services.get(&dep_service_name) else {
            continue;
        };

        let mut instance_names: Vec<&String> = dep_service.instances.keys().collect();
        instance_names.sort();

        for dep_instance_name in instance_names {
            let dep_instance = &dep_service.instances[dep_instance_name];
            let Some(dep_ship) = env.ships.get(&dep_instance.ship) else {
                continue;
            };

            let prefix = format!(
                "{}_{}",
                normalize_var_component(&dep_service.name),
                normalize_var_component(&dep_instance.name)
            );

            vars.insert(format!("{prefix}_HOST"), dep_ship.host_address().to_string());

            for port in &dep_instance.ports {
                let port_prefix = format!("{prefix}_{}", normalize_var_component(&port.name));
                vars.insert(format!("{port_prefix}_PORT"), port.external_port.to_string());
                vars.insert(format!("{port_prefix}_INTERNAL_PORT"), port.exposed_port.to_string());
            }
        }
    }

    for (key, value) in &service.env {
        vars.insert(normalize_var_component(key), value.flatten());
    }
    for (key, value) in &instance.env {
        vars.insert(normalize_var_component(key), value.flatten());
    }

    Ok(vars)
}

/// Environment variable names are uppercased with `-` and `.` folded to
/// `_`, so service/instance/port names that are valid YAML keys but not
/// valid shell identifiers still produce usable variable names.
fn normalize_var_component(name: &str) -> String {
    name.to_uppercase().replace(['-', '.'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;
    use crate::resolver::resolve;

    fn resolved(yaml: &str) -> ResolvedEnvironment {
        resolve(load_str(yaml, "<test>").unwrap()).unwrap()
    }

    const SAMPLE: &str = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  redis:
    image: "redis:7"
    instances:
      redis-1:
        ship: vm1
        ports:
          redis: "6379:16379"
  web:
    image: "myorg/web:latest"
    requires: [redis]
    env:
      LOG_LEVEL: info
    instances:
      web-1:
        ship: vm1
        env:
          LOG_LEVEL: debug
          EXTRA: hello
"#;

    #[test]
    fn base_variables_are_present() {
        let r = resolved(SAMPLE);
        let vars = compose(&r, "web-1").unwrap();
        assert_eq!(vars["DOCKER_IMAGE"], "myorg/web");
        assert_eq!(vars["DOCKER_TAG"], "latest");
        assert_eq!(vars["SERVICE_NAME"], "web");
        assert_eq!(vars["CONTAINER_NAME"], "web-1");
        assert_eq!(vars["CONTAINER_HOST_ADDRESS"], "10.0.0.5");
    }

    #[test]
    fn discovery_variables_reach_required_dependency() {
        let r = resolved(SAMPLE);
        let vars = compose(&r, "web-1").unwrap();
        assert_eq!(vars["REDIS_REDIS_1_HOST"], "10.0.0.5");
        assert_eq!(vars["REDIS_REDIS_1_REDIS_PORT"], "16379");
        assert_eq!(vars["REDIS_REDIS_1_REDIS_INTERNAL_PORT"], "6379");
    }

    #[test]
    fn instance_env_overrides_service_env_and_discovery_vars() {
        let r = resolved(SAMPLE);
        let vars = compose(&r, "web-1").unwrap();
        assert_eq!(vars["LOG_LEVEL"], "debug");
        assert_eq!(vars["EXTRA"], "hello");
    }

    #[test]
    fn hyphenated_names_normalize_to_underscored_uppercase() {
        let yaml = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  my-cache:
    image: redis
    instances:
      cache.primary:
        ship: vm1
        ports:
          client-port: 6379
  app:
    image: app
    requires: [my-cache]
    instances:
      app-1: { ship: vm1 }
"#;
        let r = resolved(yaml);
        let vars = compose(&r, "app-1").unwrap();
        assert_eq!(vars["MY_CACHE_CACHE_PRIMARY_HOST"], "10.0.0.5");
        assert_eq!(vars["MY_CACHE_CACHE_PRIMARY_CLIENT_PORT_PORT"], "6379");
    }

    #[test]
    fn unknown_instance_is_rejected() {
        let r = resolved(SAMPLE);
        assert!(matches!(compose(&r, "nope"), Err(ComposeError::UnknownInstance(_))));
    }
}
