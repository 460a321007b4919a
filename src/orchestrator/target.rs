//! Target-set expansion: turns the CLI's raw positional arguments into
//! the concrete, ordered list of instances an operation will run
//! against.
//!
//! Expansion has two independent axes: which instances are *explicitly*
//! named (by substring match against service or instance names, empty
//! meaning "all non-omitted services"), and which *additional* services
//! the dependency graph pulls in so the operation doesn't strand a
//! dependency or a dependent (skipped entirely under `-o`).

use std::collections::BTreeSet;

use super::command::Command;
use crate::resolver::ResolvedEnvironment;

/// The instances an operation will run against, plus the service order
/// to walk them in.
#[derive(Debug, Clone)]
pub struct TargetSet {
    /// Instance names, grouped by the service order they'll run in.
    /// Each inner vector's instances all belong to the same service and
    /// run concurrently; outer order is respected unless the caller
    /// ignores ordering entirely.
    pub levels: Vec<Vec<String>>,
}

impl TargetSet {
    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|l| l.is_empty())
    }

    pub fn instance_count(&self) -> usize {
        self.levels.iter().map(|l| l.len()).sum()
    }
}

/// Expand `raw_targets` into a `TargetSet` for `command` against
/// `resolved`. `raw_targets` are matched by substring against both
/// service and instance names; an empty slice means "every non-omitted
/// service". `ignore_ordering` (the `-o` flag) disables both dependency
/// closure and topological leveling: the result is a single level
/// containing exactly the matched instances.
pub fn expand(resolved: &ResolvedEnvironment, command: Command, raw_targets: &[String], ignore_ordering: bool) -> TargetSet {
    let env = &resolved.environment;

    let (explicit_instances, explicit_services) = match_targets(resolved, raw_targets);

    let mut base_services: BTreeSet<String> = explicit_services.clone();
    for instance in &explicit_instances {
        if let Some(service) = env.service_of_instance(instance) {
            base_services.insert(service.name.clone());
        }
    }

    if ignore_ordering {
        let mut instances: BTreeSet<String> = explicit_instances;
        for service_name in &explicit_services {
            if let Some(service) = env.services.get(service_name) {
                instances.extend(service.instance_names().cloned());
            }
        }
        let level: Vec<String> = instances.into_iter().collect();
        return TargetSet {
            levels: if level.is_empty() { Vec::new() } else { vec![level] },
        };
    }

    let mut closure_services: BTreeSet<String> = BTreeSet::new();
    for service_name in &base_services {
        let closure = if command.walks_forward() {
            resolved.requires_closure(service_name)
        } else {
            resolved.dependents_closure(service_name)
        };
        closure_services.extend(closure);
    }

    // Services at the same topological wave carry no ordering dependency
    // on each other (see `ResolvedEnvironment::forward_levels`), so their
    // instances are flattened into a single `TargetSet` level and run
    // concurrently; only the walk from one wave to the next is ordered.
    let service_waves = if command.walks_forward() {
        resolved.forward_levels.clone()
    } else {
        resolved.reverse_levels()
    };

    let mut levels = Vec::new();
    for wave in &service_waves {
        let mut instances: Vec<String> = Vec::new();

        for service_name in wave {
            if !closure_services.contains(service_name) {
                continue;
            }

            let Some(service) = env.services.get(service_name) else {
                continue;
            };

            if explicit_services.contains(service_name) || !base_services.contains(service_name) {
                // Whole-service match, or a service pulled in purely for
                // dependency correctness: operate on every instance.
                instances.extend(service.instance_names().cloned());
            } else {
                // Only instance-level matches against this particular
                // service were requested directly; don't widen to siblings.
                instances.extend(
                    explicit_instances
                        .iter()
                        .filter(|i| service.instances.contains_key(i.as_str()))
                        .cloned(),
                );
            }
        }

        instances.sort();
        if !instances.is_empty() {
            levels.push(instances);
        }
    }

    TargetSet { levels }
}

/// Substring-match `raw_targets` against service and instance names.
/// Returns (matched instance names, matched service names). An empty
/// `raw_targets` matches every non-omitted service.
fn match_targets(resolved: &ResolvedEnvironment, raw_targets: &[String]) -> (BTreeSet<String>, BTreeSet<String>) {
    let env = &resolved.environment;

    if raw_targets.is_empty() {
        let services: BTreeSet<String> = env
            .services
            .values()
            .filter(|s| !s.omit)
            .map(|s| s.name.clone())
            .collect();
        return (BTreeSet::new(), services);
    }

    let mut instances = BTreeSet::new();
    let mut services = BTreeSet::new();

    for target in raw_targets {
        for service in env.services.values() {
            if service.name.contains(target.as_str()) {
                services.insert(service.name.clone());
            }
        }
        for instance in env.all_instances() {
            if instance.name.contains(target.as_str()) {
                instances.insert(instance.name.clone());
            }
        }
    }

    (instances, services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;
    use crate::resolver::resolve;

    const SAMPLE: &str = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  cache:
    image: cache
    instances:
      cache-1: { ship: vm1 }
  redis:
    image: redis
    requires: [cache]
    instances:
      redis-1: { ship: vm1 }
  web:
    image: web
    requires: [redis]
    instances:
      web-1: { ship: vm1 }
      web-2: { ship: vm1 }
  batch:
    image: batch
    omit: true
    instances:
      batch-1: { ship: vm1 }
"#;

    fn resolved() -> ResolvedEnvironment {
        resolve(load_str(SAMPLE, "<test>").unwrap()).unwrap()
    }

    #[test]
    fn empty_targets_select_all_non_omitted_services_in_forward_order() {
        let r = resolved();
        let set = expand(&r, Command::Start, &[], false);
        let flat: Vec<String> = set.levels.into_iter().flatten().collect();
        assert!(flat.contains(&"cache-1".to_string()));
        assert!(flat.contains(&"web-1".to_string()));
        assert!(!flat.contains(&"batch-1".to_string()));
    }

    #[test]
    fn starting_a_service_pulls_in_its_dependencies_ahead_of_it() {
        let r = resolved();
        let set = expand(&r, Command::Start, &["web".to_string()], false);
        let flat: Vec<String> = set.levels.iter().flatten().cloned().collect();
        let cache_pos = flat.iter().position(|i| i == "cache-1").unwrap();
        let web_pos = flat.iter().position(|i| i == "web-1").unwrap();
        assert!(cache_pos < web_pos);
    }

    #[test]
    fn stopping_a_dependency_pulls_in_its_dependents() {
        let r = resolved();
        let set = expand(&r, Command::Stop, &["cache".to_string()], false);
        let flat: Vec<String> = set.levels.iter().flatten().cloned().collect();
        assert!(flat.contains(&"web-1".to_string()));
        assert!(flat.contains(&"redis-1".to_string()));
        // Stop walks in reverse: dependents before the dependency.
        let web_pos = flat.iter().position(|i| i == "web-1").unwrap();
        let cache_pos = flat.iter().position(|i| i == "cache-1").unwrap();
        assert!(web_pos < cache_pos);
    }

    #[test]
    fn explicit_instance_target_does_not_widen_to_sibling_instances() {
        let r = resolved();
        let set = expand(&r, Command::Start, &["web-1".to_string()], false);
        let flat: Vec<String> = set.levels.into_iter().flatten().collect();
        assert!(flat.contains(&"web-1".to_string()));
        assert!(!flat.contains(&"web-2".to_string()));
    }

    #[test]
    fn ignore_ordering_skips_closure_and_runs_a_single_level() {
        let r = resolved();
        let set = expand(&r, Command::Start, &["web".to_string()], true);
        assert_eq!(set.levels.len(), 1);
        let flat = &set.levels[0];
        assert!(flat.contains(&"web-1".to_string()));
        assert!(flat.contains(&"web-2".to_string()));
        assert!(!flat.contains(&"cache-1".to_string()));
    }
}
