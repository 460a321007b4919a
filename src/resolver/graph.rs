//! Dependency Resolver: builds the service DAG, detects `requires`
//! cycles, and computes forward/reverse topological orders plus the
//! transitive `requires ∪ wants_info` closure each service needs for
//! environment composition.
//!
//! The DAG itself is represented with `petgraph`, the same crate the
//! `shipcat` manifest compiler in this lineage uses for its own
//! service/region dependency graph.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::graphmap::DiGraphMap;

use crate::model::Environment;

use super::error::ResolveError;

/// The resolved environment: the original model plus derived ordering
/// and closure information. Read-only after construction.
#[derive(Debug, Clone)]
pub struct ResolvedEnvironment {
    pub environment: Environment,
    /// Services in forward (dependency-first) topological order.
    pub forward_order: Vec<String>,
    /// Services grouped into topological waves: every service in a wave
    /// has all of its `requires` satisfied by an earlier wave, so the
    /// services within one wave carry no ordering dependency on each
    /// other and may run concurrently. Waves themselves must still run
    /// in sequence.
    pub forward_levels: Vec<Vec<String>>,
    /// Transitive closure of `requires ∪ wants_info ∪ {self}`, per service.
    closures: HashMap<String, BTreeSet<String>>,
    /// Transitive closure of `requires ∪ {self}`, per service -- the
    /// downward target-set expansion used by start/restart.
    requires_closures: HashMap<String, BTreeSet<String>>,
    /// Transitive closure of reverse-`requires` (services that depend on
    /// this one) `∪ {self}`, per service -- the upward target-set
    /// expansion used by stop/clean.
    dependents_closures: HashMap<String, BTreeSet<String>>,
}

impl ResolvedEnvironment {
    /// Services in reverse (dependent-first) order, used for
    /// stop/clean.
    pub fn reverse_order(&self) -> Vec<String> {
        let mut order = self.forward_order.clone();
        order.reverse();
        order
    }

    /// `forward_levels`, wave order reversed -- used by stop/clean so
    /// independent services still overlap while dependents still run
    /// (wave-for-wave) ahead of the dependencies they rely on.
    pub fn reverse_levels(&self) -> Vec<Vec<String>> {
        let mut levels = self.forward_levels.clone();
        levels.reverse();
        levels
    }

    /// The set of services whose instances should appear in the
    /// composed environment of an instance belonging to `service`:
    /// `requires(service) ∪ wants_info(service) ∪ {service}`,
    /// transitively. Empty if `service` is unknown.
    pub fn discovery_closure(&self, service: &str) -> BTreeSet<String> {
        self.closures.get(service).cloned().unwrap_or_default()
    }

    /// `service ∪` every service it transitively `requires`. This is the
    /// downward target-set expansion: starting `service` also needs its
    /// dependencies started first.
    pub fn requires_closure(&self, service: &str) -> BTreeSet<String> {
        self.requires_closures.get(service).cloned().unwrap_or_default()
    }

    /// `service ∪` every service that transitively `requires` it. This
    /// is the upward target-set expansion: stopping `service` out from
    /// under a running dependent would leave that dependent broken, so
    /// the dependent is targeted too.
    pub fn dependents_closure(&self, service: &str) -> BTreeSet<String> {
        self.dependents_closures.get(service).cloned().unwrap_or_default()
    }
}

fn bfs_closure<'a>(graph: &DiGraphMap<&'a str, ()>, start: &'a str) -> BTreeSet<String> {
    let mut reachable = BTreeSet::new();
    reachable.insert(start.to_string());
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start);
    while let Some(current) = queue.pop_front() {
        for next in graph.neighbors(current) {
            if visited.insert(next) {
                reachable.insert(next.to_string());
                queue.push_back(next);
            }
        }
    }
    reachable
}

/// Resolve dependency order and closures for `environment`.
pub fn resolve(environment: Environment) -> Result<ResolvedEnvironment, ResolveError> {
    let names: Vec<&str> = environment.services.keys().map(String::as_str).collect();

    // Graph for ordering: edge dependency -> dependent (so a normal
    // Kahn's walk yields dependencies before dependents).
    let mut order_graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in &names {
        order_graph.add_node(name);
    }
    for service in environment.services.values() {
        for dep in &service.requires {
            order_graph.add_edge(dep.as_str(), service.name.as_str(), ());
        }
    }

    let (forward_order, forward_levels) = kahn_topological_order(&order_graph, &names).map_err(ResolveError::Cycle)?;

    // Graph for discovery closure: edge service -> its requires/wants_info.
    let mut closure_graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in &names {
        closure_graph.add_node(name);
    }
    for service in environment.services.values() {
        for dep in service.requires.iter().chain(service.wants_info.iter()) {
            closure_graph.add_edge(service.name.as_str(), dep.as_str(), ());
        }
    }

    let mut closures = HashMap::new();
    for name in &names {
        closures.insert(name.to_string(), bfs_closure(&closure_graph, name));
    }

    // Requires-only graph (service -> its direct requires), for the
    // downward target-set expansion.
    let mut requires_graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in &names {
        requires_graph.add_node(name);
    }
    for service in environment.services.values() {
        for dep in &service.requires {
            requires_graph.add_edge(service.name.as_str(), dep.as_str(), ());
        }
    }
    let mut requires_closures = HashMap::new();
    for name in &names {
        requires_closures.insert(name.to_string(), bfs_closure(&requires_graph, name));
    }

    // `order_graph` already carries edges dependency -> dependent, which
    // is exactly the direction a dependents-closure BFS needs.
    let mut dependents_closures = HashMap::new();
    for name in &names {
        dependents_closures.insert(name.to_string(), bfs_closure(&order_graph, name));
    }

    Ok(ResolvedEnvironment {
        environment,
        forward_order,
        forward_levels,
        closures,
        requires_closures,
        dependents_closures,
    })
}

/// Kahn's algorithm, processed one wave at a time: every node with
/// in-degree zero at the start of a round forms that round's level, and
/// is consumed as a batch before degrees are decremented for the next
/// round. Two nodes can only land in the same level if neither depends
/// on the other (an edge between them would have kept the dependent's
/// in-degree above zero), so each level is safe to run fully in
/// parallel. Within a level, nodes are still lexicographically sorted
/// for reproducible reporting. On failure to consume all nodes, walks
/// the remaining (cyclic) subgraph to report one minimal cycle.
fn kahn_topological_order(
    graph: &DiGraphMap<&str, ()>,
    names: &[&str],
) -> Result<(Vec<String>, Vec<Vec<String>>), Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = names.iter().map(|&n| (n, 0)).collect();
    for (_, to, _) in graph.all_edges() {
        *in_degree.get_mut(to).unwrap() += 1;
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&n, _)| n)
        .collect();

    let mut order = Vec::with_capacity(names.len());
    let mut levels: Vec<Vec<String>> = Vec::new();

    while !ready.is_empty() {
        let wave: Vec<&str> = ready.iter().copied().collect();
        ready.clear();

        let mut next_ready: BTreeSet<&str> = BTreeSet::new();
        for &node in &wave {
            order.push(node.to_string());

            let mut dependents: Vec<&str> = graph.neighbors(node).collect();
            dependents.sort_unstable();
            for dependent in dependents {
                let degree = in_degree.get_mut(dependent).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    next_ready.insert(dependent);
                }
            }
        }

        levels.push(wave.iter().map(|s| s.to_string()).collect());
        ready = next_ready;
    }

    if order.len() == names.len() {
        Ok((order, levels))
    } else {
        let remaining: HashSet<&str> = names
            .iter()
            .copied()
            .filter(|n| !order.contains(&n.to_string()))
            .collect();
        Err(find_one_cycle(graph, &remaining))
    }
}

/// DFS over the nodes still present after Kahn's algorithm stalls,
/// looking for the first back-edge to report as a minimal cycle.
fn find_one_cycle(graph: &DiGraphMap<&str, ()>, remaining: &HashSet<&str>) -> Vec<String> {
    let mut start_candidates: Vec<&str> = remaining.iter().copied().collect();
    start_candidates.sort_unstable();

    for &start in &start_candidates {
        let mut stack = vec![start];
        let mut path = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        if let Some(cycle) = dfs_find_cycle(graph, remaining, start, &mut stack, &mut path, &mut on_path) {
            return cycle;
        }
    }

    // Should not happen if Kahn's algorithm actually stalled, but keep
    // the function total.
    start_candidates.iter().map(|s| s.to_string()).collect()
}

fn dfs_find_cycle<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    remaining: &HashSet<&'a str>,
    node: &'a str,
    stack: &mut Vec<&'a str>,
    path: &mut Vec<&'a str>,
    on_path: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if on_path.contains(node) {
        let start_idx = path.iter().position(|&n| n == node).unwrap();
        let mut cycle: Vec<String> = path[start_idx..].iter().map(|s| s.to_string()).collect();
        cycle.push(node.to_string());
        return Some(cycle);
    }

    path.push(node);
    on_path.insert(node);

    let mut neighbors: Vec<&str> = graph
        .neighbors(node)
        .filter(|n| remaining.contains(n))
        .collect();
    neighbors.sort_unstable();

    for next in neighbors {
        if let Some(cycle) = dfs_find_cycle(graph, remaining, next, stack, path, on_path) {
            return Some(cycle);
        }
    }

    path.pop();
    on_path.remove(node);
    stack.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;

    #[test]
    fn simple_chain_resolves_dependency_first() {
        let yaml = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  redis:
    image: redis
    instances:
      redis-1: { ship: vm1 }
  web:
    image: web
    requires: [redis]
    instances:
      web-1: { ship: vm1 }
"#;
        let env = load_str(yaml, "<test>").unwrap();
        let resolved = resolve(env).unwrap();
        assert_eq!(resolved.forward_order, vec!["redis", "web"]);
        assert_eq!(resolved.reverse_order(), vec!["web", "redis"]);
    }

    #[test]
    fn order_is_independent_of_yaml_declaration_order() {
        let yaml_a = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  redis:
    image: redis
    instances:
      redis-1: { ship: vm1 }
  web:
    image: web
    requires: [redis]
    instances:
      web-1: { ship: vm1 }
"#;
        let yaml_b = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  web:
    image: web
    requires: [redis]
    instances:
      web-1: { ship: vm1 }
  redis:
    image: redis
    instances:
      redis-1: { ship: vm1 }
"#;
        let order_a = resolve(load_str(yaml_a, "<a>").unwrap()).unwrap().forward_order;
        let order_b = resolve(load_str(yaml_b, "<b>").unwrap()).unwrap().forward_order;
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn independent_services_land_in_the_same_forward_level() {
        let yaml = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
  vm2: { ip: 10.0.0.6 }
services:
  a:
    image: a
    instances:
      a-1: { ship: vm1 }
  b:
    image: b
    instances:
      b-1: { ship: vm2 }
"#;
        let resolved = resolve(load_str(yaml, "<test>").unwrap()).unwrap();
        assert_eq!(resolved.forward_levels.len(), 1);
        assert_eq!(resolved.forward_levels[0], vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn a_dependency_chain_forms_one_level_per_depth() {
        let yaml = r#"
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
  web2:
    image: web2
    requires: [redis]
    instances:
      web2-1: { ship: vm1 }
"#;
        let resolved = resolve(load_str(yaml, "<test>").unwrap()).unwrap();
        assert_eq!(resolved.forward_levels, vec![
            vec!["cache".to_string()],
            vec!["redis".to_string()],
            vec!["web".to_string(), "web2".to_string()],
        ]);
        assert_eq!(resolved.reverse_levels(), vec![
            vec!["web".to_string(), "web2".to_string()],
            vec!["redis".to_string()],
            vec!["cache".to_string()],
        ]);
    }

    #[test]
    fn cycle_over_requires_is_rejected() {
        let yaml = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  a:
    image: a
    requires: [b]
    instances:
      a-1: { ship: vm1 }
  b:
    image: b
    requires: [a]
    instances:
      b-1: { ship: vm1 }
"#;
        let env = load_str(yaml, "<test>").unwrap();
        let err = resolve(env).unwrap_err();
        match err {
            ResolveError::Cycle(cycle) => {
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
        }
    }

    #[test]
    fn wants_info_cycle_is_accepted() {
        let yaml = r#"
name: demo
ships:
  vm1: { ip: 10.0.0.5 }
services:
  a:
    image: a
    wants_info: [b]
    instances:
      a-1: { ship: vm1 }
  b:
    image: b
    wants_info: [a]
    instances:
      b-1: { ship: vm1 }
"#;
        let env = load_str(yaml, "<test>").unwrap();
        assert!(resolve(env).is_ok());
    }

    #[test]
    fn discovery_closure_includes_self_and_transitive_requires() {
        let yaml = r#"
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
"#;
        let env = load_str(yaml, "<test>").unwrap();
        let resolved = resolve(env).unwrap();
        let closure = resolved.discovery_closure("web");
        assert!(closure.contains("web"));
        assert!(closure.contains("redis"));
        assert!(closure.contains("cache"));
    }

    #[test]
    fn requires_closure_expands_downward_only() {
        let yaml = r#"
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
"#;
        let resolved = resolve(load_str(yaml, "<test>").unwrap()).unwrap();
        let down = resolved.requires_closure("web");
        assert_eq!(down, BTreeSet::from(["web".to_string(), "redis".to_string(), "cache".to_string()]));
        assert_eq!(resolved.requires_closure("cache"), BTreeSet::from(["cache".to_string()]));
    }

    #[test]
    fn dependents_closure_expands_upward_only() {
        let yaml = r#"
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
"#;
        let resolved = resolve(load_str(yaml, "<test>").unwrap()).unwrap();
        let up = resolved.dependents_closure("cache");
        assert_eq!(up, BTreeSet::from(["cache".to_string(), "redis".to_string(), "web".to_string()]));
        assert_eq!(resolved.dependents_closure("web"), BTreeSet::from(["web".to_string()]));
    }
}
