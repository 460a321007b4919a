use std::collections::BTreeMap;

use crate::model::Instance;

/// Everything a probe needs to evaluate one lifecycle check: the
/// instance it's gating (for port lookups) and its composed
/// environment (for exec probes).
pub struct ProbeContext<'a> {
    pub ship_ip: &'a str,
    pub instance: &'a Instance,
    pub composed_env: &'a BTreeMap<String, String>,
}

impl<'a> ProbeContext<'a> {
    pub fn new(ship_ip: &'a str, instance: &'a Instance, composed_env: &'a BTreeMap<String, String>) -> Self {
        Self {
            ship_ip,
            instance,
            composed_env,
        }
    }

    /// Resolve a named or numeric port reference to an external port
    /// number reachable from outside the instance's ship.
    pub fn resolve_external_port(&self, port_name: &str) -> Option<u16> {
        self.instance.port_by_name(port_name).map(|p| p.external_port)
    }
}
