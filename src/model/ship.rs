//! Ship (host) entity: a machine running a remote container daemon.

use std::collections::HashMap;

use serde::Deserialize;

/// A host machine running a container daemon.
///
/// Created at config load and immutable thereafter (mirrors the
/// teacher's treatment of `DockerEnvironment`'s client handle: resolved
/// once, reused for the process lifetime).
#[derive(Debug, Clone)]
pub struct Ship {
    pub name: String,
    pub ip: String,
    pub endpoint: String,
    pub docker_port: u16,
    pub api_version: Option<String>,
    pub timeout: u64,
    pub ssh_timeout: u64,
    pub connection: ConnectionMode,
}

impl Ship {
    /// Address other containers on this ship's daemon should be reached
    /// at from the point of view of containers on *other* ships.
    pub fn host_address(&self) -> &str {
        &self.ip
    }
}

/// The mutually exclusive ways a ship's daemon can be reached.
///
/// Exactly one variant is ever active for a given ship -- enforced at
/// raw-config validation time (`config::loader`), not representable
/// afterwards, so downstream code need not re-check it.
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    Plain,
    Tls(TlsSettings),
    Socket { path: String },
    SshTunnel(SshTunnelSettings),
}

#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub verify: bool,
    pub ca_cert: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SshTunnelSettings {
    pub user: String,
    pub key_path: String,
    pub port: u16,
}

/// Raw, not-yet-validated ship shape as it appears in YAML. Ship
/// defaults are merged into this before it is converted into a `Ship`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawShip {
    pub ip: Option<String>,
    pub endpoint: Option<String>,
    pub docker_port: Option<u16>,
    pub api_version: Option<String>,
    pub timeout: Option<u64>,
    pub ssh_timeout: Option<u64>,
    pub socket_path: Option<String>,
    pub ssh_tunnel: Option<RawSshTunnel>,
    #[serde(default)]
    pub tls: bool,
    pub tls_verify: Option<bool>,
    pub tls_ca_cert: Option<String>,
    pub tls_key: Option<String>,
    pub tls_cert: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSshTunnel {
    pub user: String,
    pub key: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_port() -> u16 {
    22
}

impl RawShip {
    /// Apply `ship_defaults`, preferring this ship's own explicit values.
    pub fn merged_with_defaults(mut self, defaults: &RawShip) -> Self {
        self.ip = self.ip.or_else(|| defaults.ip.clone());
        self.endpoint = self.endpoint.or_else(|| defaults.endpoint.clone());
        self.docker_port = self.docker_port.or(defaults.docker_port);
        self.api_version = self.api_version.or_else(|| defaults.api_version.clone());
        self.timeout = self.timeout.or(defaults.timeout);
        self.ssh_timeout = self.ssh_timeout.or(defaults.ssh_timeout);
        self.socket_path = self.socket_path.or_else(|| defaults.socket_path.clone());
        self.ssh_tunnel = self.ssh_tunnel.or_else(|| defaults.ssh_tunnel.clone());
        if !self.tls {
            self.tls = defaults.tls;
        }
        self.tls_verify = self.tls_verify.or(defaults.tls_verify);
        self.tls_ca_cert = self.tls_ca_cert.clone().or_else(|| defaults.tls_ca_cert.clone());
        self.tls_key = self.tls_key.clone().or_else(|| defaults.tls_key.clone());
        self.tls_cert = self.tls_cert.clone().or_else(|| defaults.tls_cert.clone());
        self
    }
}

fn default_docker_port() -> u16 {
    2375
}

fn default_timeout() -> u64 {
    60
}

fn default_ssh_timeout() -> u64 {
    10
}

impl RawShip {
    pub fn into_ship(self, name: &str) -> Result<Ship, String> {
        let ip = self.ip.ok_or_else(|| format!("ship '{name}' is missing required field 'ip'"))?;
        let endpoint = self.endpoint.unwrap_or_else(|| ip.clone());
        let docker_port = self.docker_port.unwrap_or_else(default_docker_port);
        let timeout = self.timeout.unwrap_or_else(default_timeout);
        let ssh_timeout = self.ssh_timeout.unwrap_or_else(default_ssh_timeout);

        let modes_set = [
            self.socket_path.is_some(),
            self.ssh_tunnel.is_some(),
            self.tls,
        ]
        .iter()
        .filter(|&&b| b)
        .count();

        if modes_set > 1 {
            return Err(format!(
                "ship '{name}' specifies more than one of {{tls, ssh_tunnel, socket_path}} -- connection modes are mutually exclusive"
            ));
        }

        let connection = if let Some(socket_path) = self.socket_path {
            ConnectionMode::Socket { path: socket_path }
        } else if let Some(tunnel) = self.ssh_tunnel {
            ConnectionMode::SshTunnel(SshTunnelSettings {
                user: tunnel.user,
                key_path: tunnel.key,
                port: tunnel.port,
            })
        } else if self.tls {
            ConnectionMode::Tls(TlsSettings {
                verify: self.tls_verify.unwrap_or(true),
                ca_cert: self.tls_ca_cert,
                cert: self.tls_cert,
                key: self.tls_key,
            })
        } else {
            ConnectionMode::Plain
        };

        Ok(Ship {
            name: name.to_string(),
            ip,
            endpoint,
            docker_port,
            api_version: self.api_version,
            timeout,
            ssh_timeout,
            connection,
        })
    }
}

/// Name -> {url, username, password, email} registry credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct Registry {
    pub url: String,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

/// Process-wide read-only registry credential cache, populated at load.
///
/// Lookup is two-phase: exact registry name, then FQDN match against
/// each registry's URL. Grounded on the teacher's credential-lookup
/// design note (`stack/.../config/config.rs`'s layered-default pattern,
/// generalized to a name+FQDN index).
#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    by_name: HashMap<String, Registry>,
}

impl RegistryIndex {
    pub fn new(registries: HashMap<String, Registry>) -> Self {
        Self { by_name: registries }
    }

    /// Find credentials for a registry host extracted from an image
    /// reference, e.g. `registry.example.com` or `docker.io`.
    pub fn lookup(&self, registry_host: &str) -> Option<&Registry> {
        if let Some(reg) = self.by_name.get(registry_host) {
            return Some(reg);
        }

        self.by_name.values().find(|reg| {
            reg.url
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .split('/')
                .next()
                .map(|fqdn| fqdn == registry_host)
                .unwrap_or(false)
        })
    }
}
