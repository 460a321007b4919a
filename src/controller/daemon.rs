//! Per-ship daemon connections.
//!
//! Four connection variants, selected by a `Ship`'s (mutually
//! exclusive) configured mode. Each resolved `bollard::Docker` handle
//! is cached and reused for the process lifetime, mirroring the
//! teacher's `DockerEnvironment`, which resolves its client once at
//! construction and holds it for the environment's lifetime.

use std::path::Path;
use std::sync::Arc;

use bollard::{ClientVersion, Docker};
use dashmap::DashMap;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::model::{ConnectionMode, Ship};

use super::error::ConnectionError;

/// Caches one `bollard::Docker` handle per ship.
#[derive(Default)]
pub struct DaemonPool {
    clients: DashMap<String, Docker>,
}

impl DaemonPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached client for `ship`, connecting (and caching) if
    /// this is the first request for it.
    pub async fn connect(&self, ship: &Ship) -> Result<Docker, ConnectionError> {
        if let Some(existing) = self.clients.get(&ship.name) {
            return Ok(existing.clone());
        }

        let client = connect_ship(ship).await?;
        self.clients.insert(ship.name.clone(), client.clone());
        Ok(client)
    }
}

async fn connect_ship(ship: &Ship) -> Result<Docker, ConnectionError> {
    let api_version = ship.api_version.as_deref().and_then(parse_client_version);

    match &ship.connection {
        ConnectionMode::Plain => {
            let addr = format!("tcp://{}:{}", ship.ip, ship.docker_port);
            connect_http(&addr, ship)
        }
        ConnectionMode::Tls(tls) => {
            let key = tls
                .key
                .as_deref()
                .ok_or_else(|| ConnectionError::Tls {
                    ship: ship.name.clone(),
                    reason: "tls_key is required when tls is enabled".to_string(),
                })?;
            let cert = tls
                .cert
                .as_deref()
                .ok_or_else(|| ConnectionError::Tls {
                    ship: ship.name.clone(),
                    reason: "tls_cert is required when tls is enabled".to_string(),
                })?;
            let ca = tls
                .ca_cert
                .as_deref()
                .ok_or_else(|| ConnectionError::Tls {
                    ship: ship.name.clone(),
                    reason: "tls_ca_cert is required when tls is enabled".to_string(),
                })?;

            if !tls.verify {
                warn!(ship = %ship.name, "tls_verify disabled; connecting without verifying the daemon's certificate chain");
            }

            let addr = format!("tcp://{}:{}", ship.ip, ship.docker_port);
            let version = api_version.unwrap_or(bollard::API_DEFAULT_VERSION);
            Docker::connect_with_ssl(&addr, Path::new(key), Path::new(cert), Path::new(ca), ship.timeout, version)
                .map_err(|source| ConnectionError::Daemon {
                    ship: ship.name.clone(),
                    source,
                })
        }
        ConnectionMode::Socket { path } => {
            let version = api_version.unwrap_or(bollard::API_DEFAULT_VERSION);
            Docker::connect_with_socket(path, ship.timeout, version).map_err(|source| ConnectionError::Daemon {
                ship: ship.name.clone(),
                source,
            })
        }
        ConnectionMode::SshTunnel(tunnel) => {
            let local_port = open_ssh_tunnel(ship, tunnel).await?;
            let addr = format!("tcp://127.0.0.1:{local_port}");
            connect_http(&addr, ship)
        }
    }
}

fn connect_http(addr: &str, ship: &Ship) -> Result<Docker, ConnectionError> {
    let version = ship
        .api_version
        .as_deref()
        .and_then(parse_client_version)
        .unwrap_or(bollard::API_DEFAULT_VERSION);

    Docker::connect_with_http(addr, ship.timeout, version).map_err(|source| ConnectionError::Daemon {
        ship: ship.name.clone(),
        source,
    })
}

fn parse_client_version(s: &str) -> Option<&'static ClientVersion> {
    // `bollard::ClientVersion` fields aren't `'static` constructible from
    // an arbitrary string without a leak; ships that need a specific API
    // version pin it once at startup, so a small leak here is
    // acceptable for the process lifetime.
    let (major, minor) = s.split_once('.')?;
    let major: usize = major.parse().ok()?;
    let minor: usize = minor.parse().ok()?;
    Some(Box::leak(Box::new(ClientVersion {
        major_version: major,
        minor_version: minor,
    })))
}

/// Open a local TCP listener and forward the first accepted connection
/// through an SSH direct-tcpip channel to the ship's Docker socket.
/// This is deliberately the thinnest correct tunnel: it serves this
/// crate's one daemon connection per ship, not general port-forwarding.
async fn open_ssh_tunnel(
    ship: &Ship,
    tunnel: &crate::model::ship::SshTunnelSettings,
) -> Result<u16, ConnectionError> {
    let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|e| ConnectionError::SshTunnel {
        ship: ship.name.clone(),
        reason: format!("failed to bind local forwarding port: {e}"),
    })?;
    let local_port = listener
        .local_addr()
        .map_err(|e| ConnectionError::SshTunnel {
            ship: ship.name.clone(),
            reason: e.to_string(),
        })?
        .port();

    let session = open_ssh_session(ship, tunnel).await?;
    let session = Arc::new(session);

    let ship_ip = ship.ip.clone();
    let docker_port = ship.docker_port;
    let ship_name = ship.name.clone();

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(ship = %ship_name, error = %e, "ssh tunnel listener accept failed");
                    break;
                }
            };

            let session = session.clone();
            let ship_ip = ship_ip.clone();
            let ship_name = ship_name.clone();

            tokio::spawn(async move {
                if let Err(e) = forward_connection(&session, stream, &ship_ip, docker_port).await {
                    warn!(ship = %ship_name, error = %e, "ssh tunnel connection forwarding failed");
                }
            });
        }
    });

    info!(ship = %ship.name, local_port, "ssh tunnel established");
    Ok(local_port)
}

async fn open_ssh_session(
    ship: &Ship,
    tunnel: &crate::model::ship::SshTunnelSettings,
) -> Result<russh::client::Handle<SshClientHandler>, ConnectionError> {
    let config = Arc::new(russh::client::Config::default());
    let mut session = russh::client::connect(config, (ship.ip.as_str(), tunnel.port), SshClientHandler)
        .await
        .map_err(|e| ConnectionError::SshTunnel {
            ship: ship.name.clone(),
            reason: format!("ssh connect failed: {e}"),
        })?;

    let key_pair = russh_keys::load_secret_key(&tunnel.key_path, None).map_err(|e| ConnectionError::SshTunnel {
        ship: ship.name.clone(),
        reason: format!("failed to load ssh key '{}': {e}", tunnel.key_path),
    })?;

    let authenticated = session
        .authenticate_publickey(&tunnel.user, Arc::new(key_pair))
        .await
        .map_err(|e| ConnectionError::SshTunnel {
            ship: ship.name.clone(),
            reason: format!("ssh authentication failed: {e}"),
        })?;

    if !authenticated {
        return Err(ConnectionError::SshTunnel {
            ship: ship.name.clone(),
            reason: format!("ssh authentication rejected for user '{}'", tunnel.user),
        });
    }

    Ok(session)
}

async fn forward_connection(
    session: &russh::client::Handle<SshClientHandler>,
    mut local: tokio::net::TcpStream,
    target_host: &str,
    target_port: u16,
) -> Result<(), String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut channel = session
        .channel_open_direct_tcpip(target_host, target_port as u32, "127.0.0.1", 0)
        .await
        .map_err(|e| e.to_string())?;

    let mut buf = [0u8; 8192];
    loop {
        tokio::select! {
            read = local.read(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        if channel.data(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            msg = channel.wait() => {
                match msg {
                    Some(russh::ChannelMsg::Data { data }) => {
                        if local.write_all(&data).await.is_err() {
                            break;
                        }
                    }
                    Some(russh::ChannelMsg::Eof) | Some(russh::ChannelMsg::Close) | None => break,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// Accepts the target ship's host key unconditionally.
///
/// A full SSH client with known-hosts verification is explicitly out
/// of scope (see the crate's top-level design notes); this tunnel only
/// forwards traffic to a daemon socket the operator already configured
/// by IP, same trust boundary as the plain-TCP connection mode.
struct SshClientHandler;

#[async_trait::async_trait]
impl russh::client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &russh_keys::key::PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}
