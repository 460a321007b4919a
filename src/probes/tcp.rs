//! TCP connect probe.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use super::context::ProbeContext;
use super::error::ProbeError;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run(port_name: &str, max_wait: Duration, ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let tag = format!("tcp({port_name})");
    let port = ctx.resolve_external_port(port_name).ok_or_else(|| ProbeError::UnknownPort {
        tag: tag.clone(),
        port: port_name.to_string(),
    })?;

    let deadline = Instant::now() + max_wait;
    let addr = format!("{}:{}", ctx.ship_ip, port);

    loop {
        match TcpStream::connect(&addr).await {
            Ok(_) => {
                debug!(%addr, "tcp probe connected");
                return Ok(());
            }
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(ProbeError::Timeout {
                        tag,
                        waited_secs: max_wait.as_secs(),
                    });
                }
                debug!(%addr, error = %e, "tcp probe not ready yet");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}
