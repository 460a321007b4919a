//! HTTP probe: polls a URL until it returns a matching response.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;
use tracing::debug;

use crate::model::PortRef;

use super::context::ProbeContext;
use super::error::ProbeError;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[allow(clippy::too_many_arguments)]
pub async fn run(
    port: &PortRef,
    host: Option<&str>,
    scheme: &str,
    method: &str,
    path: &str,
    match_regex: Option<&str>,
    max_wait: Duration,
    extra_options: &HashMap<String, String>,
    ctx: &ProbeContext<'_>,
) -> Result<(), ProbeError> {
    let tag = format!("http({port})");

    let port_number = match port {
        PortRef::Numeric(n) => *n,
        PortRef::Named(name) => ctx.resolve_external_port(name).ok_or_else(|| ProbeError::UnknownPort {
            tag: tag.clone(),
            port: name.clone(),
        })?,
    };

    let host = host.unwrap_or(ctx.ship_ip);
    let url = format!("{scheme}://{host}:{port_number}{path}");

    let regex = match match_regex {
        Some(pattern) => Some(Regex::new(pattern).map_err(|e| ProbeError::Failure {
            tag: tag.clone(),
            reason: format!("invalid match_regex: {e}"),
        })?),
        None => None,
    };

    let client = reqwest::Client::new();
    let method: reqwest::Method = method.parse().map_err(|_| ProbeError::Failure {
        tag: tag.clone(),
        reason: format!("invalid HTTP method '{method}'"),
    })?;

    let deadline = Instant::now() + max_wait;

    loop {
        let mut request = client.request(method.clone(), &url);
        for (header, value) in extra_options {
            request = request.header(header, value);
        }
        let attempt = request.send().await;

        match attempt {
            Ok(response) => {
                let ok = match &regex {
                    Some(re) => {
                        let body = response.text().await.unwrap_or_default();
                        re.is_match(&body)
                    }
                    None => response.status().is_success(),
                };

                if ok {
                    debug!(%url, "http probe matched");
                    return Ok(());
                }
            }
            Err(e) => {
                debug!(%url, error = %e, "http probe not ready yet");
            }
        }

        if Instant::now() >= deadline {
            return Err(ProbeError::Timeout {
                tag,
                waited_secs: max_wait.as_secs(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
