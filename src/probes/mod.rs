//! Lifecycle Probes: TCP connect, HTTP request, and exec checks that
//! gate a container's `running`/`stopped` state transitions.
//!
//! Polling is implemented over `tokio::time::Instant` (monotonic), not
//! wall-clock arithmetic, so a system clock adjustment mid-poll can't
//! shorten or extend a probe's deadline.

mod context;
mod error;
mod exec;
mod http;
mod tcp;

pub use context::ProbeContext;
pub use error::ProbeError;

use async_trait::async_trait;

use crate::model::LifecycleCheck;

pub type ProbeResult = Result<(), ProbeError>;

/// Common contract every lifecycle check satisfies.
#[async_trait]
pub trait Probe {
    async fn run(&self, ctx: &ProbeContext<'_>) -> ProbeResult;
}

#[async_trait]
impl Probe for LifecycleCheck {
    async fn run(&self, ctx: &ProbeContext<'_>) -> ProbeResult {
        match self {
            LifecycleCheck::Tcp { port, max_wait } => tcp::run(port, *max_wait, ctx).await,
            LifecycleCheck::Http {
                port,
                host,
                scheme,
                method,
                path,
                match_regex,
                max_wait,
                extra_options,
            } => {
                http::run(
                    port,
                    host.as_deref(),
                    scheme,
                    method,
                    path,
                    match_regex.as_deref(),
                    *max_wait,
                    extra_options,
                    ctx,
                )
                .await
            }
            LifecycleCheck::Exec { command, attempts, delay } => exec::run(command, *attempts, *delay, ctx).await,
        }
    }
}

/// Run every check gating `checks` in declared order. Conjunctive: the
/// first failure aborts the gate and its error is the gate's result.
pub async fn run_gate(checks: &[LifecycleCheck], ctx: &ProbeContext<'_>) -> ProbeResult {
    for check in checks {
        check.run(ctx).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::model::instance::{EnvValue, NetMode, ResourceLimits};
    use crate::model::{Instance, LifecycleChecks, PortSpec, Protocol};

    fn sample_instance(ports: Vec<PortSpec>) -> Instance {
        Instance {
            name: "web-1".to_string(),
            service: "web".to_string(),
            ship: "vm1".to_string(),
            image: None,
            ports,
            volumes: Default::default(),
            container_volumes: Vec::new(),
            volumes_from: Vec::new(),
            env: std::collections::HashMap::<String, EnvValue>::new(),
            privileged: false,
            cap_add: Vec::new(),
            cap_drop: Vec::new(),
            extra_hosts: Default::default(),
            stop_timeout: 10,
            limits: ResourceLimits::default(),
            log_driver: None,
            log_opt: Default::default(),
            command: None,
            net: NetMode::Bridge,
            restart: None,
            dns: Vec::new(),
            links: Default::default(),
            lifecycle: LifecycleChecks::default(),
        }
    }

    #[tokio::test]
    async fn exec_gate_runs_in_declared_order_and_stops_on_first_failure() {
        let instance = sample_instance(vec![]);
        let env = BTreeMap::new();
        let ctx = ProbeContext::new("127.0.0.1", &instance, &env);

        let checks = vec![
            LifecycleCheck::Exec {
                command: "true".to_string(),
                attempts: 1,
                delay: Duration::from_millis(1),
            },
            LifecycleCheck::Exec {
                command: "false".to_string(),
                attempts: 1,
                delay: Duration::from_millis(1),
            },
            LifecycleCheck::Exec {
                command: "touch /should/not/run".to_string(),
                attempts: 1,
                delay: Duration::from_millis(1),
            },
        ];

        let result = run_gate(&checks, &ctx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn exec_probe_retries_up_to_attempts() {
        let instance = sample_instance(vec![]);
        let env = BTreeMap::new();
        let ctx = ProbeContext::new("127.0.0.1", &instance, &env);

        let check = LifecycleCheck::Exec {
            command: "true".to_string(),
            attempts: 3,
            delay: Duration::from_millis(1),
        };

        assert!(check.run(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn tcp_probe_reports_unknown_port_by_name() {
        let instance = sample_instance(vec![PortSpec {
            name: "web".to_string(),
            exposed_port: 80,
            exposed_proto: Protocol::Tcp,
            external_port: 8080,
            external_proto: Protocol::Tcp,
            bind_addr: "0.0.0.0".to_string(),
        }]);
        let env = BTreeMap::new();
        let ctx = ProbeContext::new("127.0.0.1", &instance, &env);

        let check = LifecycleCheck::Tcp {
            port: "missing".to_string(),
            max_wait: Duration::from_millis(10),
        };

        let err = check.run(&ctx).await.unwrap_err();
        assert!(matches!(err, ProbeError::UnknownPort { .. }));
    }
}
