//! Lifecycle checks: polling predicates gating `running`/`stopped`
//! state transitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// The state a group of checks gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckState {
    Running,
    Stopped,
}

/// A single lifecycle check, tagged by kind.
#[derive(Debug, Clone)]
pub enum LifecycleCheck {
    Tcp {
        port: String,
        max_wait: Duration,
    },
    Http {
        /// Either a named port on the instance, or a literal port number.
        port: PortRef,
        host: Option<String>,
        scheme: String,
        method: String,
        path: String,
        match_regex: Option<String>,
        max_wait: Duration,
        /// Extra HTTP headers sent with every probe request.
        extra_options: HashMap<String, String>,
    },
    Exec {
        command: String,
        attempts: u32,
        delay: Duration,
    },
}

impl LifecycleCheck {
    /// A short identifying tag for error reporting, e.g. `"tcp(client)"`.
    pub fn tag(&self) -> String {
        match self {
            LifecycleCheck::Tcp { port, .. } => format!("tcp({port})"),
            LifecycleCheck::Http { port, .. } => format!("http({port})"),
            LifecycleCheck::Exec { command, .. } => format!("exec({command})"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PortRef {
    Named(String),
    Numeric(u16),
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRef::Named(n) => write!(f, "{n}"),
            PortRef::Numeric(n) => write!(f, "{n}"),
        }
    }
}

/// Raw YAML shape for lifecycle checks, keyed by `running`/`stopped` at
/// the call site; this type handles a single tagged entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawLifecycleCheck {
    Tcp {
        port: String,
        #[serde(default = "default_max_wait_secs")]
        max_wait: u64,
    },
    Http {
        port: RawPortRef,
        host: Option<String>,
        #[serde(default = "default_scheme")]
        scheme: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default = "default_path")]
        path: String,
        match_regex: Option<String>,
        #[serde(default = "default_max_wait_secs")]
        max_wait: u64,
        #[serde(default)]
        extra_options: HashMap<String, String>,
    },
    Exec {
        command: String,
        #[serde(default = "default_attempts")]
        attempts: u32,
        #[serde(default = "default_delay_secs")]
        delay: u64,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPortRef {
    Named(String),
    Numeric(u16),
}

fn default_max_wait_secs() -> u64 {
    300
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_attempts() -> u32 {
    180
}

fn default_delay_secs() -> u64 {
    1
}

impl RawLifecycleCheck {
    pub fn into_check(self) -> LifecycleCheck {
        match self {
            RawLifecycleCheck::Tcp { port, max_wait } => LifecycleCheck::Tcp {
                port,
                max_wait: Duration::from_secs(max_wait),
            },
            RawLifecycleCheck::Http {
                port,
                host,
                scheme,
                method,
                path,
                match_regex,
                max_wait,
                extra_options,
            } => LifecycleCheck::Http {
                port: match port {
                    RawPortRef::Named(n) => PortRef::Named(n),
                    RawPortRef::Numeric(n) => PortRef::Numeric(n),
                },
                host,
                scheme,
                method,
                path,
                match_regex,
                max_wait: Duration::from_secs(max_wait),
                extra_options,
            },
            RawLifecycleCheck::Exec {
                command,
                attempts,
                delay,
            } => LifecycleCheck::Exec {
                command,
                attempts,
                delay: Duration::from_secs(delay),
            },
        }
    }
}

/// Checks grouped by the state they gate.
#[derive(Debug, Clone, Default)]
pub struct LifecycleChecks {
    pub running: Vec<LifecycleCheck>,
    pub stopped: Vec<LifecycleCheck>,
}

impl LifecycleChecks {
    /// Service-level checks followed by instance-level checks (additive).
    pub fn merged(service: &LifecycleChecks, instance: &LifecycleChecks) -> LifecycleChecks {
        let mut running = service.running.clone();
        running.extend(instance.running.clone());
        let mut stopped = service.stopped.clone();
        stopped.extend(instance.stopped.clone());
        LifecycleChecks { running, stopped }
    }

    pub fn for_state(&self, state: CheckState) -> &[LifecycleCheck] {
        match state {
            CheckState::Running => &self.running,
            CheckState::Stopped => &self.stopped,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLifecycleChecks {
    #[serde(default)]
    pub running: Vec<RawLifecycleCheck>,
    #[serde(default)]
    pub stopped: Vec<RawLifecycleCheck>,
}

impl RawLifecycleChecks {
    pub fn into_checks(self) -> LifecycleChecks {
        LifecycleChecks {
            running: self.running.into_iter().map(|c| c.into_check()).collect(),
            stopped: self.stopped.into_iter().map(|c| c.into_check()).collect(),
        }
    }
}
