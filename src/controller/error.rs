use thiserror::Error;

/// Could not reach a ship's daemon at all. Per-ship fatal: every
/// instance scheduled on that ship is reported failed for the current
/// operation.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("ship '{ship}': failed to connect to daemon: {source}")]
    Daemon {
        ship: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("ship '{ship}': invalid TLS configuration: {reason}")]
    Tls { ship: String, reason: String },
    #[error("ship '{ship}': ssh tunnel setup failed: {reason}")]
    SshTunnel { ship: String, reason: String },
}

/// A specific daemon call failed for one instance. Per-instance fatal;
/// the rest of the walk continues unless `--stop-on-failure` is set.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("instance '{instance}': connection error: {source}")]
    Connection {
        instance: String,
        #[source]
        source: ConnectionError,
    },
    #[error("instance '{instance}': image pull failed: {source}")]
    Pull {
        instance: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("instance '{instance}': create failed: {source}")]
    Create {
        instance: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("instance '{instance}': start failed: {source}")]
    Start {
        instance: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("instance '{instance}': stop failed: {source}")]
    Stop {
        instance: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("instance '{instance}': remove failed: {source}")]
    Remove {
        instance: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("instance '{instance}': inspect failed: {source}")]
    Inspect {
        instance: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("instance '{instance}': lifecycle probe did not pass: {source}")]
    Probe {
        instance: String,
        #[source]
        source: crate::probes::ProbeError,
    },
    #[error("instance '{instance}': {reason}")]
    Other { instance: String, reason: String },
}
