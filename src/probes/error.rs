use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe '{tag}' timed out after {waited_secs}s")]
    Timeout { tag: String, waited_secs: u64 },

    #[error("probe '{tag}' failed: {reason}")]
    Failure { tag: String, reason: String },

    #[error("probe '{tag}' references unknown port '{port}'")]
    UnknownPort { tag: String, port: String },
}
