use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("target '{0}' does not match any service or instance")]
    UnknownTarget(String),
    #[error("operation interrupted by user cancellation")]
    Interrupted,
}
