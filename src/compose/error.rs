use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("instance '{0}' not found in environment")]
    UnknownInstance(String),
    #[error("instance '{instance}' references unknown ship '{ship}'")]
    UnknownShip { instance: String, ship: String },
}
