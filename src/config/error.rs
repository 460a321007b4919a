//! Config loader errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported schema version {found} (maximum supported is {max_supported})")]
    SchemaVersion { found: u32, max_supported: u32 },

    #[error("ship '{name}': {reason}")]
    Ship { name: String, reason: String },

    #[error("service '{name}': {reason}")]
    Service { name: String, reason: String },

    #[error(transparent)]
    Validation(#[from] crate::model::EnvironmentValidationError),
}
