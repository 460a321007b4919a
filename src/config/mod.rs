//! Configuration loading: the Config Loader component.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::{load, load_str, MAX_SUPPORTED_SCHEMA};

/// Process-wide settings resolved from CLI flags, separate from the
/// environment file itself (which `config::load` parses into a
/// `model::Environment`).
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Path to the environment file.
    pub env_file: String,
    /// `-o`: ignore dependency ordering.
    pub ignore_ordering: bool,
    /// `-r`: force image refresh even if cached.
    pub force_refresh: bool,
    /// `-c N`: concurrency limit per ship.
    pub concurrency_per_ship: usize,
    /// `--stop-on-failure`: abort the walk on the first per-instance failure.
    pub stop_on_failure: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            env_file: "./maestro.yaml".to_string(),
            ignore_ordering: false,
            force_refresh: false,
            concurrency_per_ship: 1,
            stop_on_failure: false,
        }
    }
}
