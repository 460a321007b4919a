//! maestro-rs: dependency-ordered multi-host container orchestration
//!
//! Given a declarative environment file naming ships (hosts), services
//! (image-backed groups), and instances (placed containers), this crate
//! compiles the description into a validated graph, resolves the
//! dependency order implied by `requires`/`wants_info`, and drives
//! container lifecycle transitions against each ship's remote Docker
//! daemon in that order.

pub mod cmd;
pub mod compose;
pub mod config;
pub mod controller;
pub mod model;
pub mod orchestrator;
pub mod probes;
pub mod resolver;
pub mod system;

pub use config::Configuration;
pub use model::{Environment, Instance, Service, Ship};
pub use orchestrator::{Command, Orchestrator};
pub use resolver::ResolvedEnvironment;
