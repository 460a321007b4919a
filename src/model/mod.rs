//! Typed entity model: ships, services, instances, ports, volumes,
//! lifecycle checks. Holds the structural invariants of a loaded
//! environment (see `environment::Environment::validate`).
//!
//! Back-references (instance -> ship, service -> service) are modeled
//! as name-keyed lookups rather than owning pointers: the `Environment`
//! owns everything, and a separate resolution pass (the Dependency
//! Resolver) produces derived order/closure information rather than
//! mutating this tree.

pub mod environment;
pub mod image;
pub mod instance;
pub mod lifecycle;
pub mod port;
pub mod service;
pub mod ship;
pub mod volume;

pub use environment::{Environment, EnvironmentValidationError};
pub use image::{registry_host, split_repo_tag};
pub use instance::{EnvValue, Instance, NetMode, ResourceLimits};
pub use lifecycle::{CheckState, LifecycleCheck, LifecycleChecks, PortRef};
pub use port::{parse_port, PortSpec, Protocol};
pub use service::Service;
pub use ship::{ConnectionMode, Registry, RegistryIndex, Ship};
pub use volume::{parse_byte_size, MountMode, RestartPolicy, VolumeBinding};
