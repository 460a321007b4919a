//! System-level primitives shared by the Orchestrator and Container
//! Controller.

mod locker;

pub use locker::{Locker, LockerError, LockerGuard};
