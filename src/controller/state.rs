//! Per-instance state, re-derived from the remote daemon on every
//! query rather than cached -- mirrors the teacher's
//! `is_running`/`exists`/`exit_state` pattern of trusting the daemon as
//! the source of truth instead of a locally tracked flag.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// No container with this name exists on the ship.
    Absent,
    /// Container exists but is not running.
    Created,
    /// Container exists and is running.
    Running,
    /// Container exists, not running, previously ran.
    Stopped,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Absent => write!(f, "absent"),
            InstanceState::Created => write!(f, "created"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::Stopped => write!(f, "stopped"),
        }
    }
}

