//! The operations the orchestrator can walk a target set through.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Start,
    Stop,
    Restart,
    Clean,
}

impl Command {
    /// start/restart walk the DAG forward (dependencies before
    /// dependents); stop/clean walk it in reverse. `status` doesn't
    /// mutate anything, so its direction is arbitrary; forward is used
    /// for a stable, readable report.
    pub fn walks_forward(self) -> bool {
        !matches!(self, Command::Stop | Command::Clean)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Status => "status",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Restart => "restart",
            Command::Clean => "clean",
        };
        write!(f, "{s}")
    }
}
