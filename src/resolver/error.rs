use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}
