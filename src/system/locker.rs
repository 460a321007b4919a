//! Per-ship locker: ensures only one container-lifecycle operation runs
//! at a time against a given ship's daemon connection, so two instances
//! scheduled at the same topological level but placed on the same ship
//! serialize instead of racing container-name allocation and image
//! pulls. Instances on different ships run fully concurrently.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};

#[derive(Debug, Error)]
pub enum LockerError {
    #[error("lock is currently held")]
    Busy,
    #[error("lock acquisition was cancelled")]
    Cancelled,
    #[error("lock acquisition timed out")]
    Timeout,
}

pub struct Locker {
    semaphore: Semaphore,
}

impl Locker {
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    /// A locker that admits up to `capacity` concurrent holders instead
    /// of the default strict mutual exclusion. Used by the orchestrator
    /// to honor `-c N` per-ship concurrency without changing the
    /// single-holder case any other caller relies on.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            semaphore: Semaphore::new(capacity.max(1)),
        }
    }

    pub async fn acquire(&self) -> Result<LockerGuard<'_>, LockerError> {
        let permit = self.semaphore.acquire().await.map_err(|_| LockerError::Cancelled)?;
        Ok(LockerGuard { _permit: permit })
    }

    pub fn try_acquire(&self) -> Result<LockerGuard<'_>, LockerError> {
        match self.semaphore.try_acquire() {
            Ok(permit) => Ok(LockerGuard { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(LockerError::Busy),
            Err(TryAcquireError::Closed) => Err(LockerError::Cancelled),
        }
    }

    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<LockerGuard<'_>, LockerError> {
        match tokio::time::timeout(timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => Ok(LockerGuard { _permit: permit }),
            Ok(Err(_)) => Err(LockerError::Cancelled),
            Err(_) => Err(LockerError::Timeout),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for Locker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LockerGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_and_release() {
        let locker = Locker::new();
        assert!(!locker.is_locked());
        let guard = locker.acquire().await.unwrap();
        assert!(locker.is_locked());
        assert!(locker.try_acquire().is_err());
        drop(guard);
        assert!(!locker.is_locked());
        let _guard = locker.try_acquire().unwrap();
        assert!(locker.is_locked());
    }

    #[tokio::test]
    async fn with_capacity_admits_up_to_n_concurrent_holders() {
        let locker = Locker::with_capacity(2);
        let first = locker.acquire().await.unwrap();
        let second = locker.acquire().await.unwrap();
        assert!(locker.try_acquire().is_err());
        drop(first);
        drop(second);
    }

    #[tokio::test]
    async fn acquire_timeout_fires_while_held() {
        let locker = Locker::new();
        let _guard = locker.acquire().await.unwrap();
        let result = locker.acquire_timeout(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(LockerError::Timeout)));
    }
}
