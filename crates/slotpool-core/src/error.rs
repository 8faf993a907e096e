//! Error types for the slotpool coordinator
//!
//! - `ConfigError`, `CapabilityError`: raised by pool creation, never retried.
//! - `WaitError`: the slot waiter gave up; retryable by the caller.
//! - `PoolError`: everything a caller of the facade can see.

use crate::id::PoolId;
use std::time::Duration;
use thiserror::Error;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Invalid pool size request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Requested worker count is not in `1..=max`
    #[error("worker count {requested} out of range (1..={max})")]
    OutOfRange { requested: i64, max: u32 },

    /// Buffer size computation overflowed or exceeded the size ceiling
    #[error("coordination buffer for {workers} workers overflows the size limit")]
    Overflow { workers: i64 },

    /// A tunable in `PoolConfig` has an unusable value
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}

/// Shared-memory or atomic primitives are unusable in this environment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// 32-bit atomics are not lock-free on this target
    #[error("lock-free 32-bit atomics unavailable on this target")]
    AtomicsUnavailable,

    /// Mapping the shared coordination region failed
    #[error("shared memory mapping of {bytes} bytes failed: errno {errno}")]
    MapFailed { bytes: usize, errno: i32 },

    /// Spawning a worker or flusher thread failed
    #[error("failed to spawn thread {thread}: {reason}")]
    SpawnFailed { thread: String, reason: String },
}

/// Why a wait for a free slot ended without a slot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// No slot became free within the budget
    #[error("no worker slot became free within {waited:?}")]
    Timeout { waited: Duration },

    /// The pool started shutting down while waiting
    #[error("pool closed while waiting for a slot")]
    Closed,
}

/// Errors surfaced by the pool facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// No slot freed within the caller's wait budget
    #[error("timed out after {waited:?} waiting for a free worker")]
    Timeout { waited: Duration },

    /// A slot was obtained but the task result did not arrive in time.
    /// The task keeps running; its slot is released when it finishes.
    #[error("task on slot {slot} did not finish within {timeout:?}")]
    TaskTimeout { slot: usize, timeout: Duration },

    /// The task function itself failed
    #[error("task '{task_type}' failed on slot {slot}: {message}")]
    TaskExecution {
        task_type: String,
        slot: usize,
        message: String,
    },

    /// The handle refers to a pool that is gone or shutting down
    #[error("{0} not found")]
    PoolNotFound(PoolId),

    /// No handler is registered for this task type
    #[error("no handler registered for task type '{0}'")]
    UnknownTaskType(String),

    /// The reserved slot's worker could not accept the task
    #[error("worker for slot {slot} is not accepting tasks")]
    Dispatch { slot: usize },
}

impl PoolError {
    /// Check whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Timeout { .. } | PoolError::TaskTimeout { .. })
    }

    /// Map a waiter outcome onto the facade taxonomy
    pub fn from_wait(err: WaitError, pool: PoolId) -> Self {
        match err {
            WaitError::Timeout { waited } => PoolError::Timeout { waited },
            WaitError::Closed => PoolError::PoolNotFound(pool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ConfigError::OutOfRange { requested: 17, max: 16 };
        assert_eq!(format!("{}", e), "worker count 17 out of range (1..=16)");

        let e = PoolError::PoolNotFound(PoolId::new(3));
        assert_eq!(format!("{}", e), "pool-3 not found");

        let e: PoolError = ConfigError::Overflow { workers: 9 }.into();
        assert_eq!(
            format!("{}", e),
            "coordination buffer for 9 workers overflows the size limit"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: PoolError = CapabilityError::AtomicsUnavailable.into();
        assert!(matches!(err, PoolError::Capability(CapabilityError::AtomicsUnavailable)));

        let err = PoolError::from_wait(WaitError::Closed, PoolId::new(1));
        assert_eq!(err, PoolError::PoolNotFound(PoolId::new(1)));

        let waited = Duration::from_millis(50);
        let err = PoolError::from_wait(WaitError::Timeout { waited }, PoolId::new(1));
        assert_eq!(err, PoolError::Timeout { waited });
    }

    #[test]
    fn test_retryable() {
        assert!(PoolError::Timeout { waited: Duration::ZERO }.is_retryable());
        assert!(!PoolError::PoolNotFound(PoolId::new(0)).is_retryable());
        assert!(!PoolError::Config(ConfigError::Overflow { workers: 1 }).is_retryable());
    }
}
