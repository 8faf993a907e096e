//! Task handlers keyed by task type

use bytes::Bytes;

/// Executes one kind of task on a worker thread.
///
/// `Err` is reported to the submitter as `PoolError::TaskExecution`; the
/// slot is released either way. Closures of the right shape implement this
/// trait directly.
pub trait TaskHandler: Send + Sync {
    fn run(&self, payload: Bytes) -> Result<Bytes, String>;
}

impl<F> TaskHandler for F
where
    F: Fn(Bytes) -> Result<Bytes, String> + Send + Sync,
{
    #[inline]
    fn run(&self, payload: Bytes) -> Result<Bytes, String> {
        self(payload)
    }
}
