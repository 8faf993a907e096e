//! Library defaults for `PoolConfig`

/// How long `submit` waits for a task result once a slot is reserved
pub const TASK_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on one park inside the slot waiter
pub const WAIT_POLL_MS: u64 = 10;

/// Idle worker thread park timeout
pub const WORKER_PARK_MS: u64 = 100;

/// Grace period for worker threads to exit at teardown
pub const SHUTDOWN_GRACE_MS: u64 = 1_000;

/// Route metric updates through the batch queue
pub const BATCH_ENABLED: bool = false;

/// Batch flusher tick
pub const BATCH_TICK_US: u64 = 1_000;

/// Batch queue capacity
pub const BATCH_CAPACITY: usize = 1_024;

/// Random padding on buffer allocation
pub const JITTER: bool = true;
