//! # slotpool-runtime
//!
//! Platform-specific runtime for the slotpool coordinator.
//!
//! This crate provides:
//! - Shared coordination buffer (anonymous mmap)
//! - Address-based wait/notify (futex on Linux, condvar elsewhere)
//! - Slot status tracking and the available-worker counter
//! - Per-slot duration metrics behind bounded spin locks
//! - Free-slot waiting with absolute deadlines
//! - Worker threads, batched metric updates and pool lifecycle

pub mod config;
pub mod logging;
pub mod memory;
pub mod parking;
pub mod status;
pub mod metrics;
pub mod waiter;
pub mod batch;
pub mod worker;
pub mod coordinator;

// Re-exports
pub use config::PoolConfig;
pub use memory::{probe_capabilities, CoordinationBuffer};
pub use parking::{new_wait_notify, WaitNotify};
pub use status::StatusTracker;
pub use metrics::MetricsAggregator;
pub use waiter::TaskWaiter;
pub use batch::{BatchOp, OperationBatch};
pub use worker::{Job, TaskOutcome, WorkerSet};
pub use coordinator::{PoolStats, TaskResult, WorkerPoolCoordinator, WorkerStats};
