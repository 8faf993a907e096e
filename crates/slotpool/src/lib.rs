//! # slotpool - Atomic Worker-Pool Coordinator
//!
//! Runs CPU-bound tasks on a bounded set of worker threads whose state
//! lives in one small shared region of atomic cells. Reserving and
//! releasing a worker never takes an OS lock.
//!
//! ## Quick Start
//!
//! ```ignore
//! use slotpool::{Bytes, PoolRegistry};
//!
//! slotpool::init_logging();
//!
//! let registry = PoolRegistry::new();
//! registry.register_handler("reverse", |p: Bytes| -> Result<Bytes, String> {
//!     Ok(p.iter().rev().copied().collect::<Vec<u8>>().into())
//! });
//!
//! let pool = registry.create_pool(4, 30_000)?;
//! let result = registry.submit(pool, "reverse", Bytes::from_static(b"abc"), 1_000)?;
//! assert_eq!(&result.output[..], b"cba");
//!
//! let stats = registry.stats(pool)?;
//! println!("{} of {} workers free", stats.available_workers, stats.workers.len());
//!
//! registry.destroy_pool(pool);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PoolRegistry                           │
//! │        create_pool, submit, stats, destroy_pool             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  WorkerPoolCoordinator                      │
//! │       TaskWaiter → WorkerSet → StatusTracker / Metrics      │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker   │      │  Worker   │      │   Batch   │
//!    │  Thread   │      │  Thread   │      │  Flusher  │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                 Coordination Buffer                     │
//!    │     status[N] | counter[N] | metrics[N+1], mmap         │
//!    └─────────────────────────────────────────────────────────┘
//! ```

mod handler;
mod registry;

pub use handler::TaskHandler;
pub use registry::{PoolHandle, PoolRegistry};

// Re-export core types
pub use slotpool_core::{
    constants, BufferLayout, CapabilityError, ConfigError, PoolError, PoolId, PoolResult,
    PoolState, WaitError, WorkerStatus,
};

// Re-export runtime types
pub use slotpool_runtime::{PoolConfig, PoolStats, TaskResult, WorkerPoolCoordinator, WorkerStats};
pub use slotpool_runtime::logging::init as init_logging;

pub use bytes::Bytes;
