//! # slotpool-core
//!
//! Core types for the slotpool worker-pool coordinator.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Shared memory, wait/notify and worker threads live in `slotpool-runtime`.
//!
//! ## Modules
//!
//! - `id` - Pool identifier type
//! - `status` - Worker slot status and pool lifecycle enums
//! - `layout` - Coordination buffer layout and capacity validation
//! - `error` - Error taxonomy
//! - `env` - Environment variable utilities

pub mod id;
pub mod status;
pub mod layout;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use id::PoolId;
pub use status::{PoolState, WorkerStatus};
pub use layout::{validate, BufferLayout};
pub use error::{CapabilityError, ConfigError, PoolError, PoolResult, WaitError};
pub use env::{env_get, env_get_bool, env_get_millis, env_get_micros, env_get_opt};

/// Fixed limits. These are part of the observable behavior and are not
/// runtime-configurable.
pub mod constants {
    use std::time::Duration;

    /// Maximum number of worker slots in one pool
    pub const MAX_WORKERS: u32 = 16;

    /// Hard ceiling on the coordination buffer size, padding included
    pub const MAX_BUFFER_BYTES: usize = 32 * 1024;

    /// Buffer size is rounded up to this boundary
    pub const BUFFER_ALIGN: usize = 64;

    /// Largest random padding added on top of the aligned size
    pub const MAX_JITTER: usize = BUFFER_ALIGN - 1;

    /// Width of every cell in the buffer
    pub const CELL_BYTES: usize = 4;

    /// Metric lock: maximum CAS attempts per update
    pub const METRIC_LOCK_MAX_SPINS: u32 = 100;

    /// Metric lock: wall-clock budget per update
    pub const METRIC_LOCK_TIMEOUT: Duration = Duration::from_millis(50);

    /// Metric lock: backoff ceiling between attempts
    pub const METRIC_LOCK_MAX_BACKOFF: Duration = Duration::from_millis(8);
}
