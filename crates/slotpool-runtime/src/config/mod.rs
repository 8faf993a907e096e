//! Pool Configuration
//!
//! Library defaults with runtime environment overrides. Structural limits
//! (worker ceiling, buffer size, metric lock budget) are fixed constants in
//! `slotpool_core::constants` and cannot be changed here.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotpool_runtime::config::PoolConfig;
//!
//! // Use defaults with env overrides
//! let config = PoolConfig::from_env();
//!
//! // Or customize programmatically
//! let config = PoolConfig::from_env()
//!     .task_timeout(Duration::from_secs(5))
//!     .batch_enabled(true);
//! ```

pub mod defaults;

use slotpool_core::env::{env_get, env_get_bool, env_get_micros, env_get_millis};
use slotpool_core::error::ConfigError;
use std::time::Duration;

/// Per-pool tunables with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// How long a submit waits for the task result after reserving a slot
    pub task_timeout: Duration,
    /// Longest single park while waiting for a free slot
    pub wait_poll: Duration,
    /// Idle worker thread park timeout
    pub worker_park: Duration,
    /// Time given to worker threads to exit before they are detached
    pub shutdown_grace: Duration,
    /// Route duration updates through the batch queue
    pub batch_enabled: bool,
    /// Batch flusher tick
    pub batch_tick: Duration,
    /// Batch queue capacity; a full queue applies ops inline
    pub batch_capacity: usize,
    /// Add 0..=63 random bytes to the buffer allocation
    pub jitter: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `SLOTPOOL_TASK_TIMEOUT_MS` - Task result timeout
    /// - `SLOTPOOL_WAIT_POLL_MS` - Waiter park timeout
    /// - `SLOTPOOL_WORKER_PARK_MS` - Idle worker park timeout
    /// - `SLOTPOOL_SHUTDOWN_GRACE_MS` - Worker exit grace period
    /// - `SLOTPOOL_BATCH` - Enable batched metric updates (0/1)
    /// - `SLOTPOOL_BATCH_TICK_US` - Batch flush tick in microseconds
    /// - `SLOTPOOL_BATCH_CAPACITY` - Batch queue capacity
    /// - `SLOTPOOL_JITTER` - Random allocation padding (0/1)
    pub fn from_env() -> Self {
        Self {
            task_timeout: env_get_millis("SLOTPOOL_TASK_TIMEOUT_MS", defaults::TASK_TIMEOUT_MS),
            wait_poll: env_get_millis("SLOTPOOL_WAIT_POLL_MS", defaults::WAIT_POLL_MS),
            worker_park: env_get_millis("SLOTPOOL_WORKER_PARK_MS", defaults::WORKER_PARK_MS),
            shutdown_grace: env_get_millis(
                "SLOTPOOL_SHUTDOWN_GRACE_MS",
                defaults::SHUTDOWN_GRACE_MS,
            ),
            batch_enabled: env_get_bool("SLOTPOOL_BATCH", defaults::BATCH_ENABLED),
            batch_tick: env_get_micros("SLOTPOOL_BATCH_TICK_US", defaults::BATCH_TICK_US),
            batch_capacity: env_get("SLOTPOOL_BATCH_CAPACITY", defaults::BATCH_CAPACITY),
            jitter: env_get_bool("SLOTPOOL_JITTER", defaults::JITTER),
        }
    }

    /// Create config with library defaults (no env override).
    pub fn new() -> Self {
        Self {
            task_timeout: Duration::from_millis(defaults::TASK_TIMEOUT_MS),
            wait_poll: Duration::from_millis(defaults::WAIT_POLL_MS),
            worker_park: Duration::from_millis(defaults::WORKER_PARK_MS),
            shutdown_grace: Duration::from_millis(defaults::SHUTDOWN_GRACE_MS),
            batch_enabled: defaults::BATCH_ENABLED,
            batch_tick: Duration::from_micros(defaults::BATCH_TICK_US),
            batch_capacity: defaults::BATCH_CAPACITY,
            jitter: defaults::JITTER,
        }
    }

    // Builder methods

    pub fn task_timeout(mut self, d: Duration) -> Self {
        self.task_timeout = d;
        self
    }

    pub fn wait_poll(mut self, d: Duration) -> Self {
        self.wait_poll = d;
        self
    }

    pub fn worker_park(mut self, d: Duration) -> Self {
        self.worker_park = d;
        self
    }

    pub fn shutdown_grace(mut self, d: Duration) -> Self {
        self.shutdown_grace = d;
        self
    }

    pub fn batch_enabled(mut self, enable: bool) -> Self {
        self.batch_enabled = enable;
        self
    }

    pub fn batch_tick(mut self, d: Duration) -> Self {
        self.batch_tick = d;
        self
    }

    pub fn batch_capacity(mut self, cap: usize) -> Self {
        self.batch_capacity = cap;
        self
    }

    pub fn jitter(mut self, enable: bool) -> Self {
        self.jitter = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("task_timeout must be > 0"));
        }
        if self.wait_poll.is_zero() {
            return Err(ConfigError::InvalidValue("wait_poll must be > 0"));
        }
        if self.worker_park.is_zero() {
            return Err(ConfigError::InvalidValue("worker_park must be > 0"));
        }
        if self.batch_enabled && self.batch_tick.is_zero() {
            return Err(ConfigError::InvalidValue("batch_tick must be > 0"));
        }
        if self.batch_enabled && self.batch_capacity == 0 {
            return Err(ConfigError::InvalidValue("batch_capacity must be > 0"));
        }
        Ok(())
    }

    /// Log the effective configuration at debug level
    pub fn log(&self) {
        tracing::debug!(
            task_timeout = ?self.task_timeout,
            wait_poll = ?self.wait_poll,
            worker_park = ?self.worker_park,
            shutdown_grace = ?self.shutdown_grace,
            batch_enabled = self.batch_enabled,
            batch_tick = ?self.batch_tick,
            batch_capacity = self.batch_capacity,
            jitter = self.jitter,
            "pool configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::new();
        assert_eq!(config.task_timeout, Duration::from_secs(30));
        assert_eq!(config.wait_poll, Duration::from_millis(10));
        assert!(!config.batch_enabled);
        assert!(config.jitter);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env() {
        let config = PoolConfig::from_env();
        assert!(!config.task_timeout.is_zero());
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new()
            .task_timeout(Duration::from_millis(250))
            .batch_enabled(true)
            .batch_capacity(8)
            .jitter(false);

        assert_eq!(config.task_timeout, Duration::from_millis(250));
        assert!(config.batch_enabled);
        assert_eq!(config.batch_capacity, 8);
        assert!(!config.jitter);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = PoolConfig::new().task_timeout(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue("task_timeout must be > 0"))
        );

        // Batch settings only matter when batching is on
        let config = PoolConfig::new().batch_capacity(0);
        assert!(config.validate().is_ok());
        let config = config.batch_enabled(true);
        assert!(config.validate().is_err());
    }
}
