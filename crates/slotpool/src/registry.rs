//! Pool registry
//!
//! Owns every pool created through it and the table of task handlers.
//! Handles are plain ids; a handle to a destroyed pool keeps failing with
//! `PoolNotFound` because ids are never reused.

use crate::handler::TaskHandler;

use slotpool_core::error::{PoolError, PoolResult};
use slotpool_core::id::PoolId;
use slotpool_runtime::config::PoolConfig;
use slotpool_runtime::coordinator::{PoolStats, TaskResult, WorkerPoolCoordinator};

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Caller-side reference to a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(PoolId);

impl PoolHandle {
    #[inline]
    pub fn id(&self) -> PoolId {
        self.0
    }
}

impl fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Creates, tracks and destroys pools
pub struct PoolRegistry {
    defaults: PoolConfig,
    next_id: AtomicU64,
    pools: RwLock<HashMap<PoolId, Arc<WorkerPoolCoordinator>>>,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolRegistry {
    /// Registry whose pools start from `PoolConfig::from_env()`
    pub fn new() -> Self {
        Self::with_config(PoolConfig::from_env())
    }

    /// Registry whose pools start from `defaults`
    pub fn with_config(defaults: PoolConfig) -> Self {
        Self {
            defaults,
            next_id: AtomicU64::new(1),
            pools: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register `handler` for `task_type`, replacing any previous one.
    pub fn register_handler<H>(&self, task_type: impl Into<String>, handler: H) -> Option<Arc<dyn TaskHandler>>
    where
        H: TaskHandler + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_type.into(), Arc::new(handler))
    }

    /// Create a pool of `max_workers` slots whose submits wait up to
    /// `task_timeout_ms` for a task result.
    pub fn create_pool(&self, max_workers: u32, task_timeout_ms: u32) -> PoolResult<PoolHandle> {
        let config = self
            .defaults
            .clone()
            .task_timeout(Duration::from_millis(u64::from(task_timeout_ms)));
        self.create_pool_with(max_workers, config)
    }

    /// Create a pool with an explicit configuration
    pub fn create_pool_with(&self, max_workers: u32, config: PoolConfig) -> PoolResult<PoolHandle> {
        let id = PoolId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pool = WorkerPoolCoordinator::create(id, max_workers, config).map_err(|e| {
            tracing::warn!(pool = %id, max_workers, error = %e, "pool creation failed");
            e
        })?;

        self.pools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(pool));
        Ok(PoolHandle(id))
    }

    /// Run the handler registered for `task_type` on `payload`.
    ///
    /// `timeout_ms` bounds the wait for a free worker.
    pub fn submit(
        &self,
        handle: PoolHandle,
        task_type: &str,
        payload: Bytes,
        timeout_ms: u32,
    ) -> PoolResult<TaskResult> {
        let pool = self.pool(handle)?;
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(task_type)
            .cloned()
            .ok_or_else(|| PoolError::UnknownTaskType(task_type.to_string()))?;

        pool.submit_fn(
            task_type,
            move || handler.run(payload),
            Duration::from_millis(u64::from(timeout_ms)),
        )
    }

    /// Run an ad-hoc closure, bypassing the handler table
    pub fn submit_fn<F>(&self, handle: PoolHandle, task_type: &str, task: F, timeout_ms: u32) -> PoolResult<TaskResult>
    where
        F: FnOnce() -> Result<Bytes, String> + Send + 'static,
    {
        self.pool(handle)?
            .submit_fn(task_type, task, Duration::from_millis(u64::from(timeout_ms)))
    }

    pub fn stats(&self, handle: PoolHandle) -> PoolResult<PoolStats> {
        Ok(self.pool(handle)?.stats())
    }

    /// Destroy a pool. Unknown or already destroyed handles are a no-op.
    pub fn destroy_pool(&self, handle: PoolHandle) {
        let removed = self
            .pools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle.0);
        // Tear down outside the map lock; in-flight submits hold their own Arc
        if let Some(pool) = removed {
            pool.destroy();
        }
    }

    /// Ids of live pools, ascending
    pub fn pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<PoolId> = self
            .pools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    /// Destroy every pool
    pub fn shutdown_all(&self) {
        let pools: Vec<_> = self
            .pools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, pool)| pool)
            .collect();
        if !pools.is_empty() {
            tracing::info!(pools = pools.len(), "shutting down all pools");
        }
        for pool in pools {
            pool.destroy();
        }
    }

    fn pool(&self, handle: PoolHandle) -> PoolResult<Arc<WorkerPoolCoordinator>> {
        self.pools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&handle.0)
            .cloned()
            .ok_or(PoolError::PoolNotFound(handle.0))
    }
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotpool_core::error::ConfigError;
    use slotpool_core::status::{PoolState, WorkerStatus};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Instant;

    fn registry() -> PoolRegistry {
        let r = PoolRegistry::with_config(
            PoolConfig::new().shutdown_grace(Duration::from_millis(500)),
        );
        r.register_handler("echo", |p: Bytes| -> Result<Bytes, String> { Ok(p) });
        r.register_handler("fail", |_: Bytes| -> Result<Bytes, String> {
            Err("rejected".to_string())
        });
        r
    }

    #[test]
    fn test_create_every_valid_size() {
        let r = registry();
        for n in 1..=16 {
            let h = r.create_pool(n, 1_000).unwrap();
            assert_eq!(r.stats(h).unwrap().available_workers, n);
        }
        assert_eq!(r.pool_ids().len(), 16);
    }

    #[test]
    fn test_create_out_of_range() {
        let r = registry();
        assert_eq!(
            r.create_pool(0, 1_000),
            Err(PoolError::Config(ConfigError::OutOfRange { requested: 0, max: 16 }))
        );
        assert_eq!(
            r.create_pool(17, 1_000),
            Err(PoolError::Config(ConfigError::OutOfRange { requested: 17, max: 16 }))
        );
        assert!(r.pool_ids().is_empty());
    }

    #[test]
    fn test_submit_through_handler() {
        let r = registry();
        let h = r.create_pool(2, 1_000).unwrap();

        let result = r.submit(h, "echo", Bytes::from_static(b"payload"), 100).unwrap();
        assert_eq!(result.output, Bytes::from_static(b"payload"));
        assert_eq!(result.task_type, "echo");

        let stats = r.stats(h).unwrap();
        assert_eq!(stats.total_tasks_completed, 1);
        assert_eq!(stats.available_workers, 2);
    }

    #[test]
    fn test_unknown_task_type() {
        let r = registry();
        let h = r.create_pool(1, 1_000).unwrap();
        assert_eq!(
            r.submit(h, "resize", Bytes::new(), 100),
            Err(PoolError::UnknownTaskType("resize".to_string()))
        );
        // Nothing was reserved
        assert_eq!(r.stats(h).unwrap().available_workers, 1);
    }

    #[test]
    fn test_task_error_still_releases_slot() {
        let r = registry();
        let h = r.create_pool(1, 1_000).unwrap();

        let err = r.submit(h, "fail", Bytes::new(), 100).unwrap_err();
        assert!(matches!(err, PoolError::TaskExecution { ref message, .. } if message == "rejected"));

        let stats = r.stats(h).unwrap();
        assert_eq!(stats.available_workers, 1);
        assert_eq!(stats.workers[0].status, WorkerStatus::Idle);
        assert_eq!(stats.workers[0].tasks_completed, 1);
        assert!(r.submit(h, "echo", Bytes::new(), 100).is_ok());
    }

    #[test]
    fn test_destroy_then_submit() {
        let r = registry();
        let h = r.create_pool(3, 1_000).unwrap();
        r.destroy_pool(h);

        assert_eq!(
            r.submit(h, "echo", Bytes::new(), 100),
            Err(PoolError::PoolNotFound(h.id()))
        );
        assert_eq!(r.stats(h), Err(PoolError::PoolNotFound(h.id())));

        // Second destroy is a no-op
        r.destroy_pool(h);
        assert!(r.pool_ids().is_empty());
    }

    #[test]
    fn test_ids_not_reused() {
        let r = registry();
        let a = r.create_pool(1, 1_000).unwrap();
        r.destroy_pool(a);
        let b = r.create_pool(1, 1_000).unwrap();
        assert_ne!(a, b);
        assert!(r.stats(a).is_err());
        assert!(r.stats(b).is_ok());
    }

    #[test]
    fn test_one_slot_two_submitters() {
        let r = Arc::new(registry());
        let h = r.create_pool(1, 5_000).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let r = Arc::clone(&r);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let start = Instant::now();
                    r.submit_fn(
                        h,
                        "hold",
                        || {
                            thread::sleep(Duration::from_millis(100));
                            Ok(Bytes::new())
                        },
                        5_000,
                    )
                    .unwrap();
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed: Vec<Duration> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        elapsed.sort();
        // The second caller waited for the first task to finish
        assert!(elapsed[0] < Duration::from_millis(190));
        assert!(elapsed[1] >= Duration::from_millis(190));
        assert_eq!(r.stats(h).unwrap().total_tasks_completed, 2);
    }

    #[test]
    fn test_shutdown_all_and_drop() {
        let r = registry();
        let handles: Vec<_> = (0..3).map(|_| r.create_pool(2, 1_000).unwrap()).collect();
        assert_eq!(r.pool_ids(), handles.iter().map(|h| h.id()).collect::<Vec<_>>());

        r.shutdown_all();
        assert!(r.pool_ids().is_empty());
        for h in handles {
            assert_eq!(r.stats(h), Err(PoolError::PoolNotFound(h.id())));
        }

        let r = registry();
        let h = r.create_pool(2, 1_000).unwrap();
        let pool = r.pool(h).unwrap();
        drop(r);
        assert_eq!(pool.state(), PoolState::Destroyed);
    }
}
