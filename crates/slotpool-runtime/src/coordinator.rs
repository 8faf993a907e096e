//! Pool lifecycle and task submission
//!
//! `WorkerPoolCoordinator` wires one coordination buffer to its status
//! tracker, metrics aggregator, slot waiter, optional operation batch and
//! worker threads.
//!
//! ```text
//! Uninitialized -> Ready -> ShuttingDown -> Destroyed
//! ```
//!
//! Only `Ready` accepts submissions. `destroy` runs its teardown exactly
//! once; concurrent and repeated calls return immediately.

use crate::batch::OperationBatch;
use crate::config::PoolConfig;
use crate::memory::CoordinationBuffer;
use crate::metrics::MetricsAggregator;
use crate::parking::{new_wait_notify, WaitNotify};
use crate::status::StatusTracker;
use crate::waiter::TaskWaiter;
use crate::worker::{Dispatch, Job, TaskOutcome, WorkerSet};

use slotpool_core::error::{PoolError, PoolResult};
use slotpool_core::id::PoolId;
use slotpool_core::layout::BufferLayout;
use slotpool_core::status::{PoolState, WorkerStatus};

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

/// Successful task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub task_type: String,
    /// Slot the task ran on
    pub slot: usize,
    pub output: Bytes,
    /// Wall time of the task body on the worker thread
    pub duration: Duration,
}

/// Snapshot of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub slot: usize,
    pub status: WorkerStatus,
    pub tasks_completed: u32,
    pub avg_duration_ms: u32,
}

/// Snapshot of a whole pool.
///
/// Cells are read one at a time, so under load the fields need not agree
/// with each other exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_id: PoolId,
    pub state: PoolState,
    pub workers: Vec<WorkerStats>,
    pub available_workers: u32,
    pub busy_workers: u32,
    pub total_tasks_completed: u64,
}

/// One worker pool
pub struct WorkerPoolCoordinator {
    id: PoolId,
    config: PoolConfig,
    buffer: Arc<CoordinationBuffer>,
    tracker: Arc<StatusTracker>,
    metrics: Arc<MetricsAggregator>,
    waiter: TaskWaiter,
    batch: Option<Arc<OperationBatch>>,
    workers: WorkerSet,
    closed: Arc<AtomicBool>,
    state: AtomicU8,
}

impl WorkerPoolCoordinator {
    /// Validate, allocate and start a pool of `workers` slots.
    ///
    /// Fails with `ConfigError` for a worker count outside `1..=16` or an
    /// unusable config, and with `CapabilityError` if the shared region or
    /// the threads cannot be created.
    pub fn create(id: PoolId, workers: u32, config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        let layout = BufferLayout::for_workers(i64::from(workers))?;
        let buffer = Arc::new(CoordinationBuffer::allocate(layout, config.jitter)?);

        let notify: Arc<dyn WaitNotify> = new_wait_notify();
        let tracker = Arc::new(StatusTracker::new(Arc::clone(&buffer), Arc::clone(&notify)));
        let metrics = Arc::new(MetricsAggregator::new(Arc::clone(&buffer), Arc::clone(&notify)));
        let closed = Arc::new(AtomicBool::new(false));
        let waiter = TaskWaiter::new(Arc::clone(&tracker), Arc::clone(&closed), config.wait_poll);

        let batch = if config.batch_enabled {
            Some(Arc::new(OperationBatch::start(
                id,
                Arc::clone(&tracker),
                Arc::clone(&metrics),
                config.batch_tick,
                config.batch_capacity,
            )?))
        } else {
            None
        };

        let workers = WorkerSet::spawn(
            id,
            Arc::clone(&tracker),
            Arc::clone(&metrics),
            batch.clone(),
            notify,
            config.worker_park,
        )?;

        config.log();
        tracing::info!(
            pool = %id,
            workers = layout.workers,
            bytes = buffer.allocated_bytes(),
            batched = config.batch_enabled,
            "pool created"
        );

        Ok(Self {
            id,
            config,
            buffer,
            tracker,
            metrics,
            waiter,
            batch,
            workers,
            closed,
            state: AtomicU8::new(PoolState::Ready.into()),
        })
    }

    #[inline]
    pub fn id(&self) -> PoolId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> PoolState {
        PoolState::from(self.state.load(Ordering::Acquire))
    }

    /// Number of worker slots
    #[inline]
    pub fn workers(&self) -> usize {
        self.tracker.slots()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Run `task` on the first free slot.
    ///
    /// Waits up to `wait_timeout` for a slot, then up to the configured task
    /// timeout for the result. A task that outlives the result timeout keeps
    /// its slot until it finishes.
    pub fn submit_fn<F>(&self, task_type: &str, task: F, wait_timeout: Duration) -> PoolResult<TaskResult>
    where
        F: FnOnce() -> Result<Bytes, String> + Send + 'static,
    {
        self.ensure_ready()?;
        let slot = self
            .waiter
            .await_free_slot(wait_timeout)
            .map_err(|e| PoolError::from_wait(e, self.id))?;
        self.run_on(slot, task_type, Box::new(task))
    }

    /// Run `task` on one specific slot, waiting for it to become free
    pub fn submit_pinned<F>(
        &self,
        slot: usize,
        task_type: &str,
        task: F,
        wait_timeout: Duration,
    ) -> PoolResult<TaskResult>
    where
        F: FnOnce() -> Result<Bytes, String> + Send + 'static,
    {
        self.ensure_ready()?;
        if slot >= self.workers() {
            return Err(PoolError::Dispatch { slot });
        }
        let slot = self
            .waiter
            .await_slot(slot, wait_timeout)
            .map_err(|e| PoolError::from_wait(e, self.id))?;
        self.run_on(slot, task_type, Box::new(task))
    }

    fn ensure_ready(&self) -> PoolResult<()> {
        if self.state().accepts_tasks() {
            Ok(())
        } else {
            Err(PoolError::PoolNotFound(self.id))
        }
    }

    /// Dispatch to a slot the caller has already reserved
    fn run_on(&self, slot: usize, task_type: &str, job: Job) -> PoolResult<TaskResult> {
        let (reply, outcome) = mpsc::sync_channel::<TaskOutcome>(1);

        if self.workers.dispatch(slot, Dispatch { job, reply }).is_err() {
            self.tracker.set_idle(slot);
            return Err(PoolError::Dispatch { slot });
        }

        match outcome.recv_timeout(self.config.task_timeout) {
            Ok(TaskOutcome { result: Ok(output), duration, .. }) => Ok(TaskResult {
                task_type: task_type.to_string(),
                slot,
                output,
                duration,
            }),
            Ok(TaskOutcome { result: Err(message), .. }) => Err(PoolError::TaskExecution {
                task_type: task_type.to_string(),
                slot,
                message,
            }),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    pool = %self.id,
                    slot,
                    task_type,
                    timeout = ?self.config.task_timeout,
                    "task result timed out"
                );
                Err(PoolError::TaskTimeout {
                    slot,
                    timeout: self.config.task_timeout,
                })
            }
            // Pool went down before the worker picked the job up
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Dispatch { slot }),
        }
    }

    /// Snapshot slot states, counters and averages. Never mutates.
    ///
    /// Once destroyed, every slot reports Shutdown with zeroed counters.
    pub fn stats(&self) -> PoolStats {
        // A released buffer reads all zeroes, which would decode as Idle
        let destroyed = self.state() == PoolState::Destroyed;
        let workers: Vec<WorkerStats> = (0..self.workers())
            .map(|slot| WorkerStats {
                slot,
                status: if destroyed {
                    WorkerStatus::Shutdown
                } else {
                    self.tracker.get(slot)
                },
                tasks_completed: self.tracker.tasks_completed(slot),
                avg_duration_ms: self.metrics.average_ms(slot),
            })
            .collect();

        let busy_workers = workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Busy)
            .count() as u32;
        let total_tasks_completed = workers.iter().map(|w| u64::from(w.tasks_completed)).sum();

        PoolStats {
            pool_id: self.id,
            state: self.state(),
            workers,
            available_workers: self.tracker.available(),
            busy_workers,
            total_tasks_completed,
        }
    }

    /// Little-endian image of the coordination buffer
    pub fn buffer_image(&self) -> Vec<u8> {
        self.buffer.to_le_bytes()
    }

    /// Shut the pool down. Idempotent.
    ///
    /// Every slot goes to Shutdown, parked waiters are woken and see the
    /// pool closed, worker threads get the configured grace period, then
    /// the metric locks and the buffer are released.
    pub fn destroy(&self) {
        if self
            .state
            .compare_exchange(
                PoolState::Ready.into(),
                PoolState::ShuttingDown.into(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        self.closed.store(true, Ordering::Release);
        for slot in 0..self.workers() {
            self.tracker.set_shutdown(slot);
        }
        self.tracker.wake_all_waiters();

        let detached = self.workers.shutdown(self.config.shutdown_grace);
        if let Some(batch) = &self.batch {
            batch.stop();
        }

        self.metrics.discard_locks();
        self.buffer.release();
        self.state.store(PoolState::Destroyed.into(), Ordering::Release);

        tracing::info!(pool = %self.id, detached, "pool destroyed");
    }
}

impl Drop for WorkerPoolCoordinator {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for WorkerPoolCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolCoordinator")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("buffer", &self.buffer)
            .finish()
    }
}
