//! Worker threads, one per slot
//!
//! Each slot owns a named OS thread and a single-entry mailbox. The caller
//! that reserved the slot pushes one job and unparks the thread. The thread
//! runs the job and does all completion bookkeeping itself before replying:
//!
//! 1. bump the slot's task counter
//! 2. fold the duration into the slot average (inline or batched)
//! 3. on failure, Busy -> Error
//! 4. release the slot (set_idle, wakes waiters)
//! 5. send the outcome
//!
//! So a slot never reads Idle while its task is still running, even when
//! the caller stopped waiting for the result.

use crate::batch::{BatchOp, OperationBatch};
use crate::metrics::MetricsAggregator;
use crate::parking::WaitNotify;
use crate::status::StatusTracker;

use slotpool_core::error::CapabilityError;
use slotpool_core::id::PoolId;

use bytes::Bytes;
use crossbeam_queue::ArrayQueue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

/// A unit of work. `Err` carries the task's own failure message.
pub type Job = Box<dyn FnOnce() -> Result<Bytes, String> + Send + 'static>;

/// What a worker reports back for one job
#[derive(Debug)]
pub struct TaskOutcome {
    pub slot: usize,
    pub result: Result<Bytes, String>,
    pub duration: Duration,
    pub panicked: bool,
}

/// A job plus the channel its outcome goes to
pub struct Dispatch {
    pub job: Job,
    pub reply: SyncSender<TaskOutcome>,
}

/// State shared by every worker of one pool
struct WorkerShared {
    pool: PoolId,
    tracker: Arc<StatusTracker>,
    metrics: Arc<MetricsAggregator>,
    batch: Option<Arc<OperationBatch>>,
    notify: Arc<dyn WaitNotify>,
    /// Worker threads that have not exited yet
    live: AtomicI32,
    stop: AtomicBool,
    park: Duration,
}

/// Decrements the live count when a worker thread exits, however it exits
struct LiveGuard<'a>(&'a WorkerShared);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::AcqRel);
        self.0.notify.wake_all(&self.0.live);
    }
}

/// The worker threads of one pool
pub struct WorkerSet {
    shared: Arc<WorkerShared>,
    mailboxes: Vec<Arc<ArrayQueue<Dispatch>>>,
    threads: Vec<Thread>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerSet {
    /// Spawn one thread per slot of `tracker`.
    ///
    /// If any spawn fails, the threads already started are stopped and the
    /// error is returned.
    pub fn spawn(
        pool: PoolId,
        tracker: Arc<StatusTracker>,
        metrics: Arc<MetricsAggregator>,
        batch: Option<Arc<OperationBatch>>,
        notify: Arc<dyn WaitNotify>,
        park: Duration,
    ) -> Result<Self, CapabilityError> {
        let slots = tracker.slots();
        let shared = Arc::new(WorkerShared {
            pool,
            tracker,
            metrics,
            batch,
            notify,
            live: AtomicI32::new(0),
            stop: AtomicBool::new(false),
            park,
        });

        let mut set = WorkerSet {
            shared,
            mailboxes: Vec::with_capacity(slots),
            threads: Vec::with_capacity(slots),
            handles: Mutex::new(Vec::with_capacity(slots)),
        };

        for slot in 0..slots {
            let mailbox = Arc::new(ArrayQueue::new(1));
            let name = format!("slotpool-{}-worker-{}", pool.as_u64(), slot);

            set.shared.live.fetch_add(1, Ordering::AcqRel);
            let spawned = {
                let shared = Arc::clone(&set.shared);
                let mailbox = Arc::clone(&mailbox);
                thread::Builder::new()
                    .name(name.clone())
                    .spawn(move || worker_loop(shared, mailbox, slot))
            };

            match spawned {
                Ok(handle) => {
                    set.threads.push(handle.thread().clone());
                    set.handles
                        .get_mut()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(handle);
                    set.mailboxes.push(mailbox);
                }
                Err(e) => {
                    set.shared.live.fetch_sub(1, Ordering::AcqRel);
                    set.shutdown(Duration::from_millis(100));
                    return Err(CapabilityError::SpawnFailed {
                        thread: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(pool = %pool, workers = slots, "worker threads started");
        Ok(set)
    }

    /// Hand a job to the thread of a slot the caller has reserved.
    ///
    /// Gives the dispatch back if the worker is stopping or its mailbox is
    /// occupied.
    pub fn dispatch(&self, slot: usize, dispatch: Dispatch) -> Result<(), Dispatch> {
        let mailbox = match self.mailboxes.get(slot) {
            Some(mailbox) => mailbox,
            None => return Err(dispatch),
        };
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(dispatch);
        }
        mailbox.push(dispatch)?;
        self.threads[slot].unpark();

        // Raced with shutdown: the thread may already be gone. Taking the
        // job back drops its reply sender, which the caller sees as a
        // disconnect. If the thread got to it first, it runs normally.
        if self.shared.stop.load(Ordering::Acquire) {
            drop(mailbox.pop());
        }
        Ok(())
    }

    /// Worker threads still running
    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::Acquire).max(0) as usize
    }

    /// Stop every worker, waiting up to `grace` for them to exit.
    ///
    /// Threads still running after `grace` (a task that will not return)
    /// are detached and keep only their own references alive. Returns how
    /// many were detached. Later calls are no-ops.
    pub fn shutdown(&self, grace: Duration) -> usize {
        self.shared.stop.store(true, Ordering::Release);
        for t in &self.threads {
            t.unpark();
        }

        // A grace too large to represent as an Instant means no deadline
        let deadline = Instant::now().checked_add(grace);
        loop {
            let live = self.shared.live.load(Ordering::Acquire);
            if live <= 0 {
                break;
            }
            let mut wait = Duration::from_millis(10);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                wait = wait.min(deadline - now);
            }
            self.shared.notify.wait(&self.shared.live, live, wait);
        }

        // Undelivered jobs: dropping them disconnects their callers.
        for mailbox in &self.mailboxes {
            drop(mailbox.pop());
        }

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        let mut detached = 0;
        for (slot, handle) in handles.into_iter().enumerate() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::warn!(pool = %self.shared.pool, slot, "worker thread panicked");
                }
            } else {
                tracing::warn!(
                    pool = %self.shared.pool,
                    slot,
                    ?grace,
                    "worker did not exit within grace period, detaching"
                );
                detached += 1;
            }
        }
        detached
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.shutdown(Duration::ZERO);
    }
}

fn worker_loop(shared: Arc<WorkerShared>, mailbox: Arc<ArrayQueue<Dispatch>>, slot: usize) {
    let _live = LiveGuard(shared.as_ref());

    loop {
        if let Some(dispatch) = mailbox.pop() {
            run_job(&shared, slot, dispatch);
            continue;
        }
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        thread::park_timeout(shared.park);
    }

    tracing::trace!(pool = %shared.pool, slot, "worker exiting");
}

fn run_job(shared: &WorkerShared, slot: usize, dispatch: Dispatch) {
    let Dispatch { job, reply } = dispatch;

    let start = Instant::now();
    let (result, panicked) = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(result) => (result, false),
        Err(payload) => (Err(panic_message(payload.as_ref())), true),
    };
    let duration = start.elapsed();

    shared.tracker.mark_completed(slot);

    let duration_ms = duration.as_millis().min(u32::MAX as u128) as u32;
    match &shared.batch {
        Some(batch) => batch.submit_or_apply(BatchOp::RecordDuration { slot, duration_ms }),
        None => {
            shared.metrics.record_duration(slot, duration_ms);
        }
    }

    if let Err(message) = &result {
        shared.tracker.set_error(slot);
        if panicked {
            tracing::warn!(pool = %shared.pool, slot, %message, "task panicked");
        } else {
            tracing::debug!(pool = %shared.pool, slot, %message, "task failed");
        }
    }

    shared.tracker.set_idle(slot);

    // The caller may have timed out and dropped the receiver
    let _ = reply.send(TaskOutcome {
        slot,
        result,
        duration,
        panicked,
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::CoordinationBuffer;
    use crate::parking::new_wait_notify;
    use slotpool_core::layout::BufferLayout;
    use slotpool_core::status::WorkerStatus;
    use std::sync::mpsc;

    struct Fixture {
        tracker: Arc<StatusTracker>,
        metrics: Arc<MetricsAggregator>,
        workers: WorkerSet,
    }

    fn fixture(n: i64) -> Fixture {
        let layout = BufferLayout::for_workers(n).unwrap();
        let buffer = Arc::new(CoordinationBuffer::allocate(layout, false).unwrap());
        let notify = new_wait_notify();
        let tracker = Arc::new(StatusTracker::new(Arc::clone(&buffer), Arc::clone(&notify)));
        let metrics = Arc::new(MetricsAggregator::new(buffer, Arc::clone(&notify)));
        let workers = WorkerSet::spawn(
            PoolId::new(9),
            Arc::clone(&tracker),
            Arc::clone(&metrics),
            None,
            notify,
            Duration::from_millis(20),
        )
        .unwrap();
        Fixture { tracker, metrics, workers }
    }

    fn job<F>(f: F) -> Job
    where
        F: FnOnce() -> Result<Bytes, String> + Send + 'static,
    {
        Box::new(f)
    }

    fn run<F>(f: &Fixture, slot: usize, task: F) -> TaskOutcome
    where
        F: FnOnce() -> Result<Bytes, String> + Send + 'static,
    {
        assert!(f.tracker.try_set_busy(slot));
        let (tx, rx) = mpsc::sync_channel(1);
        assert!(f.workers.dispatch(slot, Dispatch { job: job(task), reply: tx }).is_ok());
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_job_runs_and_slot_released() {
        let f = fixture(2);
        let outcome = run(&f, 1, || Ok(Bytes::from_static(b"done")));

        assert_eq!(outcome.slot, 1);
        assert_eq!(outcome.result, Ok(Bytes::from_static(b"done")));
        assert!(!outcome.panicked);
        assert_eq!(f.tracker.get(1), WorkerStatus::Idle);
        assert_eq!(f.tracker.tasks_completed(1), 1);
        assert_eq!(f.tracker.available(), 2);
    }

    #[test]
    fn test_duration_recorded() {
        let f = fixture(1);
        run(&f, 0, || {
            thread::sleep(Duration::from_millis(30));
            Ok(Bytes::new())
        });
        assert!(f.metrics.average_ms(0) >= 30);
    }

    #[test]
    fn test_failed_and_panicking_jobs_release_slot() {
        let f = fixture(1);

        let outcome = run(&f, 0, || Err("bad input".to_string()));
        assert_eq!(outcome.result, Err("bad input".to_string()));
        assert_eq!(f.tracker.get(0), WorkerStatus::Idle);

        let outcome = run(&f, 0, || panic!("boom"));
        assert!(outcome.panicked);
        assert_eq!(outcome.result, Err("panicked: boom".to_string()));
        assert_eq!(f.tracker.get(0), WorkerStatus::Idle);
        assert_eq!(f.tracker.available(), 1);
        assert_eq!(f.tracker.tasks_completed(0), 2);

        // The thread survived the panic
        let outcome = run(&f, 0, || Ok(Bytes::from_static(b"again")));
        assert_eq!(outcome.result, Ok(Bytes::from_static(b"again")));
    }

    #[test]
    fn test_shutdown_joins_idle_workers() {
        let f = fixture(4);
        assert_eq!(f.workers.live(), 4);
        assert_eq!(f.workers.shutdown(Duration::from_secs(2)), 0);
        assert_eq!(f.workers.live(), 0);

        let (tx, rx) = mpsc::sync_channel(1);
        assert!(f
            .workers
            .dispatch(0, Dispatch { job: job(|| Ok(Bytes::new())), reply: tx })
            .is_err());
        drop(rx);
    }

    #[test]
    fn test_stuck_worker_detached_after_grace() {
        let f = fixture(2);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        assert!(f.tracker.try_set_busy(0));
        let (tx, _rx) = mpsc::sync_channel(1);
        let blocking = job(move || {
            let _ = release_rx.recv();
            Ok(Bytes::new())
        });
        assert!(f.workers.dispatch(0, Dispatch { job: blocking, reply: tx }).is_ok());
        // Let the worker pick it up
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        assert_eq!(f.workers.shutdown(Duration::from_millis(50)), 1);
        assert!(start.elapsed() < Duration::from_secs(1));

        // Unblock the detached thread so the test process stays tidy
        release_tx.send(()).unwrap();
    }
}
