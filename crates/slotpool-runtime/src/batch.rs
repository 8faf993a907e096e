//! Deferred coordination operations
//!
//! `OperationBatch` collects operations in a bounded lock-free queue and
//! applies them from one flusher thread once per tick. Each operation is
//! applied on its own; nothing is coalesced, so every recorded duration
//! still passes through the halving blend.
//!
//! A full queue, or a batch that has been stopped, applies the operation
//! inline on the calling thread. Nothing is ever dropped.

use crate::metrics::MetricsAggregator;
use crate::status::StatusTracker;

use slotpool_core::error::CapabilityError;
use slotpool_core::id::PoolId;
use slotpool_core::status::WorkerStatus;

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One deferred operation
pub enum BatchOp {
    RecordDuration { slot: usize, duration_ms: u32 },
    IncrementCounter { slot: usize },
    ReadStatus { slot: usize, reply: SyncSender<WorkerStatus> },
    ReadAvailable { reply: SyncSender<u32> },
}

impl std::fmt::Debug for BatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchOp::RecordDuration { slot, duration_ms } => f
                .debug_struct("RecordDuration")
                .field("slot", slot)
                .field("duration_ms", duration_ms)
                .finish(),
            BatchOp::IncrementCounter { slot } => {
                f.debug_struct("IncrementCounter").field("slot", slot).finish()
            }
            BatchOp::ReadStatus { slot, .. } => {
                f.debug_struct("ReadStatus").field("slot", slot).finish()
            }
            BatchOp::ReadAvailable { .. } => f.write_str("ReadAvailable"),
        }
    }
}

struct BatchInner {
    queue: ArrayQueue<BatchOp>,
    tracker: Arc<StatusTracker>,
    metrics: Arc<MetricsAggregator>,
    stopped: AtomicBool,
    applied: AtomicU64,
    inline: AtomicU64,
}

impl BatchInner {
    fn apply(&self, op: BatchOp) {
        match op {
            BatchOp::RecordDuration { slot, duration_ms } => {
                self.metrics.record_duration(slot, duration_ms);
            }
            BatchOp::IncrementCounter { slot } => self.tracker.mark_completed(slot),
            // The requester may have stopped listening
            BatchOp::ReadStatus { slot, reply } => {
                let _ = reply.send(self.tracker.get(slot));
            }
            BatchOp::ReadAvailable { reply } => {
                let _ = reply.send(self.tracker.available());
            }
        }
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    fn drain(&self) -> usize {
        let mut count = 0;
        while let Some(op) = self.queue.pop() {
            self.apply(op);
            count += 1;
        }
        count
    }
}

/// Bounded operation queue with a periodic flusher thread
pub struct OperationBatch {
    inner: Arc<BatchInner>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl OperationBatch {
    /// Spawn the flusher thread for pool `pool`.
    pub fn start(
        pool: PoolId,
        tracker: Arc<StatusTracker>,
        metrics: Arc<MetricsAggregator>,
        tick: Duration,
        capacity: usize,
    ) -> Result<Self, CapabilityError> {
        let inner = Arc::new(BatchInner {
            queue: ArrayQueue::new(capacity.max(1)),
            tracker,
            metrics,
            stopped: AtomicBool::new(false),
            applied: AtomicU64::new(0),
            inline: AtomicU64::new(0),
        });

        let name = format!("slotpool-{}-batch", pool.as_u64());
        let handle = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || flusher_loop(inner, tick))
                .map_err(|e| CapabilityError::SpawnFailed {
                    thread: name,
                    reason: e.to_string(),
                })?
        };

        tracing::debug!(pool = %pool, ?tick, capacity, "operation batch started");
        Ok(Self {
            inner,
            flusher: Mutex::new(Some(handle)),
        })
    }

    /// Queue `op` for the next tick.
    ///
    /// Hands the op back if the queue is full or the batch is stopped.
    pub fn submit(&self, op: BatchOp) -> Result<(), BatchOp> {
        if self.is_stopped() {
            return Err(op);
        }
        self.inner.queue.push(op)?;
        // Raced with stop(); its final drain may already be over.
        if self.is_stopped() {
            self.inner.drain();
        }
        Ok(())
    }

    /// Queue `op`, or apply it right here when it cannot be queued
    pub fn submit_or_apply(&self, op: BatchOp) {
        if let Err(op) = self.submit(op) {
            self.inner.inline.fetch_add(1, Ordering::Relaxed);
            self.inner.apply(op);
        }
    }

    /// Apply everything queued so far on the calling thread.
    pub fn flush_now(&self) -> usize {
        self.inner.drain()
    }

    /// Read a slot status through the queue, in order with earlier ops
    pub fn read_status(&self, slot: usize) -> WorkerStatus {
        let (tx, rx) = mpsc::sync_channel(1);
        self.submit_or_apply(BatchOp::ReadStatus { slot, reply: tx });
        rx.recv().unwrap_or_else(|_| self.inner.tracker.get(slot))
    }

    /// Read the available count through the queue, in order with earlier ops
    pub fn read_available(&self) -> u32 {
        let (tx, rx) = mpsc::sync_channel(1);
        self.submit_or_apply(BatchOp::ReadAvailable { reply: tx });
        rx.recv().unwrap_or_else(|_| self.inner.tracker.available())
    }

    /// Ops waiting for the next tick
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Ops applied so far, inline ones included
    pub fn applied(&self) -> u64 {
        self.inner.applied.load(Ordering::Relaxed)
    }

    /// Ops that bypassed the queue
    pub fn applied_inline(&self) -> u64 {
        self.inner.inline.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Stop the flusher and apply whatever is still queued. Idempotent.
    ///
    /// Returns the number of ops applied by the final drain.
    pub fn stop(&self) -> usize {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let handle = self
            .flusher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!("batch flusher panicked");
            }
        }

        let drained = self.inner.drain();
        tracing::debug!(
            drained,
            applied = self.applied(),
            inline = self.applied_inline(),
            "operation batch stopped"
        );
        drained
    }
}

impl Drop for OperationBatch {
    fn drop(&mut self) {
        self.stop();
    }
}

fn flusher_loop(inner: Arc<BatchInner>, tick: Duration) {
    while !inner.stopped.load(Ordering::Acquire) {
        thread::park_timeout(tick);
        let n = inner.drain();
        if n > 0 {
            tracing::trace!(ops = n, "batch flushed");
        }
    }
}
