//! Per-slot rolling duration average
//!
//! `metrics[slot + 1]` holds a halving blend of task durations in whole
//! milliseconds: the first non-zero sample replaces 0, every later sample
//! gives `floor((current + sample) / 2)`. This weights recent tasks heavily
//! and is not an arithmetic mean.
//!
//! Updates to one slot are serialized by a CAS spin-lock cell in a separate
//! array (0 = free, 1 = held), created on first use and discarded with the
//! pool. Acquisition is bounded by `METRIC_LOCK_MAX_SPINS` attempts and
//! `METRIC_LOCK_TIMEOUT`; when either budget runs out the sample is dropped.

use crate::memory::CoordinationBuffer;
use crate::parking::WaitNotify;

use slotpool_core::constants::{
    METRIC_LOCK_MAX_BACKOFF, METRIC_LOCK_MAX_SPINS, METRIC_LOCK_TIMEOUT,
};

use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const UNLOCKED: i32 = 0;
const LOCKED: i32 = 1;

/// Attempts that only spin before backing off by parking
const PURE_SPINS: u32 = 4;

/// First parked backoff step; doubles up to `METRIC_LOCK_MAX_BACKOFF`
const BACKOFF_BASE: Duration = Duration::from_micros(50);

/// One lock cell per slot
struct MetricLocks {
    cells: Box<[AtomicI32]>,
}

impl MetricLocks {
    fn new(slots: usize) -> Self {
        Self {
            cells: (0..slots).map(|_| AtomicI32::new(UNLOCKED)).collect(),
        }
    }
}

/// Lock-free running-average updater
pub struct MetricsAggregator {
    buffer: Arc<CoordinationBuffer>,
    notify: Arc<dyn WaitNotify>,
    locks: ArcSwapOption<MetricLocks>,
}

impl MetricsAggregator {
    pub fn new(buffer: Arc<CoordinationBuffer>, notify: Arc<dyn WaitNotify>) -> Self {
        Self {
            buffer,
            notify,
            locks: ArcSwapOption::const_empty(),
        }
    }

    /// Fold `duration_ms` into the slot's average.
    ///
    /// Returns `false` if the sample was dropped (lock budget exhausted or
    /// pool already released).
    pub fn record_duration(&self, slot: usize, duration_ms: u32) -> bool {
        if self.buffer.is_released() {
            return false;
        }

        let locks = self.locks();
        let lock = &locks.cells[slot];
        if !self.acquire(lock) {
            tracing::debug!(slot, duration_ms, "metric lock busy, sample dropped");
            return false;
        }

        let cell = &self.buffer.metrics()[slot + 1];
        let sample = duration_ms.min(i32::MAX as u32) as i32;
        let current = cell.load(Ordering::Acquire);
        let next = blend(current, sample);
        cell.store(next, Ordering::Release);

        lock.store(UNLOCKED, Ordering::Release);
        self.notify.wake_one(lock);
        true
    }

    /// Current average for `slot` in milliseconds
    #[inline]
    pub fn average_ms(&self, slot: usize) -> u32 {
        self.buffer.metrics()[slot + 1].load(Ordering::Acquire).max(0) as u32
    }

    /// Drop the lock array. A later `record_duration` recreates it.
    pub fn discard_locks(&self) {
        self.locks.store(None);
    }

    /// Check if the lock array currently exists
    pub fn has_locks(&self) -> bool {
        self.locks.load().is_some()
    }

    fn locks(&self) -> Arc<MetricLocks> {
        if let Some(locks) = self.locks.load_full() {
            return locks;
        }
        let fresh = Arc::new(MetricLocks::new(self.buffer.slots()));
        // Another thread may have installed its own array first; use that.
        let previous = self
            .locks
            .compare_and_swap(&None::<Arc<MetricLocks>>, Some(Arc::clone(&fresh)));
        match &*previous {
            Some(existing) => Arc::clone(existing),
            None => fresh,
        }
    }

    fn acquire(&self, lock: &AtomicI32) -> bool {
        let deadline = Instant::now() + METRIC_LOCK_TIMEOUT;
        let mut backoff = BACKOFF_BASE;

        for attempt in 0..METRIC_LOCK_MAX_SPINS {
            if lock
                .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            if attempt < PURE_SPINS {
                for _ in 0..(1u32 << attempt) * 16 {
                    std::hint::spin_loop();
                }
            } else {
                let wait = backoff.min(deadline - now);
                self.notify.wait(lock, LOCKED, wait);
                backoff = (backoff * 2).min(METRIC_LOCK_MAX_BACKOFF);
            }
        }
        false
    }
}

/// Halving blend; 0 means "no sample yet".
#[inline]
fn blend(current: i32, sample: i32) -> i32 {
    if current == 0 {
        sample
    } else {
        ((current as i64 + sample as i64) / 2) as i32
    }
}
