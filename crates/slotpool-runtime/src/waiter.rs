//! Waiting for a free worker slot
//!
//! Two phases per iteration:
//! 1. Optimistic: if the available count is non-zero, scan slots in order
//!    and try to reserve the first Idle one.
//! 2. Blocking: if nothing is available, park on the available-count cell
//!    for at most `poll` so the absolute deadline is re-checked even if a
//!    wakeup is missed.
//!
//! No OS lock is ever held. A caller that abandons a wait has reserved
//! nothing, so there is nothing to clean up.

use crate::status::StatusTracker;

use slotpool_core::error::WaitError;
use slotpool_core::status::WorkerStatus;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blocks callers until a slot is reserved for them
pub struct TaskWaiter {
    tracker: Arc<StatusTracker>,
    closed: Arc<AtomicBool>,
    poll: Duration,
}

impl TaskWaiter {
    /// `closed` is raised by the pool at teardown; `poll` bounds every park.
    pub fn new(tracker: Arc<StatusTracker>, closed: Arc<AtomicBool>, poll: Duration) -> Self {
        Self {
            tracker,
            closed,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    /// Reserve any Idle slot, waiting up to `timeout`.
    ///
    /// On success the slot is Busy and owned by the caller, who must hand
    /// it back with `StatusTracker::set_idle`.
    pub fn await_free_slot(&self, timeout: Duration) -> Result<usize, WaitError> {
        let start = Instant::now();
        let deadline = start.checked_add(timeout);

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(WaitError::Closed);
            }

            let available = self.tracker.available();
            if available > 0 {
                if let Some(slot) = self.try_reserve_any() {
                    return Ok(slot);
                }
            }

            let park = match self.remaining(deadline) {
                Some(park) => park,
                None => {
                    let waited = start.elapsed();
                    tracing::debug!(waited_ms = waited.as_millis() as u64, "no free worker slot");
                    return Err(WaitError::Timeout { waited });
                }
            };

            if available > 0 {
                // Lost the CAS race, or a release bumped the counter but has
                // not published Idle yet. Either resolves within a few
                // instructions.
                std::thread::yield_now();
            } else {
                self.tracker.wait_available(available, park);
            }
        }
    }

    /// Reserve one specific slot, waiting up to `timeout` for it to go Idle.
    ///
    /// Fails with `Closed` if the slot is shut down while waiting.
    pub fn await_slot(&self, slot: usize, timeout: Duration) -> Result<usize, WaitError> {
        let start = Instant::now();
        let deadline = start.checked_add(timeout);

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(WaitError::Closed);
            }

            let observed = self.tracker.get(slot);
            match observed {
                WorkerStatus::Idle => {
                    if self.tracker.try_set_busy(slot) {
                        return Ok(slot);
                    }
                    continue;
                }
                WorkerStatus::Shutdown => return Err(WaitError::Closed),
                WorkerStatus::Busy | WorkerStatus::Error => {}
            }

            match self.remaining(deadline) {
                Some(park) => {
                    self.tracker.wait_status(slot, observed, park);
                }
                None => return Err(WaitError::Timeout { waited: start.elapsed() }),
            }
        }
    }

    /// How long the next park may last, or `None` once `deadline` has
    /// passed. No deadline (a timeout past the end of `Instant`) parks for
    /// `poll` forever.
    fn remaining(&self, deadline: Option<Instant>) -> Option<Duration> {
        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                (now < deadline).then(|| (deadline - now).min(self.poll))
            }
            None => Some(self.poll),
        }
    }

    fn try_reserve_any(&self) -> Option<usize> {
        (0..self.tracker.slots())
            .find(|&slot| self.tracker.get(slot).is_available() && self.tracker.try_set_busy(slot))
    }
}
