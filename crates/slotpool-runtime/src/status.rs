//! Slot status transitions and the available-worker counter
//!
//! `StatusTracker` is the only writer of the status and counter segments and
//! of `metrics[0]`. The available count moves only with the two transitions
//! that change availability:
//!
//! ```text
//! Idle  -> Busy    try_set_busy   CAS, then decrement
//! Busy  -> Idle    set_idle       increment, then publish Idle, then wake
//! Error -> Idle    set_idle       (same; Busy -> Error left the count alone)
//! Busy  -> Error   set_error      count untouched
//! any   -> Shutdown set_shutdown  count untouched
//! ```
//!
//! Per slot the decrement and increment strictly alternate, starting with a
//! decrement, so the counter never leaves `[0, N]`. Incrementing before
//! publishing Idle means the counter can briefly run ahead of the number of
//! Idle slots (never past N); the waiter's scan loop absorbs that.

use crate::memory::CoordinationBuffer;
use crate::parking::WaitNotify;

use slotpool_core::status::WorkerStatus;

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Atomic status operations over one coordination buffer
pub struct StatusTracker {
    buffer: Arc<CoordinationBuffer>,
    notify: Arc<dyn WaitNotify>,
}

impl StatusTracker {
    pub fn new(buffer: Arc<CoordinationBuffer>, notify: Arc<dyn WaitNotify>) -> Self {
        Self { buffer, notify }
    }

    /// Number of worker slots
    #[inline]
    pub fn slots(&self) -> usize {
        self.buffer.slots()
    }

    #[inline]
    fn cell(&self, slot: usize) -> &AtomicI32 {
        &self.buffer.status()[slot]
    }

    /// Current status of `slot`. Never blocks.
    ///
    /// A value outside the enum (not producible through this API) reads as
    /// `Error` so it is never handed out.
    #[inline]
    pub fn get(&self, slot: usize) -> WorkerStatus {
        WorkerStatus::from_i32(self.cell(slot).load(Ordering::Acquire)).unwrap_or(WorkerStatus::Error)
    }

    /// Reserve `slot` if it is Idle.
    ///
    /// Returns `false` with no side effect when the slot was not Idle.
    #[inline]
    pub fn try_set_busy(&self, slot: usize) -> bool {
        let won = self
            .cell(slot)
            .compare_exchange(
                WorkerStatus::Idle.as_i32(),
                WorkerStatus::Busy.as_i32(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            self.buffer.available_cell().fetch_sub(1, Ordering::AcqRel);
        }
        won
    }

    /// Return a Busy or Error slot to Idle and wake waiters.
    ///
    /// Returns `false` without touching the counter if the slot was in any
    /// other state (Idle already, or Shutdown during teardown).
    pub fn set_idle(&self, slot: usize) -> bool {
        let cell = self.cell(slot);
        let current = cell.load(Ordering::Acquire);
        if !WorkerStatus::from_i32(current).is_some_and(|s| s.is_releasable()) {
            return false;
        }

        let available = self.buffer.available_cell();
        available.fetch_add(1, Ordering::AcqRel);

        if cell
            .compare_exchange(
                current,
                WorkerStatus::Idle.as_i32(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            // Lost to set_shutdown; the slot is no longer ours to release.
            available.fetch_sub(1, Ordering::AcqRel);
            return false;
        }

        self.notify.wake_all(available);
        self.notify.wake_all(cell);
        true
    }

    /// Mark a Busy slot as failed. The available count is untouched.
    pub fn set_error(&self, slot: usize) -> bool {
        self.cell(slot)
            .compare_exchange(
                WorkerStatus::Busy.as_i32(),
                WorkerStatus::Error.as_i32(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Force `slot` to Shutdown from any state and wake anyone waiting on it.
    ///
    /// Returns the previous status.
    pub fn set_shutdown(&self, slot: usize) -> WorkerStatus {
        let cell = self.cell(slot);
        let previous = cell.swap(WorkerStatus::Shutdown.as_i32(), Ordering::AcqRel);
        self.notify.wake_all(cell);
        WorkerStatus::from_i32(previous).unwrap_or(WorkerStatus::Error)
    }

    /// Count one finished task on `slot`
    #[inline]
    pub fn mark_completed(&self, slot: usize) {
        self.buffer.counters()[slot].fetch_add(1, Ordering::AcqRel);
    }

    /// Tasks finished on `slot` since the pool was created
    #[inline]
    pub fn tasks_completed(&self, slot: usize) -> u32 {
        self.buffer.counters()[slot].load(Ordering::Acquire) as u32
    }

    /// Current available-worker count
    #[inline]
    pub fn available(&self) -> u32 {
        self.buffer.available_cell().load(Ordering::Acquire).max(0) as u32
    }

    /// Park until the available count moves away from `observed`, a notify
    /// arrives, or `timeout` passes.
    pub fn wait_available(&self, observed: u32, timeout: Duration) -> bool {
        self.notify.wait(self.buffer.available_cell(), observed as i32, timeout)
    }

    /// Park until `slot` leaves `observed`, a notify arrives, or `timeout`
    /// passes.
    pub fn wait_status(&self, slot: usize, observed: WorkerStatus, timeout: Duration) -> bool {
        self.notify.wait(self.cell(slot), observed.as_i32(), timeout)
    }

    /// Wake every thread parked on the available count
    pub fn wake_all_waiters(&self) {
        self.notify.wake_all(self.buffer.available_cell());
    }

    /// Number of slots currently Idle (a scan, not the counter)
    pub fn idle_count(&self) -> u32 {
        (0..self.slots())
            .filter(|&slot| self.get(slot) == WorkerStatus::Idle)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parking::new_wait_notify;
    use proptest::prelude::*;
    use slotpool_core::layout::BufferLayout;
    use std::thread;

    fn tracker(n: i64) -> StatusTracker {
        let layout = BufferLayout::for_workers(n).unwrap();
        let buffer = Arc::new(CoordinationBuffer::allocate(layout, false).unwrap());
        StatusTracker::new(buffer, new_wait_notify())
    }

    #[test]
    fn test_busy_idle_cycle() {
        let t = tracker(2);
        assert_eq!(t.available(), 2);

        assert!(t.try_set_busy(0));
        assert_eq!(t.get(0), WorkerStatus::Busy);
        assert_eq!(t.available(), 1);

        // Second reservation of the same slot fails with no side effect
        assert!(!t.try_set_busy(0));
        assert_eq!(t.available(), 1);

        assert!(t.set_idle(0));
        assert_eq!(t.get(0), WorkerStatus::Idle);
        assert_eq!(t.available(), 2);

        // Idle -> Idle is not a release
        assert!(!t.set_idle(0));
        assert_eq!(t.available(), 2);
    }

    #[test]
    fn test_error_path_keeps_count_paired() {
        let t = tracker(1);
        assert!(t.try_set_busy(0));
        assert!(t.set_error(0));
        assert_eq!(t.get(0), WorkerStatus::Error);
        assert_eq!(t.available(), 0);

        // Error is not Idle, cannot be reserved
        assert!(!t.try_set_busy(0));

        assert!(t.set_idle(0));
        assert_eq!(t.available(), 1);
        assert!(!t.set_error(0));
    }

    #[test]
    fn test_shutdown_does_not_touch_count() {
        let t = tracker(3);
        assert!(t.try_set_busy(1));
        assert_eq!(t.available(), 2);

        assert_eq!(t.set_shutdown(0), WorkerStatus::Idle);
        assert_eq!(t.set_shutdown(1), WorkerStatus::Busy);
        assert_eq!(t.set_shutdown(1), WorkerStatus::Shutdown);
        assert_eq!(t.available(), 2);

        // A late release of a shut-down slot is refused
        assert!(!t.set_idle(1));
        assert_eq!(t.available(), 2);
        assert!(!t.try_set_busy(0));
        assert_eq!(t.get(0), WorkerStatus::Shutdown);
    }

    #[test]
    fn test_completion_counter() {
        let t = tracker(2);
        t.mark_completed(1);
        t.mark_completed(1);
        assert_eq!(t.tasks_completed(0), 0);
        assert_eq!(t.tasks_completed(1), 2);
    }

    #[test]
    fn test_concurrent_reservations_are_exclusive() {
        let t = Arc::new(tracker(16));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&t);
                thread::spawn(move || (0..16).filter(|&s| t.try_set_busy(s)).collect::<Vec<_>>())
            })
            .collect();

        let mut won: Vec<usize> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        won.sort();
        assert_eq!(won, (0..16).collect::<Vec<_>>());
        assert_eq!(t.available(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_available_stays_in_bounds(
            n in 1i64..=16,
            plans in prop::collection::vec(prop::collection::vec(0usize..16, 1..64), 1..6),
        ) {
            let t = Arc::new(tracker(n));
            let slots = n as usize;

            let handles: Vec<_> = plans
                .into_iter()
                .map(|plan| {
                    let t = Arc::clone(&t);
                    thread::spawn(move || {
                        let mut violations = 0u32;
                        for pick in plan {
                            let slot = pick % slots;
                            if t.try_set_busy(slot) {
                                if t.available() > slots as u32 {
                                    violations += 1;
                                }
                                t.set_idle(slot);
                            }
                            let raw = t.buffer.available_cell().load(Ordering::Acquire);
                            if raw < 0 || raw > slots as i32 {
                                violations += 1;
                            }
                        }
                        violations
                    })
                })
                .collect();

            let violations: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
            prop_assert_eq!(violations, 0);
            // Quiescent: the counter equals the number of Idle slots
            prop_assert_eq!(t.available(), t.idle_count());
            prop_assert_eq!(t.available(), slots as u32);
        }
    }
}
