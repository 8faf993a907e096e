//! Fallback wait/notify using std::sync::Condvar
//!
//! Used on platforms without futex. One condvar serves every cell of the
//! pool; a notify for any cell wakes waiters of all cells, which then
//! re-check their own value. Less efficient but portable.

use super::WaitNotify;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Condvar-based wait/notify (fallback)
pub struct CondvarWaitNotify {
    mutex: Mutex<()>,
    condvar: Condvar,
    parked: AtomicUsize,
}

impl CondvarWaitNotify {
    /// Create a new fallback instance
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }

    fn notify(&self) {
        if self.parked.load(Ordering::SeqCst) == 0 {
            return;
        }
        // Taking the mutex orders this notify after any in-progress
        // check-then-wait in `wait`.
        drop(self.mutex.lock().unwrap_or_else(|e| e.into_inner()));
        self.condvar.notify_all();
    }
}

impl Default for CondvarWaitNotify {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitNotify for CondvarWaitNotify {
    fn wait(&self, cell: &AtomicI32, expected: i32, timeout: Duration) -> bool {
        self.parked.fetch_add(1, Ordering::SeqCst);

        let guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        if cell.load(Ordering::SeqCst) != expected {
            self.parked.fetch_sub(1, Ordering::SeqCst);
            return true;
        }

        let woken = match self.condvar.wait_timeout(guard, timeout) {
            Ok((_guard, result)) => !result.timed_out(),
            Err(poisoned) => !poisoned.into_inner().1.timed_out(),
        };

        self.parked.fetch_sub(1, Ordering::SeqCst);
        woken
    }

    fn wake_one(&self, _cell: &AtomicI32) {
        // Waiters of unrelated cells share the condvar; waking only one
        // could pick the wrong thread.
        self.notify();
    }

    fn wake_all(&self, _cell: &AtomicI32) {
        self.notify();
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
