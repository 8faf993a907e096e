//! Linux futex-based wait/notify
//!
//! The futex word is the coordination cell itself, so a waiter sleeps only
//! while the cell still holds the value it last observed. The kernel does
//! that comparison atomically with queueing the waiter, which closes the
//! check-then-sleep window.
//!
//! `parked` lets notifiers skip the syscall on the hot path when nobody is
//! waiting. Both sides issue a SeqCst fence between touching the cell and
//! touching `parked`, so either the notifier sees the waiter or the waiter's
//! FUTEX_WAIT sees the new value.

use super::WaitNotify;
use nix::errno::Errno;
use std::sync::atomic::{fence, AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

/// Linux futex-based wait/notify
pub struct FutexWaitNotify {
    /// Threads currently inside `wait` through this instance
    parked: AtomicUsize,
}

impl FutexWaitNotify {
    /// Create a new futex wait/notify instance
    pub fn new() -> Self {
        Self {
            parked: AtomicUsize::new(0),
        }
    }

    fn wake(&self, cell: &AtomicI32, count: i32) {
        fence(Ordering::SeqCst);
        if self.parked.load(Ordering::Relaxed) == 0 {
            return; // No one to wake
        }

        unsafe {
            libc::syscall(
                libc::SYS_futex,
                cell.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexWaitNotify {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitNotify for FutexWaitNotify {
    fn wait(&self, cell: &AtomicI32, expected: i32, timeout: Duration) -> bool {
        self.parked.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::SeqCst);

        if cell.load(Ordering::Acquire) != expected {
            self.parked.fetch_sub(1, Ordering::Relaxed);
            return true;
        }

        let timespec = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };

        // FUTEX_WAIT: sleep if *cell == expected (relative timeout)
        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                cell.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                expected,
                &timespec as *const libc::timespec,
                std::ptr::null::<u32>(),
                0u32,
            )
        };

        self.parked.fetch_sub(1, Ordering::Relaxed);

        if result == 0 {
            return true;
        }
        match Errno::last() {
            // Value changed before we slept: the condition moved on
            Errno::EAGAIN => true,
            // ETIMEDOUT, EINTR and anything else count as "not woken"
            _ => false,
        }
    }

    fn wake_one(&self, cell: &AtomicI32) {
        self.wake(cell, 1);
    }

    fn wake_all(&self, cell: &AtomicI32) {
        self.wake(cell, i32::MAX);
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
