//! Wait/notify on a single atomic cell
//!
//! Threads block on a specific `AtomicI32` in the coordination buffer until
//! another thread changes it and calls `wake_one`/`wake_all` for that cell,
//! or until a timeout. Linux uses the futex syscall directly on the cell;
//! other platforms fall back to a condvar shared by all cells of one pool.

use std::sync::atomic::AtomicI32;
use std::sync::Arc;
use std::time::Duration;

/// Address-based wait/notify
///
/// Wakeups may be spurious and may be lost if nobody is parked at the time
/// of the notify. Callers always re-check their condition after `wait`
/// returns and always pass a bounded timeout.
pub trait WaitNotify: Send + Sync {
    /// Block while `cell == expected`, for at most `timeout`.
    ///
    /// Returns:
    /// - `true` if woken by a notify or the value already differed
    /// - `false` on timeout, interruption or spurious return
    fn wait(&self, cell: &AtomicI32, expected: i32, timeout: Duration) -> bool;

    /// Wake at most one thread parked on `cell`
    fn wake_one(&self, cell: &AtomicI32);

    /// Wake every thread parked on `cell`
    fn wake_all(&self, cell: &AtomicI32);

    /// Number of threads currently parked through this instance (hint)
    fn parked_count(&self) -> usize;
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexWaitNotify as PlatformWaitNotify;
    } else {
        mod fallback;
        pub use fallback::CondvarWaitNotify as PlatformWaitNotify;
    }
}

/// Create a new platform-appropriate wait/notify instance
pub fn new_wait_notify() -> Arc<dyn WaitNotify> {
    Arc::new(PlatformWaitNotify::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout() {
        let notify = new_wait_notify();
        let cell = AtomicI32::new(0);
        let start = Instant::now();
        let woken = notify.wait(&cell, 0, Duration::from_millis(50));
        let elapsed = start.elapsed();

        assert!(!woken || elapsed < Duration::from_millis(100));
        assert!(elapsed >= Duration::from_millis(40)); // Allow some slack
        assert_eq!(notify.parked_count(), 0);
    }

    #[test]
    fn test_wait_value_mismatch_returns_immediately() {
        let notify = new_wait_notify();
        let cell = AtomicI32::new(5);
        let start = Instant::now();
        notify.wait(&cell, 0, Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wake_one() {
        let notify = new_wait_notify();
        let cell = Arc::new(AtomicI32::new(0));

        let handle = {
            let notify = Arc::clone(&notify);
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                let start = Instant::now();
                while cell.load(Ordering::Acquire) == 0 {
                    notify.wait(&cell, 0, Duration::from_secs(10));
                }
                start.elapsed()
            })
        };

        // Give thread time to park
        thread::sleep(Duration::from_millis(50));

        cell.store(1, Ordering::SeqCst);
        notify.wake_one(&cell);

        let elapsed = handle.join().unwrap();
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_wake_all() {
        let notify = new_wait_notify();
        let cell = Arc::new(AtomicI32::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let notify = Arc::clone(&notify);
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    while cell.load(Ordering::Acquire) == 0 {
                        notify.wait(&cell, 0, Duration::from_secs(10));
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        cell.store(1, Ordering::SeqCst);
        notify.wake_all(&cell);

        for h in handles {
            h.join().unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
