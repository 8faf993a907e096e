//! Worker slot status and pool lifecycle types

use core::fmt;

/// Status of a worker slot, stored as an `i32` in the status segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WorkerStatus {
    /// Free to take a task. Counted by the available-worker cell.
    Idle = 0,

    /// Reserved by a caller, task running or about to run
    Busy = 1,

    /// Task on this slot failed or panicked; waiting to be reset
    Error = 2,

    /// Pool is being torn down; never counted as available
    Shutdown = 3,
}

impl WorkerStatus {
    /// Raw cell value
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decode a raw cell value. Returns `None` for values outside the enum.
    #[inline]
    pub const fn from_i32(v: i32) -> Option<WorkerStatus> {
        match v {
            0 => Some(WorkerStatus::Idle),
            1 => Some(WorkerStatus::Busy),
            2 => Some(WorkerStatus::Error),
            3 => Some(WorkerStatus::Shutdown),
            _ => None,
        }
    }

    /// Check if this slot can be handed to a new task
    #[inline]
    pub const fn is_available(&self) -> bool {
        matches!(self, WorkerStatus::Idle)
    }

    /// Check if `set_idle` may move this slot back to Idle
    #[inline]
    pub const fn is_releasable(&self) -> bool {
        matches!(self, WorkerStatus::Busy | WorkerStatus::Error)
    }
}

impl From<WorkerStatus> for i32 {
    fn from(status: WorkerStatus) -> i32 {
        status as i32
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "idle"),
            WorkerStatus::Busy => write!(f, "busy"),
            WorkerStatus::Error => write!(f, "error"),
            WorkerStatus::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Lifecycle of a pool
///
/// `Uninitialized -> Ready -> ShuttingDown -> Destroyed`. Running tasks are
/// a property of individual slots, not a separate pool state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Uninitialized = 0,
    Ready = 1,
    ShuttingDown = 2,
    Destroyed = 3,
}

impl PoolState {
    /// Check if the pool still accepts submissions
    #[inline]
    pub const fn accepts_tasks(&self) -> bool {
        matches!(self, PoolState::Ready)
    }
}

impl From<u8> for PoolState {
    fn from(v: u8) -> Self {
        match v {
            1 => PoolState::Ready,
            2 => PoolState::ShuttingDown,
            3 => PoolState::Destroyed,
            _ => PoolState::Uninitialized,
        }
    }
}

impl From<PoolState> for u8 {
    fn from(state: PoolState) -> u8 {
        state as u8
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Uninitialized => write!(f, "UNINITIALIZED"),
            PoolState::Ready => write!(f, "READY"),
            PoolState::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            PoolState::Destroyed => write!(f, "DESTROYED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            WorkerStatus::Idle,
            WorkerStatus::Busy,
            WorkerStatus::Error,
            WorkerStatus::Shutdown,
        ] {
            assert_eq!(WorkerStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(WorkerStatus::from_i32(7), None);
        assert_eq!(WorkerStatus::from_i32(-1), None);
    }

    #[test]
    fn test_status_predicates() {
        assert!(WorkerStatus::Idle.is_available());
        assert!(!WorkerStatus::Busy.is_available());
        assert!(!WorkerStatus::Shutdown.is_available());

        assert!(WorkerStatus::Busy.is_releasable());
        assert!(WorkerStatus::Error.is_releasable());
        assert!(!WorkerStatus::Idle.is_releasable());
        assert!(!WorkerStatus::Shutdown.is_releasable());
    }

    #[test]
    fn test_idle_is_zero() {
        // A zeroed buffer must read as all-Idle.
        assert_eq!(WorkerStatus::Idle.as_i32(), 0);
    }

    #[test]
    fn test_pool_state() {
        assert!(PoolState::Ready.accepts_tasks());
        assert!(!PoolState::ShuttingDown.accepts_tasks());
        assert_eq!(PoolState::from(3u8), PoolState::Destroyed);
        assert_eq!(PoolState::from(200u8), PoolState::Uninitialized);
        assert_eq!(format!("{}", PoolState::ShuttingDown), "SHUTTING_DOWN");
    }
}
