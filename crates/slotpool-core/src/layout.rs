//! Coordination buffer layout and capacity validation
//!
//! Layout for `N` workers, all cells little-endian `i32`:
//!
//! ```text
//! [0,      4N)          status[N]     - WorkerStatus per slot
//! [4N,     8N)          counter[N]    - tasks completed per slot
//! [8N,     8N+4(N+1))   metrics[N+1]  - [0] available workers,
//!                                       [1..=N] avg duration (ms) per slot
//! ```
//!
//! The region is rounded up to a 64-byte boundary. The allocator may add
//! up to 63 bytes of random padding on top; the validator only checks that
//! the worst case still fits under `MAX_BUFFER_BYTES`.

use crate::constants::{BUFFER_ALIGN, CELL_BYTES, MAX_BUFFER_BYTES, MAX_JITTER, MAX_WORKERS};
use crate::error::ConfigError;

/// Validate a requested pool size.
///
/// Returns the worker count as `u32`. Pure; the only inputs are the request
/// and the fixed limits.
pub fn validate(max_workers: i64) -> Result<u32, ConfigError> {
    BufferLayout::for_workers(max_workers).map(|layout| layout.workers)
}

/// Byte offsets and sizes of one coordination buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// Number of worker slots (N)
    pub workers: u32,
    /// Size of the three segments, unpadded
    pub raw_bytes: usize,
    /// `raw_bytes` rounded up to `BUFFER_ALIGN`
    pub aligned_bytes: usize,
}

impl BufferLayout {
    /// Compute and bound-check the layout for `max_workers` slots.
    pub fn for_workers(max_workers: i64) -> Result<Self, ConfigError> {
        if max_workers <= 0 || max_workers > i64::from(MAX_WORKERS) {
            return Err(ConfigError::OutOfRange {
                requested: max_workers,
                max: MAX_WORKERS,
            });
        }
        let n = usize::try_from(max_workers).map_err(|_| ConfigError::Overflow {
            workers: max_workers,
        })?;

        let overflow = || ConfigError::Overflow { workers: max_workers };

        let status = n.checked_mul(CELL_BYTES).ok_or_else(overflow)?;
        let counter = n.checked_mul(CELL_BYTES).ok_or_else(overflow)?;
        let metrics = n
            .checked_add(1)
            .and_then(|cells| cells.checked_mul(CELL_BYTES))
            .ok_or_else(overflow)?;
        let raw_bytes = status
            .checked_add(counter)
            .and_then(|s| s.checked_add(metrics))
            .ok_or_else(overflow)?;
        let aligned_bytes = align_up(raw_bytes, BUFFER_ALIGN).ok_or_else(overflow)?;

        let worst_case = aligned_bytes.checked_add(MAX_JITTER).ok_or_else(overflow)?;
        if worst_case > MAX_BUFFER_BYTES {
            return Err(overflow());
        }

        Ok(Self {
            workers: max_workers as u32,
            raw_bytes,
            aligned_bytes,
        })
    }

    /// Number of slots as usize
    #[inline]
    pub fn slots(&self) -> usize {
        self.workers as usize
    }

    /// Byte offset of `status[0]`
    #[inline]
    pub const fn status_offset(&self) -> usize {
        0
    }

    /// Byte offset of `counter[0]`
    #[inline]
    pub fn counter_offset(&self) -> usize {
        self.slots() * CELL_BYTES
    }

    /// Byte offset of `metrics[0]` (the available-worker cell)
    #[inline]
    pub fn metrics_offset(&self) -> usize {
        2 * self.slots() * CELL_BYTES
    }

    /// Total number of `i32` cells across all segments
    #[inline]
    pub fn cell_count(&self) -> usize {
        3 * self.slots() + 1
    }

    /// Allocation size once `jitter` bytes of padding are added.
    ///
    /// `jitter` is clamped to `MAX_JITTER`.
    #[inline]
    pub fn padded_bytes(&self, jitter: usize) -> usize {
        self.aligned_bytes + jitter.min(MAX_JITTER)
    }
}

#[inline]
fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}
