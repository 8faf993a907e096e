//! Coordination buffer: one fixed-layout shared region per pool
//!
//! The region is viewed as a flat array of `AtomicI32` cells split into the
//! status, counter and metrics segments described in
//! `slotpool_core::layout`. Views are crate-private; everything outside
//! the runtime goes through `StatusTracker` and `MetricsAggregator`.
//!
//! Platform-specific implementations provide the backing `Region`.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix::Region;
    } else {
        mod fallback;
        use fallback::Region;
    }
}

use slotpool_core::constants::{CELL_BYTES, MAX_JITTER};
use slotpool_core::error::CapabilityError;
use slotpool_core::layout::BufferLayout;
use slotpool_core::status::WorkerStatus;

use rand::RngExt;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Check that the primitives the coordinator relies on exist.
///
/// In Rust this is a compile-time property of the target; it is kept as an
/// initialization-time check so callers get a `CapabilityError` rather than
/// a build failure on exotic targets.
pub fn probe_capabilities() -> Result<(), CapabilityError> {
    if cfg!(target_has_atomic = "32") {
        Ok(())
    } else {
        Err(CapabilityError::AtomicsUnavailable)
    }
}

/// Shared coordination region for one pool
pub struct CoordinationBuffer {
    region: Region,
    layout: BufferLayout,
    allocated_bytes: usize,
    released: AtomicBool,
}

impl CoordinationBuffer {
    /// Map and initialize a buffer for `layout`.
    ///
    /// With `jitter` set, 0..=63 random bytes are added to the mapping size.
    /// Offsets do not move; only the allocation length changes.
    pub fn allocate(layout: BufferLayout, jitter: bool) -> Result<Self, CapabilityError> {
        probe_capabilities()?;

        let padding = if jitter {
            let mut rng = rand::rng();
            rng.random_range(0..=MAX_JITTER)
        } else {
            0
        };
        let allocated_bytes = layout.padded_bytes(padding);
        let region = Region::map(allocated_bytes)?;

        let buffer = Self {
            region,
            layout,
            allocated_bytes,
            released: AtomicBool::new(false),
        };
        buffer.initialize();
        Ok(buffer)
    }

    fn initialize(&self) {
        for cell in self.status() {
            cell.store(WorkerStatus::Idle.as_i32(), Ordering::Relaxed);
        }
        for cell in self.counters() {
            cell.store(0, Ordering::Relaxed);
        }
        let metrics = self.metrics();
        metrics[0].store(self.layout.workers as i32, Ordering::Relaxed);
        for cell in &metrics[1..] {
            cell.store(0, Ordering::Relaxed);
        }
        std::sync::atomic::fence(Ordering::Release);
    }

    /// Layout this buffer was built for
    #[inline]
    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Number of worker slots
    #[inline]
    pub fn slots(&self) -> usize {
        self.layout.slots()
    }

    /// Size of the mapping, padding included
    #[inline]
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Check if `release` has run
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Zero every cell and mark the buffer released. Idempotent.
    ///
    /// The mapping itself is unmapped when the last owner drops the buffer;
    /// a detached worker thread may still hold a reference.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        for cell in self.cells() {
            cell.store(0, Ordering::Release);
        }
    }

    /// Little-endian image of the layout, padded to the 64-byte boundary.
    ///
    /// Each cell is loaded individually, so the image is not a consistent
    /// snapshot under concurrent mutation.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.layout.aligned_bytes);
        for cell in self.cells() {
            out.extend_from_slice(&cell.load(Ordering::Acquire).to_le_bytes());
        }
        out.resize(self.layout.aligned_bytes, 0);
        out
    }

    #[inline]
    fn cells(&self) -> &[AtomicI32] {
        self.region.cells(self.layout.cell_count())
    }

    /// `status[0..N]`
    #[inline]
    pub(crate) fn status(&self) -> &[AtomicI32] {
        let n = self.slots();
        &self.cells()[..n]
    }

    /// `counter[0..N]`
    #[inline]
    pub(crate) fn counters(&self) -> &[AtomicI32] {
        let n = self.slots();
        &self.cells()[n..2 * n]
    }

    /// `metrics[0..=N]`
    #[inline]
    pub(crate) fn metrics(&self) -> &[AtomicI32] {
        let n = self.slots();
        &self.cells()[2 * n..3 * n + 1]
    }

    /// `metrics[0]`, the available-worker count
    #[inline]
    pub(crate) fn available_cell(&self) -> &AtomicI32 {
        &self.metrics()[0]
    }
}

impl std::fmt::Debug for CoordinationBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationBuffer")
            .field("workers", &self.layout.workers)
            .field("allocated_bytes", &self.allocated_bytes)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Number of whole cells that fit in `bytes`
#[inline]
fn whole_cells(bytes: usize) -> usize {
    bytes / CELL_BYTES
}
