//! Heap-backed region for platforms without mmap

use super::whole_cells;
use slotpool_core::error::CapabilityError;

use std::sync::atomic::AtomicI32;

/// Boxed cell array sized to the requested byte length
pub(super) struct Region {
    cells: Box<[AtomicI32]>,
}

impl Region {
    pub(super) fn map(len: usize) -> Result<Self, CapabilityError> {
        let cells = (0..whole_cells(len)).map(|_| AtomicI32::new(0)).collect();
        Ok(Self { cells })
    }

    #[inline]
    pub(super) fn cells(&self, count: usize) -> &[AtomicI32] {
        &self.cells[..count]
    }
}
