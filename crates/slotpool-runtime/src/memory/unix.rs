//! Unix backing region using an anonymous shared mmap

use super::whole_cells;
use slotpool_core::error::CapabilityError;

use nix::errno::Errno;
use std::ptr::NonNull;
use std::sync::atomic::AtomicI32;

/// Anonymous `MAP_SHARED` mapping. Zero-filled by the kernel, page aligned.
pub(super) struct Region {
    base: NonNull<AtomicI32>,
    len: usize,
}

// Safety: the region is only ever accessed through `AtomicI32` views and is
// unmapped exactly once, in Drop.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Map `len` bytes read/write
    pub(super) fn map(len: usize) -> Result<Self, CapabilityError> {
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if base == libc::MAP_FAILED {
            return Err(CapabilityError::MapFailed {
                bytes: len,
                errno: Errno::last() as i32,
            });
        }

        let base = NonNull::new(base as *mut AtomicI32).ok_or(CapabilityError::MapFailed {
            bytes: len,
            errno: 0,
        })?;

        Ok(Self { base, len })
    }

    /// First `count` cells of the region
    #[inline]
    pub(super) fn cells(&self, count: usize) -> &[AtomicI32] {
        assert!(count <= whole_cells(self.len), "cell view exceeds mapping");
        // Safety: the mapping is at least `count * 4` bytes, page aligned,
        // and lives as long as `self`.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), count) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len) };
        if ret != 0 {
            tracing::warn!(bytes = self.len, errno = Errno::last() as i32, "munmap of coordination buffer failed");
        }
    }
}
