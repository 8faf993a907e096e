//! Pool identifier type

use core::fmt;

/// Identifier handed out by the registry for each created pool.
///
/// Ids are never reused within one registry, so a stale handle can always
/// be told apart from a live pool.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PoolId(u64);

impl PoolId {
    /// Create a new PoolId from a raw value
    #[inline]
    pub const fn new(id: u64) -> Self {
        PoolId(id)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for PoolId {
    #[inline]
    fn from(id: u64) -> Self {
        PoolId(id)
    }
}

impl From<PoolId> for u64 {
    #[inline]
    fn from(id: PoolId) -> Self {
        id.0
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", self.0)
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}", self.0)
    }
}
