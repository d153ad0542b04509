//! The `HeapRegion` contract: the abstract, externally-owned, monotonically
//! growable byte range this allocator manages.
//!
//! Acquiring and growing this range — `sbrk`, `mmap`, a page-frame allocator,
//! a `Vec`-backed stand-in for tests — is explicitly out of scope for this
//! crate. `segheap` only ever asks for more bytes; it never gives any back.

/// A contiguous, monotonically growable byte range.
///
/// Implementors own the memory. `segheap` never reads or writes outside
/// `[low(), high()]` and never asks a region to shrink.
pub trait HeapRegion {
    /// Fixed low bound of the region, stable for the region's lifetime.
    fn low(&self) -> usize;

    /// Current high bound: the address of the last valid byte.
    ///
    /// Before the first successful [`extend`](HeapRegion::extend) this may
    /// sit one byte below [`low`](HeapRegion::low), i.e. the region may
    /// start out empty.
    fn high(&self) -> usize;

    /// Grows the region by `bytes`, returning the base address of the new
    /// range (`high() + 1` as it stood before the call).
    ///
    /// Implementations must return a range that is contiguous with the
    /// previous `high()` and 8-byte aligned at its base.
    fn extend(&mut self, bytes: usize) -> Result<usize, RegionError>;
}

/// The sole failure mode a `HeapRegion` can report back to `segheap`.
#[derive(Debug, thiserror::Error)]
#[error("heap region could not be extended by {requested} bytes")]
pub struct RegionError {
    pub requested: usize,
}
