//! Typed errors for the allocator's internal `Result`-returning paths.
//!
//! The public allocate/reallocate API still returns a bare null pointer on
//! failure, matching the spec's C ancestry, but everything underneath
//! propagates one of these with `?` and converts to null only at the
//! boundary — see `engine.rs`.

use crate::region::RegionError;

/// Failure to bring up a fresh allocator over a region.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to reserve the free-list index zone: {0}")]
    IndexZoneReservationFailed(#[from] RegionError),
}

/// Failure of an internal growth step during `allocate` or `reallocate`.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error("heap region exhausted: {0}")]
    OutOfMemory(#[from] RegionError),
}
