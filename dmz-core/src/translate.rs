// vim: tw=80
//! Composite address to (backend, local address) translation

use std::ops::Sub;

use crate::{backend::BackendDevice, types::*};

/// A composite-space address of some granularity.
pub trait Address: Copy + Ord + Sub<Output = u64> {
    /// The same granularity, in one backend's address space
    type Local;

    /// The first address supplied by `bd`
    fn base(bd: &BackendDevice) -> Self;

    /// Number of addresses supplied by `bd`
    fn span(bd: &BackendDevice) -> u64;

    fn localize(self, base: Self) -> Self::Local;
}

impl Address for CompositeBlock {
    type Local = LocalBlock;

    fn base(bd: &BackendDevice) -> Self {
        bd.block_offset()
    }

    fn span(bd: &BackendDevice) -> u64 {
        bd.nr_blocks()
    }

    fn localize(self, base: Self) -> LocalBlock {
        CompositeBlock::localize(self, base)
    }
}

impl Address for CompositeSector {
    type Local = LocalSector;

    fn base(bd: &BackendDevice) -> Self {
        bd.sector_offset()
    }

    fn span(bd: &BackendDevice) -> u64 {
        bd.capacity()
    }

    fn localize(self, base: Self) -> LocalSector {
        CompositeSector::localize(self, base)
    }
}

/// Find the backend holding `addr`, and the address within that backend.
///
/// `backends` must be sorted by offset.  Returns `None` for addresses at or
/// beyond the end of the last backend.
pub fn locate<A: Address>(backends: &[BackendDevice], addr: A)
    -> Option<(usize, A::Local)>
{
    backends.iter()
        .enumerate()
        .rev()
        .find(|(_, bd)| A::base(bd) <= addr)
        .filter(|(_, bd)| addr - A::base(bd) < A::span(bd))
        .map(|(i, bd)| (i, addr.localize(A::base(bd))))
}

// LCOV_EXCL_STOP
