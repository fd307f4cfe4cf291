// vim: tw=80
//! Common utility functions and unit constants used throughout dmz-core

use std::ops::{Add, Div, Sub};

/// The kernel always counts in 512-byte sectors, regardless of the device's
/// logical block size.
pub const SECTOR_SIZE: usize = 512;
pub const SECTOR_SHIFT: u32 = 9;

/// Metadata is always read and written in 4KB blocks.
pub const BLOCK_SIZE: usize = 4096;
pub const BLOCK_SHIFT: u32 = 12;

/// Number of sectors in one metadata block
pub const BLOCK_SECTORS: u64 = (BLOCK_SIZE / SECTOR_SIZE) as u64;
pub const BLOCK_SECTORS_SHIFT: u32 = BLOCK_SHIFT - SECTOR_SHIFT;
pub const BLOCK_SECTORS_MASK: u64 = BLOCK_SECTORS - 1;

/// Divide two unsigned numbers, rounding up.
pub fn div_roundup<T>(dividend: T, divisor: T) -> T
    where T: Add<Output=T> + Copy + Div<Output=T> + From<u8> + Sub<Output=T>
{
    (dividend + divisor - T::from(1u8)) / divisor
}

/// Convert a byte count into whole 512-byte sectors, discarding any partial
/// sector.
pub const fn bytes2sect(bytes: u64) -> u64 {
    bytes >> SECTOR_SHIFT
}

/// Round a sector count down to a whole number of metadata blocks.
pub const fn sect_align_down(sectors: u64) -> u64 {
    sectors & !BLOCK_SECTORS_MASK
}

/// Format a sector count as whole units of `2^shift` bytes, as used in the
/// device summaries.
pub(crate) const fn sect2units(sectors: u64, shift: u32) -> u64 {
    (sectors << SECTOR_SHIFT) >> shift
}

// LCOV_EXCL_STOP
