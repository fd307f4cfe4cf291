// vim: tw=80
//! Common type definitions used throughout dmz-core

use std::{
    fmt::{self, Display, Formatter},
    io,
    ops::{Add, Sub},
    path::PathBuf,
};

use thiserror::Error;

use crate::{
    signature::Signature,
    util::{BLOCK_SECTORS, BLOCK_SECTORS_SHIFT, BLOCK_SHIFT},
};

/// Indexes a zone within the composite device.
pub type ZoneT = u32;

/// Problems locating, identifying or opening a backend device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Get {} stat failed: {source}", path.display())]
    Stat {
        path: PathBuf,
        source: nix::Error
    },
    #[error("{} is not a block device", path.display())]
    NotABlockDevice {
        path: PathBuf
    },
    #[error("Open {} failed: {source}", path.display())]
    Open {
        path: PathBuf,
        source: io::Error
    },
    #[error("{device}: read {} failed: {source}", attr.display())]
    Attribute {
        device: String,
        attr: PathBuf,
        source: io::Error
    },
    #[error("{device}: invalid {} format", attr.display())]
    AttributeFormat {
        device: String,
        attr: PathBuf
    },
    #[error("{device}: get capacity failed: {source}")]
    Capacity {
        device: String,
        source: io::Error
    },
}

/// Device geometry that cannot be represented as a composite zoned device.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("{device}: invalid zone size ({zone_sectors} sectors)")]
    InvalidZoneSize {
        device: String,
        zone_sectors: u64
    },
    #[error("{device}: invalid number of zones")]
    ZeroZoneCount {
        device: String
    },
    #[error("{device}: zone size mismatch ({expected}/{found} sectors)")]
    ZoneSizeMismatch {
        device: String,
        expected: u64,
        found: u64
    },
    #[error("a zone size is required when no device is zoned")]
    MissingZoneSize,
    #[error("no devices specified")]
    NoBackends,
}

/// A destructive operation was refused.
#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("{} is mounted on {}", path.display(), mount_point.display())]
    Mounted {
        path: PathBuf,
        mount_point: PathBuf
    },
    #[error("{} is in use by {holder}", path.display())]
    Busy {
        path: PathBuf,
        holder: String
    },
    #[error("{} appears to contain {kind}.  Use the force option to overwrite",
            path.display())]
    ExistingContent {
        path: PathBuf,
        kind: Signature
    },
    #[error("{}: probe failed, cannot detect existing content: {source}",
            path.display())]
    ProbeFailed {
        path: PathBuf,
        source: io::Error
    },
}

/// The devices' zone reports cannot be assembled into a valid zone table.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("{device}: get zone information at sector {sector} failed: {source}")]
    ReportFailed {
        device: String,
        sector: LocalSector,
        source: io::Error
    },
    #[error("{device}: malformed zone report at sector {sector}: {detail}")]
    MalformedReport {
        device: String,
        sector: LocalSector,
        detail: String
    },
    #[error("{device}: invalid zone {zone} size ({len} sectors, expected {expected})")]
    ZoneSizeMismatch {
        device: String,
        zone: ZoneT,
        len: u64,
        expected: u64
    },
    #[error("{device}: unsupported device with zone capacity smaller than \
             zone size (zone {zone}: capacity {capacity}, size {len})")]
    ShrunkCapacity {
        device: String,
        zone: ZoneT,
        capacity: u64,
        len: u64
    },
    #[error("{device}: invalid zone {zone} start {start}")]
    TooManyZones {
        device: String,
        zone: ZoneT,
        start: LocalSector
    },
    #[error("invalid number of zones (expected {expected}, got {found})")]
    ZoneCountMismatch {
        expected: u64,
        found: u64
    },
    #[error("invalid zones (last sector reported is {last}, expected {expected})")]
    CoverageMismatch {
        last: CompositeSector,
        expected: CompositeSector
    },
    #[error("zone table not loaded ({loaded} of {nr_zones} zones)")]
    NotLoaded {
        loaded: u64,
        nr_zones: u64
    },
}

/// Block I/O on the composite device failed.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("{device}: read block {block} failed: {source}")]
    Read {
        device: String,
        block: LocalBlock,
        source: io::Error
    },
    #[error("{device}: short read of block {block} ({len} bytes)")]
    ShortRead {
        device: String,
        block: LocalBlock,
        len: usize
    },
    #[error("{device}: write block {block} failed: {source}")]
    Write {
        device: String,
        block: LocalBlock,
        source: io::Error
    },
    #[error("{device}: short write of block {block} ({len} bytes)")]
    ShortWrite {
        device: String,
        block: LocalBlock,
        len: usize
    },
    #[error("{device}: fsync failed: {source}")]
    Flush {
        device: String,
        source: io::Error
    },
    #[error("{device}: reset zone {zone} failed: {source}")]
    Reset {
        device: String,
        zone: ZoneT,
        source: io::Error
    },
    #[error("block {block} is beyond the end of the device ({nr_blocks} blocks)")]
    OutOfRange {
        block: CompositeBlock,
        nr_blocks: u64
    },
    #[error("invalid zone {zone}")]
    NoSuchZone {
        zone: ZoneT
    },
    #[error("buffer of {len} bytes is not one metadata block")]
    BufferSize {
        len: usize
    },
    #[error("{device}: device is closed")]
    Closed {
        device: String
    },
}

/// dmz-core's error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Safety(#[from] SafetyError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Io(#[from] IoError),
}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Define a sector or block quantity that lives in exactly one address space.
///
/// Same-typed quantities may be subtracted to yield a plain distance, and a
/// plain distance may be added to a quantity.  Moving between address spaces
/// is only possible through the explicit `rebase`/`localize` methods.
macro_rules! address_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq,
                 PartialOrd)]
        pub struct $name(pub u64);

        impl Add<u64> for $name {
            type Output = Self;

            fn add(self, rhs: u64) -> Self::Output {
                $name(self.0 + rhs)
            }
        }

        impl Sub for $name {
            type Output = u64;

            fn sub(self, rhs: Self) -> Self::Output {
                self.0 - rhs.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$name> for u64 {
            fn from(a: $name) -> Self {
                a.0
            }
        }
    }
}

address_type! {
    /// A 512-byte sector number relative to the start of one backend device
    LocalSector
}

address_type! {
    /// A 512-byte sector number in the composite device's address space
    CompositeSector
}

address_type! {
    /// A 4KB metadata block number relative to the start of one backend
    LocalBlock
}

address_type! {
    /// A 4KB metadata block number in the composite device's address space
    CompositeBlock
}

impl LocalSector {
    /// Move this sector into composite space, given the composite sector at
    /// which its backend begins.
    pub fn rebase(self, base: CompositeSector) -> CompositeSector {
        CompositeSector(base.0 + self.0)
    }
}

impl CompositeSector {
    /// Move this sector into the address space of the backend that begins at
    /// `base`.
    pub fn localize(self, base: CompositeSector) -> LocalSector {
        LocalSector(self - base)
    }

    /// The block containing this sector
    pub fn to_block(self) -> CompositeBlock {
        CompositeBlock(self.0 >> BLOCK_SECTORS_SHIFT)
    }
}

impl LocalBlock {
    /// Byte offset of this block within its backend
    pub fn byte_offset(self) -> u64 {
        self.0 << BLOCK_SHIFT
    }

    pub fn to_sector(self) -> LocalSector {
        LocalSector(self.0 * BLOCK_SECTORS)
    }
}

impl CompositeBlock {
    pub fn localize(self, base: CompositeBlock) -> LocalBlock {
        LocalBlock(self - base)
    }

    pub fn to_sector(self) -> CompositeSector {
        CompositeSector(self.0 * BLOCK_SECTORS)
    }
}

// LCOV_EXCL_STOP
