// vim: tw=80
//! Zone descriptors in the composite device's address space

use std::fmt;

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

use crate::types::{CompositeSector, ZoneT};

/// Zone types, with the kernel's `BLK_ZONE_TYPE_*` codes.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, IntoPrimitive, PartialEq)]
#[repr(u8)]
pub enum ZoneType {
    /// Emulated zones of a regular device, or a code this tool doesn't know.
    #[num_enum(default)]
    Unknown = 0,
    Conventional = 1,
    SequentialRequired = 2,
    SequentialPreferred = 3,
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Unknown => "Unknown-type",
            Self::Conventional => "Conventional",
            Self::SequentialRequired => "Sequential-write-required",
            Self::SequentialPreferred => "Sequential-write-preferred",
        }.fmt(f)
    }
}

/// Zone conditions, with the kernel's `BLK_ZONE_COND_*` codes.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum ZoneCond {
    NotWritePointer = 0x0,
    Empty = 0x1,
    ImplicitOpen = 0x2,
    ExplicitOpen = 0x3,
    Closed = 0x4,
    ReadOnly = 0xd,
    Full = 0xe,
    Offline = 0xf,
}

impl fmt::Display for ZoneCond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NotWritePointer => "Not-write-pointer",
            Self::Empty => "Empty",
            Self::ImplicitOpen => "Implicit-open",
            Self::ExplicitOpen => "Explicit-open",
            Self::Closed => "Closed",
            Self::ReadOnly => "Read-only",
            Self::Full => "Full",
            Self::Offline => "Offline",
        }.fmt(f)
    }
}

/// A snapshot of one zone of the composite device.
///
/// Zones are not updated when somebody else writes to the device.  Only this
/// crate's own zone resets keep them current.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Zone {
    /// Index of this zone among all of the composite's zones
    pub id: ZoneT,
    /// Index of the backend device holding this zone
    pub backend: usize,
    pub start: CompositeSector,
    /// Length in sectors
    pub len: u64,
    /// Writable sectors.  Never more than `len`.
    pub capacity: u64,
    /// The write pointer, for sequential zones only
    pub wp: Option<CompositeSector>,
    pub zone_type: ZoneType,
    pub cond: ZoneCond,
    pub need_reset: bool,
    pub non_seq: bool,
}

impl Zone {
    /// First sector after the end of the zone
    pub fn end(&self) -> CompositeSector {
        self.start + self.len
    }

    pub fn is_conventional(&self) -> bool {
        self.zone_type == ZoneType::Conventional
    }

    pub fn is_empty(&self) -> bool {
        self.cond == ZoneCond::Empty
    }

    /// Does this zone have a write pointer that can be reset?
    pub fn is_sequential(&self) -> bool {
        matches!(self.zone_type,
            ZoneType::SequentialRequired | ZoneType::SequentialPreferred)
    }

    /// Can this zone be written at random offsets?
    pub fn is_random(&self) -> bool {
        matches!(self.zone_type,
            ZoneType::Conventional | ZoneType::SequentialPreferred)
    }

    /// Is this an emulated zone of a regular device?
    pub fn is_unknown(&self) -> bool {
        self.zone_type == ZoneType::Unknown
    }

    /// Is the zone unusable for new data?
    pub fn is_unusable(&self) -> bool {
        matches!(self.cond, ZoneCond::ReadOnly | ZoneCond::Offline)
    }

    /// Reset the in-memory write pointer, after the device's was reset.
    /// Read-only and offline zones are never reset.
    pub(crate) fn mark_reset(&mut self) {
        if self.is_sequential() && !self.is_unusable() {
            self.wp = Some(self.start);
            self.cond = ZoneCond::Empty;
            self.need_reset = false;
        }
    }

    /// Describe this zone on one line, for diagnostics.
    ///
    /// `backend` is the name of the device holding the zone.
    pub fn display<'a>(&'a self, backend: &'a str) -> ZoneLine<'a> {
        ZoneLine { zone: self, backend }
    }
}

/// Return value of [`Zone::display`]
pub struct ZoneLine<'a> {
    zone: &'a Zone,
    backend: &'a str,
}

impl fmt::Display for ZoneLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let z = self.zone;
        write!(f, "Zone {:06} ({}): ", z.id, self.backend)?;
        match z.cond {
            ZoneCond::ReadOnly => return write!(f, "readonly {} zone", z.cond),
            ZoneCond::Offline => return write!(f, "offline {} zone", z.cond),
            _ => ()
        }
        if z.is_conventional() {
            return write!(f, "Conventional, cond {:#x} ({}), sector {}, {} sectors",
                          u8::from(z.cond), z.cond, z.start, z.len);
        }
        write!(f, "type {:#x} ({}), cond {:#x} ({}), need_reset {}, \
                   non_seq {}, sector {}, {} sectors, ",
               u8::from(z.zone_type), z.zone_type, u8::from(z.cond), z.cond,
               u8::from(z.need_reset), u8::from(z.non_seq), z.start, z.len)?;
        match z.wp {
            Some(wp) => write!(f, "wp sector {wp}"),
            None => write!(f, "wp sector N/A"),
        }
    }
}

// LCOV_EXCL_STOP
