// vim: tw=80
//! Identity and geometry of the physical devices that make up a composite

use std::{
    fmt,
    path::{Path, PathBuf},
};

use nix::sys::stat::{stat, SFlag};
use tracing::{debug, warn};

use crate::{
    config::Config,
    disk::{BlockFile, Disk},
    safety::{Operation, SafetyGuard},
    sysfs::Sysfs,
    types::*,
    util::*,
};

/// The kernel's zoned model of a backend
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceKind {
    /// Not zoned, or a partition.  Zones are emulated.
    Regular,
    ZonedHostAware,
    ZonedHostManaged,
}

impl DeviceKind {
    /// Decode the contents of sysfs's `queue/zoned` attribute
    fn from_model(model: &str) -> Self {
        match model {
            "host-aware" => DeviceKind::ZonedHostAware,
            "host-managed" => DeviceKind::ZonedHostManaged,
            _ => DeviceKind::Regular,
        }
    }

    pub fn is_zoned(self) -> bool {
        self != DeviceKind::Regular
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DeviceKind::Regular => "Regular block device",
            DeviceKind::ZonedHostAware => "Host-aware zoned block device",
            DeviceKind::ZonedHostManaged => "Host-managed zoned block device",
        }.fmt(f)
    }
}

/// Shape of one backend, in 512-byte sectors.
///
/// A regular backend has no zone size of its own until it joins a composite.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Geometry {
    kind: DeviceKind,
    capacity: u64,
    /// Size reported by the device, which may end with a partial block
    raw_capacity: u64,
    zone_sectors: u64,
    nr_zones: u64,
}

impl Geometry {
    /// Geometry of a non-zoned device of `capacity` sectors
    pub fn regular(capacity: u64) -> Self {
        Geometry {
            kind: DeviceKind::Regular,
            capacity: sect_align_down(capacity),
            raw_capacity: capacity,
            zone_sectors: 0,
            nr_zones: 0
        }
    }

    /// Geometry of a zoned device of `capacity` sectors, divided into zones of
    /// `zone_sectors`.  The last zone may be short.
    pub fn zoned(name: &str, kind: DeviceKind, capacity: u64,
                 zone_sectors: u64) -> Result<Self>
    {
        debug_assert!(kind.is_zoned());
        let mut g = Geometry {
            kind,
            capacity: sect_align_down(capacity),
            raw_capacity: capacity,
            zone_sectors: 0,
            nr_zones: 0
        };
        g.assign_zone_size(name, zone_sectors)?;
        Ok(g)
    }

    /// Derive a backend's geometry from sysfs and its size in bytes.
    pub fn probe(sysfs: &Sysfs, name: &str, capacity_bytes: u64)
        -> Result<Self>
    {
        let capacity = bytes2sect(capacity_bytes);
        let kind = if sysfs.is_partition(name)? {
            DeviceKind::Regular
        } else {
            DeviceKind::from_model(&sysfs.zoned_model(name)?)
        };
        match kind {
            DeviceKind::Regular => Ok(Geometry::regular(capacity)),
            DeviceKind::ZonedHostAware | DeviceKind::ZonedHostManaged => {
                let zone_sectors = sysfs.chunk_sectors(name)?;
                Geometry::zoned(name, kind, capacity, zone_sectors)
            }
        }
    }

    /// Divide the device into zones of `zone_sectors`.
    pub(crate) fn assign_zone_size(&mut self, name: &str, zone_sectors: u64)
        -> Result<()>
    {
        if zone_sectors == 0 || zone_sectors & BLOCK_SECTORS_MASK != 0 {
            return Err(GeometryError::InvalidZoneSize {
                device: name.to_owned(),
                zone_sectors
            }.into());
        }
        let nr_zones = div_roundup(self.capacity, zone_sectors);
        if nr_zones == 0 {
            return Err(GeometryError::ZeroZoneCount {
                device: name.to_owned()
            }.into());
        }
        self.zone_sectors = zone_sectors;
        self.nr_zones = nr_zones;
        Ok(())
    }

    /// Capacity in sectors, a whole number of metadata blocks
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Capacity in sectors as reported by the device.  A zoned device's last
    /// zone ends here.
    pub fn raw_capacity(&self) -> u64 {
        self.raw_capacity
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn nr_zones(&self) -> u64 {
        self.nr_zones
    }

    pub fn zone_sectors(&self) -> u64 {
        self.zone_sectors
    }
}

/// Parse the major and minor numbers out of a kernel release string such as
/// "5.15.0-91-generic".
fn parse_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Can the running kernel reset every zone of a device with a single request?
fn kernel_resets_all_zones() -> bool {
    match nix::sys::utsname::uname() {
        Ok(uts) => {
            let release = uts.release().to_string_lossy();
            parse_release(&release).is_some_and(|v| v >= (5, 4))
        }
        Err(e) => {
            warn!("uname failed: {e}");
            false
        }
    }
}

/// One physical device backing part of the composite address space
#[derive(Debug)]
pub struct BackendDevice {
    path: PathBuf,
    /// Used in diagnostics.  The last component of `path`.
    name: String,
    geometry: Geometry,
    /// First composite block supplied by this backend
    block_offset: CompositeBlock,
    /// Can all zones be reset with one request?
    reset_all: bool,
    /// `None` once closed
    disk: Option<Box<dyn Disk>>,
}

impl BackendDevice {
    /// Construct a backend from an already open disk.  Its block offset is
    /// assigned when it joins a composite.
    pub fn new<P: Into<PathBuf>>(path: P, disk: Box<dyn Disk>,
                                 geometry: Geometry) -> Self
    {
        let path = path.into();
        let name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        BackendDevice {
            path,
            name,
            geometry,
            block_offset: CompositeBlock(0),
            reset_all: false,
            disk: Some(disk)
        }
    }

    /// Identify the block device at `path`, read its geometry, and open it
    /// for reading and writing.  Never modifies the device.
    pub fn probe<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let st = stat(path).map_err(|source| DeviceError::Stat {
            path: path.to_owned(),
            source
        })?;
        let fmt = SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT;
        if fmt != SFlag::S_IFBLK {
            return Err(DeviceError::NotABlockDevice {
                path: path.to_owned()
            }.into());
        }
        // sysfs knows devices by their real names, not by symlinks
        let (real, file) = path.canonicalize()
            .and_then(|real| BlockFile::open(&real).map(|file| (real, file)))
            .map_err(|source| DeviceError::Open {
                path: path.to_owned(),
                source
            })?;
        let mut bd = BackendDevice::new(real, Box::new(file),
                                        Geometry::regular(0));
        let bytes = bd.disk()?.capacity()
            .map_err(|source| DeviceError::Capacity {
                device: bd.name.clone(),
                source
            })?;
        let sysfs = config.sysfs();
        bd.geometry = Geometry::probe(&sysfs, &bd.name, bytes)?;
        bd.reset_all = bd.geometry.kind.is_zoned() &&
            !sysfs.is_dm(&bd.name) &&
            kernel_resets_all_zones();
        debug!(device = %bd.name, kind = ?bd.geometry.kind,
               capacity = bd.geometry.capacity,
               zone_sectors = bd.geometry.zone_sectors,
               reset_all = bd.reset_all, "probed backend");
        Ok(bd)
    }

    /// Run the safety checks for `op`, then probe the device.
    pub fn open<P: AsRef<Path>>(path: P, op: Operation, config: &Config)
        -> Result<Self>
    {
        let path = path.as_ref();
        SafetyGuard::new(config)
            .check_destroyable(path, op, config.is_forced())?;
        BackendDevice::probe(path, config)
    }

    /// Allow or forbid resetting every zone with a single request.
    pub fn with_reset_all(mut self, reset_all: bool) -> Self {
        self.reset_all = reset_all;
        self
    }

    /// Release the device handle.  Further I/O fails.
    pub fn close(&mut self) {
        if self.disk.take().is_some() {
            debug!(device = %self.name, "closed backend");
        }
    }

    pub fn disk(&self) -> Result<&dyn Disk> {
        self.disk.as_deref().ok_or_else(|| IoError::Closed {
            device: self.name.clone()
        }.into())
    }

    pub fn block_offset(&self) -> CompositeBlock {
        self.block_offset
    }

    pub(crate) fn set_block_offset(&mut self, offset: CompositeBlock) {
        self.block_offset = offset;
    }

    /// First composite sector supplied by this backend
    pub fn sector_offset(&self) -> CompositeSector {
        self.block_offset.to_sector()
    }

    /// Capacity in sectors
    pub fn capacity(&self) -> u64 {
        self.geometry.capacity
    }

    pub fn raw_capacity(&self) -> u64 {
        self.geometry.raw_capacity
    }

    /// Capacity in metadata blocks
    pub fn nr_blocks(&self) -> u64 {
        self.geometry.capacity >> BLOCK_SECTORS_SHIFT
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub(crate) fn geometry_mut(&mut self) -> &mut Geometry {
        &mut self.geometry
    }

    pub fn is_open(&self) -> bool {
        self.disk.is_some()
    }

    pub fn kind(&self) -> DeviceKind {
        self.geometry.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nr_zones(&self) -> u64 {
        self.geometry.nr_zones
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn supports_reset_all(&self) -> bool {
        self.reset_all
    }

    pub fn zone_sectors(&self) -> u64 {
        self.geometry.zone_sectors
    }
}

impl fmt::Display for BackendDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.geometry;
        writeln!(f, "{}: {} 512-byte sectors ({} GiB)", self.path.display(),
                 g.capacity, sect2units(g.capacity, 30))?;
        writeln!(f, "  {}", g.kind)?;
        write!(f, "  {} zones, offset {}", g.nr_zones, self.block_offset)
    }
}

// LCOV_EXCL_STOP
