// vim: tw=80
//! The logical zoned device formed by concatenating backends

use std::{fmt, path::Path};

use tracing::{debug, info, warn};

use crate::{
    backend::BackendDevice,
    config::Config,
    safety::Operation,
    topology,
    translate::locate,
    types::*,
    util::*,
    zone::Zone,
};

/// One or more backends, concatenated into a single zoned address space.
///
/// Every backend is divided into zones of the same size.  Zoned backends
/// dictate that size; an all-regular composite needs one to be configured.
#[derive(Debug)]
pub struct CompositeDevice {
    /// Sorted by offset
    backends: Vec<BackendDevice>,
    /// Total capacity in sectors
    capacity: u64,
    zone_sectors: u64,
    nr_zones: u64,
    /// Empty until [`CompositeDevice::load_zones`]
    zones: Vec<Zone>,
}

impl CompositeDevice {
    /// Concatenate `backends` in the given order.
    ///
    /// `zone_sectors` is only used when no backend is zoned.  The zone table
    /// is not loaded.
    pub fn new(mut backends: Vec<BackendDevice>, zone_sectors: Option<u64>)
        -> Result<Self>
    {
        if backends.is_empty() {
            return Err(GeometryError::NoBackends.into());
        }
        let mut zoned = backends.iter().filter(|bd| bd.kind().is_zoned());
        let zs = match zoned.next() {
            Some(first) => {
                let expected = first.zone_sectors();
                if let Some(bd) = zoned.find(|bd| bd.zone_sectors() != expected)
                {
                    return Err(GeometryError::ZoneSizeMismatch {
                        device: bd.name().to_owned(),
                        expected,
                        found: bd.zone_sectors()
                    }.into());
                }
                if zone_sectors.is_some_and(|zs| zs != expected) {
                    warn!("Ignoring configured zone size; using {} sectors \
                           from {}", expected, first.name());
                }
                expected
            }
            None => zone_sectors.ok_or(GeometryError::MissingZoneSize)?
        };

        let mut offset = CompositeBlock(0);
        let mut nr_zones = 0;
        for bd in backends.iter_mut() {
            if !bd.kind().is_zoned() {
                let name = bd.name().to_owned();
                bd.geometry_mut().assign_zone_size(&name, zs)?;
            }
            bd.set_block_offset(offset);
            offset = offset + bd.nr_blocks();
            nr_zones += bd.nr_zones();
            info!("{}", bd);
        }
        let dev = CompositeDevice {
            backends,
            capacity: offset.to_sector().0,
            zone_sectors: zs,
            nr_zones,
            zones: Vec::new()
        };
        info!("{}", dev);
        Ok(dev)
    }

    /// Open every device in `paths` for `op`, in order, and load the zone
    /// table of the result.
    pub fn open<P: AsRef<Path>>(paths: &[P], op: Operation, config: &Config)
        -> Result<Self>
    {
        let backends = paths.iter()
            .map(|p| BackendDevice::open(p, op, config))
            .collect::<Result<Vec<_>>>()?;
        let mut dev = CompositeDevice::new(backends,
                                           config.configured_zone_sectors())?;
        dev.load_zones()?;
        Ok(dev)
    }

    /// (Re)build the zone table from the backends.
    pub fn load_zones(&mut self) -> Result<()> {
        self.zones = topology::build_zone_table(self)?;
        debug!("loaded {} zones", self.zones.len());
        Ok(())
    }

    pub fn backends(&self) -> &[BackendDevice] {
        &self.backends
    }

    /// Capacity in sectors
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Capacity in metadata blocks
    pub fn nr_blocks(&self) -> u64 {
        self.capacity >> BLOCK_SECTORS_SHIFT
    }

    pub fn nr_zones(&self) -> u64 {
        self.nr_zones
    }

    pub fn zone(&self, id: ZoneT) -> Option<&Zone> {
        self.zones.get(id as usize)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Zone size in sectors
    pub fn zone_sectors(&self) -> u64 {
        self.zone_sectors
    }

    /// Find the backend holding a composite block
    pub fn locate_block(&self, block: CompositeBlock)
        -> Option<(&BackendDevice, LocalBlock)>
    {
        locate(&self.backends, block).map(|(i, lb)| (&self.backends[i], lb))
    }

    /// Find the backend holding a composite sector
    pub fn locate_sector(&self, sector: CompositeSector)
        -> Option<(&BackendDevice, LocalSector)>
    {
        locate(&self.backends, sector).map(|(i, ls)| (&self.backends[i], ls))
    }

    /// Index of the zone holding a composite block
    pub fn block_zone_id(&self, block: CompositeBlock) -> Option<ZoneT> {
        let (i, lb) = locate(&self.backends, block)?;
        let first: u64 = self.backends[..i].iter()
            .map(BackendDevice::nr_zones)
            .sum();
        Some((first + lb.to_sector().0 / self.zone_sectors) as ZoneT)
    }

    /// Fail unless the zone table covers every zone
    fn check_loaded(&self) -> Result<()> {
        let loaded = self.zones.len() as u64;
        if loaded != self.nr_zones {
            return Err(TopologyError::NotLoaded {
                loaded,
                nr_zones: self.nr_zones
            }.into());
        }
        Ok(())
    }

    /// Reset the write pointer of one zone.
    ///
    /// Zones without a write pointer, empty zones, and read-only or offline
    /// zones are left alone.
    pub fn reset_zone(&mut self, id: ZoneT) -> Result<()> {
        self.check_loaded()?;
        let zone = *self.zone(id).ok_or(IoError::NoSuchZone { zone: id })?;
        if !zone.is_sequential() || zone.is_empty() || zone.is_unusable() {
            return Ok(());
        }
        let bd = &self.backends[zone.backend];
        let local = zone.start.localize(bd.sector_offset());
        // The device's last zone may extend past the last whole block
        let len = if local.0 + zone.len == bd.capacity() {
            bd.raw_capacity() - local.0
        } else {
            zone.len
        };
        bd.disk()?.reset_zones(local, len)
            .map_err(|source| IoError::Reset {
                device: bd.name().to_owned(),
                zone: id,
                source
            })?;
        self.zones[id as usize].mark_reset();
        Ok(())
    }

    /// Reset the write pointer of every zone.
    ///
    /// Each backend gets a single whole-device reset if it supports it, or
    /// else one reset per zone.
    pub fn reset_zones(&mut self) -> Result<()> {
        self.check_loaded()?;
        info!("Resetting sequential zones");
        for i in 0..self.backends.len() {
            let bd = &self.backends[i];
            if !bd.kind().is_zoned() {
                continue;
            }
            if bd.supports_reset_all() {
                match bd.disk()?.reset_zones(LocalSector(0), bd.raw_capacity()) {
                    Ok(()) => {
                        debug!(device = bd.name(), "reset all zones");
                        self.zones.iter_mut()
                            .filter(|z| z.backend == i)
                            .for_each(Zone::mark_reset);
                        continue;
                    }
                    Err(e) => {
                        warn!("{}: reset all zones failed, falling back to \
                               resetting zones individually: {e}", bd.name());
                    }
                }
            }
            let ids = self.zones.iter()
                .filter(|z| z.backend == i)
                .map(|z| z.id)
                .collect::<Vec<_>>();
            for id in ids {
                self.reset_zone(id)?;
            }
        }
        Ok(())
    }

    /// Close every backend.  Further I/O fails.
    pub fn close(&mut self) {
        self.backends.iter_mut().for_each(BackendDevice::close);
    }
}

impl fmt::Display for CompositeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Composite device: {} backend(s), {} 512-byte sectors \
                     ({} GiB)", self.backends.len(), self.capacity,
                 sect2units(self.capacity, 30))?;
        write!(f, "  {} zones of {} 512-byte sectors ({} MiB)", self.nr_zones,
               self.zone_sectors, sect2units(self.zone_sectors, 20))
    }
}

// LCOV_EXCL_START
#[cfg(test)]
mod t {
use mockall::{predicate::*, Sequence};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io;
use crate::{
    backend::{DeviceKind, Geometry},
    disk::{MockDisk, ReportedZone},
    zone::ZoneCond,
};
use super::*;

const ZS: u64 = 524_288;

fn rz(start: u64, cond: u8) -> ReportedZone {
    ReportedZone {
        start: LocalSector(start),
        len: ZS,
        wp: LocalSector(start + if cond == 1 { 0 } else { 64 }),
        capacity: ZS,
        zone_type: if start == 0 { 1 } else { 2 },
        cond: if start == 0 { 0 } else { cond },
        non_seq: false,
        reset: false
    }
}

fn regular(name: &str, capacity: u64) -> BackendDevice {
    BackendDevice::new(format!("/dev/{name}"), Box::new(MockDisk::new()),
                       Geometry::regular(capacity))
}

fn zoned_geometry(nr_zones: u64, zone_sectors: u64) -> Geometry {
    Geometry::zoned("sdb", DeviceKind::ZonedHostManaged, nr_zones * zone_sectors,
                    zone_sectors).unwrap()
}

/// A host-managed disk with one conventional zone followed by full
/// sequential zones
fn zoned_disk(nr_zones: u64) -> MockDisk {
    let mut disk = MockDisk::new();
    disk.expect_report_zones()
        .returning(move |sector, _| {
            Ok((sector.0 / ZS..nr_zones)
                .map(|i| rz(i * ZS, ZoneCond::Full.into()))
                .collect())
        });
    disk
}

#[test]
fn no_backends() {
    let e = CompositeDevice::new(Vec::new(), None).unwrap_err();
    assert!(matches!(e, Error::Geometry(GeometryError::NoBackends)));
}

#[test]
fn missing_zone_size() {
    let e = CompositeDevice::new(vec![regular("sda", 1 << 20)], None)
        .unwrap_err();
    assert!(matches!(e, Error::Geometry(GeometryError::MissingZoneSize)));
}

#[rstest]
#[case(0)]
#[case(65_540)]
fn invalid_zone_size(#[case] zs: u64) {
    let e = CompositeDevice::new(vec![regular("sda", 1 << 20)], Some(zs))
        .unwrap_err();
    assert!(matches!(e, Error::Geometry(GeometryError::InvalidZoneSize{..})));
}

#[test]
fn zone_size_mismatch() {
    let bds = vec![
        BackendDevice::new("/dev/sdb", Box::new(MockDisk::new()),
                           zoned_geometry(4, ZS)),
        BackendDevice::new("/dev/sdc", Box::new(MockDisk::new()),
                           zoned_geometry(4, 2 * ZS)),
    ];
    let e = CompositeDevice::new(bds, None).unwrap_err();
    assert_eq!(e.to_string(),
        "sdc: zone size mismatch (524288/1048576 sectors)");
}

/// A regular backend of 1,000,000 sectors with a configured zone size
#[test]
fn regular_only() {
    let mut dev = CompositeDevice::new(vec![regular("sda", 1_000_000)],
                                       Some(65_536)).unwrap();
    assert_eq!(dev.nr_zones(), 16);
    assert_eq!(dev.capacity(), 1_000_000);
    assert_eq!(dev.nr_blocks(), 125_000);
    dev.load_zones().unwrap();
    assert_eq!(dev.zones().len(), 16);
    assert_eq!(dev.zone(15).unwrap().len, 33_280);
    assert!(dev.zone(16).is_none());
    let total: u64 = dev.zones().iter().map(|z| z.len).sum();
    assert_eq!(total, dev.capacity());
}

/// Backends may be given in any order, and any mix of kinds
#[test]
fn zoned_then_regular() {
    let bds = vec![
        BackendDevice::new("/dev/sdb", Box::new(zoned_disk(4)),
                           zoned_geometry(4, ZS)),
        regular("sda", 3 * ZS / 2),
    ];
    // The configured zone size is overridden by the zoned device's
    let mut dev = CompositeDevice::new(bds, Some(65_536)).unwrap();
    assert_eq!(dev.zone_sectors(), ZS);
    assert_eq!(dev.nr_zones(), 6);
    assert_eq!(dev.backends()[1].block_offset(), CompositeBlock(4 * ZS / 8));
    dev.load_zones().unwrap();
    assert!(dev.zone(0).unwrap().is_conventional());
    assert_eq!(dev.zone(3).unwrap().wp, Some(CompositeSector(3 * ZS + 64)));
    assert!(dev.zone(4).unwrap().is_unknown());
    assert_eq!(dev.zone(5).unwrap().len, ZS / 2);
}

/// Backend A covers sectors 0..500,000 and backend B 500,000..1,000,000
#[test]
fn locate() {
    let dev = CompositeDevice::new(
        vec![regular("sda", 500_000), regular("sdb", 500_000)],
        Some(65_536)
    ).unwrap();
    let (bd, ls) = dev.locate_sector(CompositeSector(600_000)).unwrap();
    assert_eq!(bd.name(), "sdb");
    assert_eq!(ls, LocalSector(100_000));
    let (bd, lb) = dev.locate_block(CompositeBlock(62_499)).unwrap();
    assert_eq!(bd.name(), "sda");
    assert_eq!(lb, LocalBlock(62_499));
    assert!(dev.locate_block(CompositeBlock(125_000)).is_none());
}

#[rstest]
#[case(0, Some(0))]
#[case(8191, Some(0))]
#[case(8192, Some(1))]
// sda's last zone is short, so sdb's first zone is zone 8
#[case(62_500, Some(8))]
#[case(62_500 + 8192, Some(9))]
#[case(125_000, None)]
fn block_zone_id(#[case] block: u64, #[case] expected: Option<ZoneT>) {
    let mut dev = CompositeDevice::new(
        vec![regular("sda", 500_000), regular("sdb", 500_000)],
        Some(65_536)
    ).unwrap();
    assert_eq!(dev.block_zone_id(CompositeBlock(block)), expected);
    dev.load_zones().unwrap();
    if let Some(id) = expected {
        let sector = CompositeBlock(block).to_sector();
        let z = dev.zone(id).unwrap();
        assert!(z.start <= sector && sector < z.end());
    }
}

#[test]
fn reset_zone() {
    let mut disk = zoned_disk(4);
    disk.expect_reset_zones()
        .with(eq(LocalSector(2 * ZS)), eq(ZS))
        .once()
        .returning(|_, _| Ok(()));
    let bds = vec![
        regular("sda", ZS),
        BackendDevice::new("/dev/sdb", Box::new(disk), zoned_geometry(4, ZS)),
    ];
    let mut dev = CompositeDevice::new(bds, None).unwrap();
    dev.load_zones().unwrap();
    // Zone 3 is sdb's zone 2
    dev.reset_zone(3).unwrap();
    let z = dev.zone(3).unwrap();
    assert_eq!(z.cond, ZoneCond::Empty);
    assert_eq!(z.wp, Some(z.start));
    // Emulated and conventional zones have nothing to reset
    dev.reset_zone(0).unwrap();
    dev.reset_zone(1).unwrap();
    // Neither do empty ones
    dev.reset_zone(3).unwrap();
}

/// The last zone of a device whose size isn't a whole number of blocks is
/// reset in full
#[test]
fn reset_zone_unaligned_end() {
    let mut disk = MockDisk::new();
    disk.expect_report_zones()
        .returning(|sector, _| {
            let last = ReportedZone {
                len: 4100,
                capacity: 4100,
                ..rz(ZS, ZoneCond::Full.into())
            };
            Ok([rz(0, 0), last].into_iter()
                .filter(|z| z.start.0 + z.len > sector.0)
                .collect())
        });
    disk.expect_reset_zones()
        .with(eq(LocalSector(ZS)), eq(4100))
        .once()
        .returning(|_, _| Ok(()));
    let g = Geometry::zoned("sdb", DeviceKind::ZonedHostManaged, ZS + 4100,
                            ZS).unwrap();
    let bd = BackendDevice::new("/dev/sdb", Box::new(disk), g);
    let mut dev = CompositeDevice::new(vec![bd], None).unwrap();
    dev.load_zones().unwrap();
    assert_eq!(dev.capacity(), ZS + 4096);
    assert_eq!(dev.zone(1).unwrap().len, 4096);
    dev.reset_zone(1).unwrap();
    assert!(dev.zone(1).unwrap().is_empty());
}

#[test]
fn reset_zone_enoent() {
    let mut dev = CompositeDevice::new(vec![regular("sda", ZS)], Some(ZS))
        .unwrap();
    dev.load_zones().unwrap();
    let e = dev.reset_zone(1).unwrap_err();
    assert!(matches!(e, Error::Io(IoError::NoSuchZone{zone: 1})));
}

/// Resetting before the zone table is loaded must not report success
#[test]
fn reset_without_zone_table() {
    let mut disk = zoned_disk(4);
    disk.expect_reset_zones()
        .never();
    let bd = BackendDevice::new("/dev/sdb", Box::new(disk),
                                zoned_geometry(4, ZS))
        .with_reset_all(true);
    let mut dev = CompositeDevice::new(vec![bd], None).unwrap();
    let e = dev.reset_zones().unwrap_err();
    assert!(matches!(e, Error::Topology(TopologyError::NotLoaded {
        loaded: 0, nr_zones: 4
    })));
    let e = dev.reset_zone(1).unwrap_err();
    assert!(matches!(e, Error::Topology(TopologyError::NotLoaded{..})));
    dev.load_zones().unwrap();
    assert_eq!(dev.zones().len(), 4);
}

#[test]
fn reset_zone_failed() {
    let mut disk = zoned_disk(2);
    disk.expect_reset_zones()
        .returning(|_, _| Err(io::Error::from_raw_os_error(libc::EIO)));
    let bds = vec![
        BackendDevice::new("/dev/sdb", Box::new(disk), zoned_geometry(2, ZS))
    ];
    let mut dev = CompositeDevice::new(bds, None).unwrap();
    dev.load_zones().unwrap();
    let e = dev.reset_zone(1).unwrap_err();
    assert!(e.to_string().starts_with("sdb: reset zone 1 failed"));
    assert_eq!(dev.zone(1).unwrap().cond, ZoneCond::Full);
}

#[test]
fn reset_zones_all_at_once() {
    let mut disk = zoned_disk(4);
    disk.expect_reset_zones()
        .with(eq(LocalSector(0)), eq(4 * ZS))
        .once()
        .returning(|_, _| Ok(()));
    let bd = BackendDevice::new("/dev/sdb", Box::new(disk),
                                zoned_geometry(4, ZS))
        .with_reset_all(true);
    let mut dev = CompositeDevice::new(vec![bd], None).unwrap();
    dev.load_zones().unwrap();
    dev.reset_zones().unwrap();
    assert!(dev.zones()[1..].iter().all(Zone::is_empty));
    assert!(dev.zone(0).unwrap().is_conventional());
}

/// If resetting the whole device fails, reset one zone at a time.
#[test]
fn reset_zones_fallback() {
    let mut seq = Sequence::new();
    let mut disk = zoned_disk(3);
    disk.expect_reset_zones()
        .with(eq(LocalSector(0)), eq(3 * ZS))
        .once()
        .in_sequence(&mut seq)
        .returning(|_, _| Err(io::Error::from_raw_os_error(libc::EINVAL)));
    for i in 1..3 {
        disk.expect_reset_zones()
            .with(eq(LocalSector(i * ZS)), eq(ZS))
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
    }
    let bd = BackendDevice::new("/dev/sdb", Box::new(disk),
                                zoned_geometry(3, ZS))
        .with_reset_all(true);
    let mut dev = CompositeDevice::new(vec![bd], None).unwrap();
    dev.load_zones().unwrap();
    dev.reset_zones().unwrap();
    assert!(dev.zones()[1..].iter().all(Zone::is_empty));
}

/// Without whole-device reset support, every sequential zone is reset
/// individually.  Regular backends are skipped.
#[test]
fn reset_zones_individually() {
    let mut disk = zoned_disk(3);
    disk.expect_reset_zones()
        .with(always(), eq(ZS))
        .times(2)
        .returning(|_, _| Ok(()));
    let bds = vec![
        regular("sda", 2 * ZS),
        BackendDevice::new("/dev/sdb", Box::new(disk), zoned_geometry(3, ZS)),
    ];
    let mut dev = CompositeDevice::new(bds, None).unwrap();
    dev.load_zones().unwrap();
    dev.reset_zones().unwrap();
}

#[test]
fn display() {
    let dev = CompositeDevice::new(vec![regular("sda", 1 << 22)], Some(ZS))
        .unwrap();
    assert_eq!(dev.to_string(),
        "Composite device: 1 backend(s), 4194304 512-byte sectors (2 GiB)\n  \
         8 zones of 524288 512-byte sectors (256 MiB)");
}

#[test]
fn close() {
    let mut dev = CompositeDevice::new(vec![regular("sda", ZS)], Some(ZS))
        .unwrap();
    dev.close();
    assert!(dev.backends().iter().all(|bd| !bd.is_open()));
}
}
// LCOV_EXCL_STOP
