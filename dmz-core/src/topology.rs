// vim: tw=80
//! Assembly of the composite device's zone table
//!
//! Regular backends get emulated zones of the composite's zone size.  Zoned
//! backends are asked for their zones, which are checked against the
//! backend's geometry and moved into composite space.  Either the whole table
//! is valid or nothing is returned.

use tracing::{debug, trace};

use crate::{
    backend::{BackendDevice, DeviceKind},
    composite::CompositeDevice,
    disk::{ReportedZone, REPORT_ZONES_MAX},
    types::*,
    zone::{Zone, ZoneCond, ZoneType},
};

/// Build the zone table of `dev` from its backends.
pub fn build_zone_table(dev: &CompositeDevice) -> Result<Vec<Zone>> {
    build(dev.backends(), dev.zone_sectors(), dev.nr_zones(), dev.capacity())
}

/// Build a zone table for `backends`, which must be sorted by offset and
/// together hold `nr_zones` zones over `capacity` sectors.
pub(crate) fn build(backends: &[BackendDevice], zone_sectors: u64,
                    nr_zones: u64, capacity: u64) -> Result<Vec<Zone>>
{
    let zones = backends.iter()
        .enumerate()
        .try_fold(Vec::with_capacity(nr_zones as usize),
                  |zones, (i, bd)| -> Result<Vec<Zone>>
        {
            let cursor = zones.last().map(Zone::end).unwrap_or_default();
            if cursor != bd.sector_offset() {
                return Err(TopologyError::CoverageMismatch {
                    last: cursor,
                    expected: bd.sector_offset()
                }.into());
            }
            match bd.kind() {
                DeviceKind::Regular => {
                    Ok(synthesize(zones, i, bd, zone_sectors))
                }
                DeviceKind::ZonedHostAware | DeviceKind::ZonedHostManaged => {
                    query(zones, i, bd, zone_sectors, nr_zones)
                }
            }
        })?;

    let found = zones.len() as u64;
    if found != nr_zones {
        return Err(TopologyError::ZoneCountMismatch {
            expected: nr_zones,
            found
        }.into());
    }
    let last = zones.last().map(Zone::end).unwrap_or_default();
    if last != CompositeSector(capacity) {
        return Err(TopologyError::CoverageMismatch {
            last,
            expected: CompositeSector(capacity)
        }.into());
    }
    Ok(zones)
}

/// Emulate zones for a regular backend.  The last one may be short.
fn synthesize(mut zones: Vec<Zone>, backend: usize, bd: &BackendDevice,
              zone_sectors: u64) -> Vec<Zone>
{
    let base = bd.sector_offset();
    let capacity = bd.capacity();
    let mut local = 0;
    while local < capacity {
        let len = zone_sectors.min(capacity - local);
        let zone = Zone {
            id: zones.len() as ZoneT,
            backend,
            start: base + local,
            len,
            capacity: len,
            wp: None,
            zone_type: ZoneType::Unknown,
            cond: ZoneCond::NotWritePointer,
            need_reset: false,
            non_seq: false,
        };
        trace!("{}", zone.display(bd.name()));
        zones.push(zone);
        local += len;
    }
    zones
}

/// Ask a zoned backend for its zones, one report at a time.
fn query(mut zones: Vec<Zone>, backend: usize, bd: &BackendDevice,
         zone_sectors: u64, nr_zones: u64) -> Result<Vec<Zone>>
{
    let disk = bd.disk()?;
    let mut cursor = LocalSector(0);
    while cursor.0 < bd.capacity() {
        debug!(device = bd.name(), sector = %cursor, "report zones");
        let report = disk.report_zones(cursor, REPORT_ZONES_MAX)
            .map_err(|source| TopologyError::ReportFailed {
                device: bd.name().to_owned(),
                sector: cursor,
                source
            })?;
        if report.is_empty() {
            debug!(device = bd.name(), sector = %cursor, "empty zone report");
            break;
        }
        for rz in report.iter() {
            // A trailing partial block isn't addressable
            if rz.start.0 >= bd.capacity() {
                return Ok(zones);
            }
            let zone = validate(rz, zones.len() as u64, cursor, backend, bd,
                                zone_sectors, nr_zones)?;
            trace!("{}", zone.display(bd.name()));
            cursor = rz.start + rz.len;
            zones.push(zone);
        }
    }
    Ok(zones)
}

/// Check one reported zone and move it into composite space.
///
/// `index` is the zone's position in the whole composite, and `cursor` the
/// end of the previous zone of the same backend.
fn validate(rz: &ReportedZone, index: u64, cursor: LocalSector,
            backend: usize, bd: &BackendDevice, zone_sectors: u64,
            nr_zones: u64) -> Result<Zone>
{
    let device = || bd.name().to_owned();
    let malformed = |detail: String| TopologyError::MalformedReport {
        device: device(),
        sector: rz.start,
        detail
    };
    let end = rz.start.0.saturating_add(rz.len);
    if rz.len != zone_sectors && end != bd.raw_capacity() {
        return Err(TopologyError::ZoneSizeMismatch {
            device: device(),
            zone: index as ZoneT,
            len: rz.len,
            expected: zone_sectors
        }.into());
    }
    // Kernels before 5.9 don't report zone capacity
    let capacity = if rz.capacity == 0 { rz.len } else { rz.capacity };
    if capacity < rz.len {
        return Err(TopologyError::ShrunkCapacity {
            device: device(),
            zone: index as ZoneT,
            capacity,
            len: rz.len
        }.into());
    }
    if index >= nr_zones {
        return Err(TopologyError::TooManyZones {
            device: device(),
            zone: index as ZoneT,
            start: rz.start
        }.into());
    }
    if rz.start != cursor {
        return Err(malformed(format!("zone starts at {}, expected {cursor}",
                                     rz.start)).into());
    }
    if rz.len == 0 || end > bd.raw_capacity() || capacity > rz.len {
        return Err(malformed(format!("zone of {} sectors with capacity {} \
                                      is out of bounds", rz.len, capacity))
                   .into());
    }
    let cond = ZoneCond::try_from(rz.cond)
        .map_err(|_| malformed(format!("unknown zone condition {:#x}",
                                       rz.cond)))?;
    let zone_type = ZoneType::from(rz.zone_type);
    let base = bd.sector_offset();
    let mut zone = Zone {
        id: index as ZoneT,
        backend,
        start: rz.start.rebase(base),
        len: rz.len,
        capacity,
        wp: None,
        zone_type,
        cond,
        need_reset: rz.reset,
        non_seq: rz.non_seq,
    };
    // The write pointer of read-only and offline zones is undefined
    if zone.is_sequential() && !zone.is_unusable() {
        if rz.wp < rz.start || rz.wp.0 > end {
            return Err(malformed(format!("write pointer {} outside of zone",
                                         rz.wp)).into());
        }
        zone.wp = Some(rz.wp.rebase(base));
    }
    // Trim the last zone to the composite's whole blocks
    let usable = bd.capacity() - rz.start.0;
    if zone.len > usable {
        zone.len = usable;
        zone.capacity = zone.capacity.min(usable);
        let end = zone.end();
        zone.wp = zone.wp.map(|wp| wp.min(end));
    }
    Ok(zone)
}

// LCOV_EXCL_STOP
