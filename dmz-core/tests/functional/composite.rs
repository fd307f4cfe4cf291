// vim: tw=80
use pretty_assertions::assert_eq;
use rstest::rstest;

use dmz_core::*;

use super::file_backends;

/// A composite's zones tile its address space exactly
#[rstest]
#[case(&[1_000_000], 65_536, 16)]
#[case(&[500_000, 500_000], 65_536, 16)]
#[case(&[65_536, 8, 131_072], 65_536, 4)]
#[test_log::test]
fn zone_table(#[case] sizes: &[u64], #[case] zone_sectors: u64,
              #[case] nr_zones: u64)
{
    let (_tempdir, _paths, backends) = file_backends("test_zone_table", sizes);
    let mut dev = CompositeDevice::new(backends, Some(zone_sectors)).unwrap();
    dev.load_zones().unwrap();
    assert_eq!(dev.nr_zones(), nr_zones);
    assert_eq!(dev.zones().len() as u64, nr_zones);
    assert_eq!(dev.capacity(), sizes.iter().sum::<u64>());
    let total: u64 = dev.zones().iter().map(|z| z.len).sum();
    assert_eq!(total, dev.capacity());
    for z in dev.zones() {
        assert!(z.capacity <= z.len);
        assert!(z.len <= zone_sectors);
        assert_eq!(z.zone_type, ZoneType::Unknown);
        let (bd, _) = dev.locate_sector(z.start).unwrap();
        assert_eq!(bd.name(), dev.backends()[z.backend].name());
    }
}

/// Reloading the zone table of an unmodified composite changes nothing
#[test]
fn reload_zones() {
    let (_tempdir, _paths, backends) =
        file_backends("test_reload_zones", &[262_144, 262_144]);
    let mut dev = CompositeDevice::new(backends, Some(65_536)).unwrap();
    dev.load_zones().unwrap();
    let zones = dev.zones().to_vec();
    dev.load_zones().unwrap();
    assert_eq!(dev.zones(), &zones[..]);
}

/// Regular backends have no write pointers to reset
#[test]
fn reset_zones_regular() {
    let (_tempdir, _paths, backends) =
        file_backends("test_reset_zones_regular", &[262_144]);
    let mut dev = CompositeDevice::new(backends, Some(65_536)).unwrap();
    dev.load_zones().unwrap();
    dev.reset_zones().unwrap();
    dev.reset_zone(3).unwrap();
}

#[test]
fn offsets() {
    let (_tempdir, _paths, backends) =
        file_backends("test_offsets", &[500_000, 500_000]);
    let dev = CompositeDevice::new(backends, Some(65_536)).unwrap();
    let bds = dev.backends();
    assert_eq!(bds[0].block_offset(), CompositeBlock(0));
    assert_eq!(bds[1].block_offset(),
               CompositeBlock(bds[0].block_offset().0 + bds[0].nr_blocks()));
    let (bd, ls) = dev.locate_sector(CompositeSector(600_000)).unwrap();
    assert_eq!(bd.name(), "disk.1");
    assert_eq!(ls, LocalSector(100_000));
}
