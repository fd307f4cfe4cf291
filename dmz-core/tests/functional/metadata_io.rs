// vim: tw=80
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::{
    fs,
    io::{Read, Seek, SeekFrom},
};

use dmz_core::*;

use super::file_backends;

/// Whatever is written to a block can be read back, regardless of which
/// backend holds it.
#[rstest]
#[case(&[262_144])]
#[case(&[131_072, 262_144])]
#[case(&[65_536, 8, 65_536])]
#[test_log::test]
fn round_trip(#[case] sizes: &[u64]) {
    let (_tempdir, _paths, backends) = file_backends("test_round_trip", sizes);
    let dev = CompositeDevice::new(backends, Some(65_536)).unwrap();
    let nr_blocks = dev.nr_blocks();
    let samples = [0, 1, nr_blocks / 2, nr_blocks - 2, nr_blocks - 1];
    for &b in samples.iter() {
        let wbuf = vec![(b % 251) as u8 + 1; BLOCK_SIZE];
        dev.write_block(CompositeBlock(b), &wbuf).unwrap();
    }
    dev.sync().unwrap();
    for &b in samples.iter() {
        let mut rbuf = vec![0u8; BLOCK_SIZE];
        dev.read_block(CompositeBlock(b), &mut rbuf).unwrap();
        assert_eq!(rbuf, vec![(b % 251) as u8 + 1; BLOCK_SIZE]);
    }
}

/// Blocks land at the right offset of the right backing file
#[test]
fn placement() {
    let (_tempdir, paths, backends) =
        file_backends("test_placement", &[131_072, 131_072]);
    let dev = CompositeDevice::new(backends, Some(65_536)).unwrap();
    let wbuf = vec![0x42u8; BLOCK_SIZE];
    // 131,072 sectors is 16,384 blocks
    dev.write_block(CompositeBlock(16_384 + 5), &wbuf).unwrap();
    dev.sync().unwrap();

    let mut f = fs::File::open(&paths[1]).unwrap();
    f.seek(SeekFrom::Start(5 * 4096)).unwrap();
    let mut rbuf = vec![0u8; BLOCK_SIZE];
    f.read_exact(&mut rbuf).unwrap();
    assert_eq!(rbuf, wbuf);

    let untouched = fs::read(&paths[0]).unwrap();
    assert!(untouched.iter().all(|&b| b == 0));
}

#[test]
fn out_of_range() {
    let (_tempdir, _paths, backends) =
        file_backends("test_out_of_range", &[65_536]);
    let dev = CompositeDevice::new(backends, Some(65_536)).unwrap();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let e = dev.read_block(CompositeBlock(8192), &mut buf).unwrap_err();
    assert_eq!(e.to_string(),
        "block 8192 is beyond the end of the device (8192 blocks)");
}

/// The backing file shrank after the composite was assembled
#[test]
fn short_read() {
    let (_tempdir, paths, backends) =
        file_backends("test_short_read", &[65_536]);
    let dev = CompositeDevice::new(backends, Some(65_536)).unwrap();
    fs::OpenOptions::new()
        .write(true)
        .open(&paths[0])
        .unwrap()
        .set_len(4096 * 100 + 1024)
        .unwrap();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let e = dev.read_block(CompositeBlock(100), &mut buf).unwrap_err();
    assert!(matches!(e, Error::Io(IoError::ShortRead{len: 1024, ..})));
}
