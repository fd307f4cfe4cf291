// vim: tw=80
use std::fs;

use tempfile::Builder;

use dmz_core::*;

/// Regular files are never acceptable backends
#[test]
fn not_a_block_device() {
    let tempdir = Builder::new()
        .prefix("test_not_a_block_device")
        .tempdir()
        .unwrap();
    let path = tempdir.path().join("disk");
    fs::File::create(&path).unwrap().set_len(1 << 20).unwrap();

    let config = Config::default().force(true);
    let e = BackendDevice::open(&path, Operation::Format, &config)
        .unwrap_err();
    assert!(matches!(e, Error::Device(DeviceError::NotABlockDevice{..})));
    let e = CompositeDevice::open(&[&path], Operation::Check, &config)
        .unwrap_err();
    assert!(e.to_string().ends_with("is not a block device"));
    let e = SafetyGuard::new(&config).holder_of(&path).unwrap_err();
    assert!(matches!(e, Error::Device(DeviceError::NotABlockDevice{..})));
}

#[test]
fn enoent() {
    let tempdir = Builder::new()
        .prefix("test_enoent")
        .tempdir()
        .unwrap();
    let path = tempdir.path().join("disk");
    let e = BackendDevice::open(&path, Operation::Check, &Config::default())
        .unwrap_err();
    assert!(matches!(e, Error::Device(DeviceError::Stat{..})));
}
