// vim: tw=80
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;

use super::super::{dmzadm, util::fake_disk};

/// Even with --force, a regular file is refused, and left untouched
#[test]
fn not_a_block_device() {
    let (filename, _tempdir) = fake_disk("dmzadm_reset_zones_not_a_block_device");
    fs::write(&filename, b"XFSB").unwrap();

    dmzadm()
        .args(["reset-zones", "--force"])
        .arg(&filename)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a block device"));
    assert_eq!(fs::read(&filename).unwrap(), b"XFSB");
}
