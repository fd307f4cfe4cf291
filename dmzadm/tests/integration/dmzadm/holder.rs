// vim: tw=80
use assert_cmd::prelude::*;
use predicates::prelude::*;

use super::super::{dmzadm, util::fake_disk};

#[test]
fn not_a_block_device() {
    let (filename, _tempdir) = fake_disk("dmzadm_holder_not_a_block_device");

    dmzadm()
        .arg("holder")
        .arg(&filename)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a block device"));
}
