// vim: tw=80
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;

use super::super::{dmzadm, util::fake_disk};

/// Regular files can't be part of a composite
#[test]
fn not_a_block_device() {
    let (filename, _tempdir) = fake_disk("dmzadm_info_not_a_block_device");

    dmzadm()
        .args(["info", "--zone-size", "65536"])
        .arg(&filename)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("is not a block device"));
}

#[rstest]
#[case(&[][..])]
#[case(&["-v"][..])]
#[case(&["-vv"][..])]
fn enoent(#[case] verbosity: &[&str]) {
    let (filename, _tempdir) = fake_disk("dmzadm_info_enoent");

    dmzadm()
        .args(verbosity)
        .arg("info")
        .arg(filename.with_file_name("nonexistent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("stat failed"));
}
