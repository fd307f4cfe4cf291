// vim: tw=80
use std::{fs, path::PathBuf, process::Command};

use assert_cmd::prelude::*;
use tempfile::{Builder, TempDir};

pub fn dmzadm() -> Command {
    Command::cargo_bin("dmzadm").unwrap()
}

/// A regular file standing in for a disk
pub fn fake_disk(prefix: &str) -> (PathBuf, TempDir) {
    let tempdir = Builder::new()
        .prefix(prefix)
        .tempdir()
        .unwrap();
    let filename = tempdir.path().join("disk");
    let file = fs::File::create(&filename).unwrap();
    file.set_len(1 << 26).unwrap();
    (filename, tempdir)
}
