// vim: tw=80
use assert_cmd::prelude::*;
use predicates::prelude::*;

use super::dmzadm;

mod holder;
mod info;
mod reset_zones;

#[test]
fn version() {
    dmzadm()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("dmzadm "));
}

#[test]
fn no_subcommand() {
    dmzadm()
        .assert()
        .failure();
}
