// vim: tw=80
//! Functional tests of dmz-core, using file-backed disks

use std::{fs, path::PathBuf};

use tempfile::{Builder, TempDir};

use dmz_core::{disk::BlockFile, BackendDevice, Geometry};

/// Create `sizes.len()` sparse files of the given sizes in sectors, and open
/// each as a regular backend.
fn file_backends(prefix: &str, sizes: &[u64])
    -> (TempDir, Vec<PathBuf>, Vec<BackendDevice>)
{
    let tempdir = Builder::new()
        .prefix(prefix)
        .tempdir()
        .unwrap();
    let paths = sizes.iter().enumerate().map(|(i, &size)| {
        let path = tempdir.path().join(format!("disk.{i}"));
        let file = fs::File::create(&path).unwrap();
        file.set_len(size * 512).unwrap();
        path
    }).collect::<Vec<_>>();
    let backends = paths.iter().zip(sizes.iter()).map(|(path, &size)| {
        let disk = BlockFile::open(path).unwrap();
        BackendDevice::new(path, Box::new(disk), Geometry::regular(size))
    }).collect::<Vec<_>>();
    (tempdir, paths, backends)
}

mod composite;
mod metadata_io;
mod safety;
