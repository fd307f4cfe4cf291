// vim: tw=80
//! Read-only access to the block layer's sysfs attributes

use std::{
    fmt,
    fs,
    io,
    path::{Path, PathBuf},
};

use crate::types::{DeviceError, Result};

/// Identifies another block-layer consumer holding a device, such as a
/// device-mapper target.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct HolderId(pub String);

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A sysfs tree.  Normally mounted at `/sys`.
#[derive(Clone, Debug)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Sysfs::new("/sys")
    }
}

impl Sysfs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Sysfs { root: root.into() }
    }

    /// Path to a per-disk attribute.  Only whole disks live under `block/`.
    fn block_attr(&self, name: &str, attr: &str) -> PathBuf {
        self.root.join("block").join(name).join(attr)
    }

    /// Path to a per-device attribute.  Both disks and partitions live under
    /// `class/block/`.
    fn class_attr(&self, name: &str, attr: &str) -> PathBuf {
        self.root.join("class/block").join(name).join(attr)
    }

    /// Read the first whitespace-delimited word of an attribute file.
    fn read_word(&self, name: &str, attr: PathBuf) -> Result<String> {
        let s = fs::read_to_string(&attr)
            .map_err(|source| DeviceError::Attribute {
                device: name.to_owned(),
                attr: attr.clone(),
                source
            })?;
        match s.split_whitespace().next() {
            Some(w) => Ok(w.to_owned()),
            None => Err(DeviceError::AttributeFormat {
                device: name.to_owned(),
                attr
            }.into())
        }
    }

    /// Does `name` refer to a partition rather than a whole disk?
    pub fn is_partition(&self, name: &str) -> Result<bool> {
        let attr = self.class_attr(name, "partition");
        match fs::metadata(&attr) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(DeviceError::Attribute {
                device: name.to_owned(),
                attr,
                source
            }.into())
        }
    }

    /// The disk's zoned model, such as "none", "host-aware" or
    /// "host-managed".
    pub fn zoned_model(&self, name: &str) -> Result<String> {
        self.read_word(name, self.block_attr(name, "queue/zoned"))
    }

    /// The disk's zone size, in 512-byte sectors.
    pub fn chunk_sectors(&self, name: &str) -> Result<u64> {
        let attr = self.block_attr(name, "queue/chunk_sectors");
        let w = self.read_word(name, attr.clone())?;
        w.parse::<u64>()
            .map_err(|_| DeviceError::AttributeFormat {
                device: name.to_owned(),
                attr
            }.into())
    }

    /// Every consumer currently holding the device, sorted by name.
    pub fn holders(&self, name: &str) -> Result<Vec<HolderId>> {
        let dir = self.class_attr(name, "holders");
        let map_err = |source| DeviceError::Attribute {
            device: name.to_owned(),
            attr: dir.clone(),
            source
        };
        let mut holders = fs::read_dir(&dir)
            .map_err(map_err)?
            .map(|entry| {
                entry.map(|e| HolderId(e.file_name().to_string_lossy().into()))
            }).collect::<io::Result<Vec<_>>>()
            .map_err(map_err)?;
        holders.sort();
        Ok(holders)
    }

    /// Is the disk a device-mapper device?
    pub fn is_dm(&self, name: &str) -> bool {
        self.block_attr(name, "dm/name").exists()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

// LCOV_EXCL_STOP
