// vim: tw=80
//! Runtime settings for opening backends and composites

use std::path::{Path, PathBuf};

use crate::sysfs::Sysfs;

/// Where to find the kernel's view of the system, and how careful to be.
///
/// # Examples
///
/// ```
/// use dmz_core::Config;
///
/// let config = Config::default()
///     .zone_sectors(Some(65_536))
///     .force(true);
/// assert!(config.is_forced());
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    sysfs_root: PathBuf,
    mount_table: PathBuf,
    zone_sectors: Option<u64>,
    force: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sysfs_root: PathBuf::from("/sys"),
            mount_table: PathBuf::from("/proc/mounts"),
            zone_sectors: None,
            force: false,
        }
    }
}

impl Config {
    /// Overwrite existing content without complaint
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn is_forced(&self) -> bool {
        self.force
    }

    pub fn mount_table<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.mount_table = path.into();
        self
    }

    pub fn mount_table_path(&self) -> &Path {
        &self.mount_table
    }

    pub fn sysfs_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.sysfs_root = path.into();
        self
    }

    pub fn sysfs(&self) -> Sysfs {
        Sysfs::new(self.sysfs_root.clone())
    }

    /// Zone size, in sectors, for a composite with no zoned backends.
    /// Ignored when any backend is zoned.
    pub fn zone_sectors(mut self, zone_sectors: Option<u64>) -> Self {
        self.zone_sectors = zone_sectors;
        self
    }

    pub fn configured_zone_sectors(&self) -> Option<u64> {
        self.zone_sectors
    }
}

// LCOV_EXCL_STOP
