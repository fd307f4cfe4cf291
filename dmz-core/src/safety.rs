// vim: tw=80
//! Pre-flight checks that gate destructive operations on live devices

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use nix::sys::stat::{stat, SFlag};
use tracing::{debug, warn};

use crate::{
    config::Config,
    mount::{self, MountInfo},
    signature,
    sysfs::{HolderId, Sysfs},
    types::*,
};

/// What the caller intends to do with a device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    Format,
    Check,
    Repair,
    Relabel,
    ResetZones,
}

impl Operation {
    /// Does the operation discard whatever the device currently holds?
    pub fn destroys_content(self) -> bool {
        matches!(self, Operation::Format | Operation::ResetZones)
    }
}

/// Decides whether a device may be opened for an [`Operation`].
#[derive(Debug)]
pub struct SafetyGuard {
    sysfs: Sysfs,
    mount_table: PathBuf,
}

impl SafetyGuard {
    pub fn new(config: &Config) -> Self {
        SafetyGuard {
            sysfs: config.sysfs(),
            mount_table: config.mount_table_path().to_owned(),
        }
    }

    /// Refuse `op` on `path` if it could destroy something in use or worth
    /// keeping.  `force` only overrides the content check.
    pub fn check_destroyable(&self, path: &Path, op: Operation, force: bool)
        -> Result<()>
    {
        let path = canonical_block_device(path)?;
        self.check_candidate(&path, op, force)
    }

    /// Return the first consumer holding the block device at `path`, if any.
    ///
    /// A mounted device is refused outright.
    pub fn holder_of(&self, path: &Path) -> Result<Option<HolderId>> {
        let path = canonical_block_device(path)?;
        self.holder_of_candidate(&path)
    }

    fn holder_of_candidate(&self, path: &Path) -> Result<Option<HolderId>> {
        self.check_unmounted(path)?;
        Ok(self.holders(path)?.into_iter().next())
    }

    /// Everything but the block device check, so it works on any file.
    fn check_candidate(&self, path: &Path, op: Operation, force: bool)
        -> Result<()>
    {
        if op.destroys_content() && !force {
            let f = File::open(path).map_err(|source| {
                SafetyError::ProbeFailed { path: path.to_owned(), source }
            })?;
            let sig = signature::probe(f).map_err(|source| {
                SafetyError::ProbeFailed { path: path.to_owned(), source }
            })?;
            if let Some(kind) = sig {
                return Err(SafetyError::ExistingContent {
                    path: path.to_owned(),
                    kind
                }.into());
            }
        }
        self.check_unmounted(path)?;
        if let Some(holder) = self.holders(path)?.into_iter().next() {
            return Err(SafetyError::Busy {
                path: path.to_owned(),
                holder: holder.0
            }.into());
        }
        debug!(device = %path.display(), ?op, force, "safety checks passed");
        Ok(())
    }

    fn check_unmounted(&self, path: &Path) -> Result<()> {
        match self.mounted(path) {
            Some(mi) => Err(SafetyError::Mounted {
                path: path.to_owned(),
                mount_point: mi.mount_point
            }.into()),
            None => Ok(())
        }
    }

    /// Look `path` up in the mount table.  An unreadable table is treated as
    /// empty.
    fn mounted(&self, path: &Path) -> Option<MountInfo> {
        match mount::find(&self.mount_table, path) {
            Ok(mi) => mi,
            Err(e) => {
                warn!("cannot read mount table {}: {e}",
                      self.mount_table.display());
                None
            }
        }
    }

    fn holders(&self, path: &Path) -> Result<Vec<HolderId>> {
        let name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.sysfs.holders(&name)
    }
}

/// Resolve symlinks in `path` and verify that it names a block device.
fn canonical_block_device(path: &Path) -> Result<PathBuf> {
    let st = stat(path).map_err(|source| DeviceError::Stat {
        path: path.to_owned(),
        source
    })?;
    if SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT != SFlag::S_IFBLK
    {
        return Err(DeviceError::NotABlockDevice {
            path: path.to_owned()
        }.into());
    }
    path.canonicalize().map_err(|source: io::Error| DeviceError::Open {
        path: path.to_owned(),
        source
    }.into())
}

// LCOV_EXCL_STOP
