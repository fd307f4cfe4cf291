// vim: tw=80
//! Snapshot of the kernel's mount table

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

/// One line of the mount table
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MountInfo {
    /// The mounted device, or a pseudo name like "proc"
    pub source: PathBuf,
    pub mount_point: PathBuf,
    pub fstype: String,
}

/// Undo the octal escaping that the kernel applies to spaces, tabs, newlines
/// and backslashes in mount table fields.
fn unescape(field: &str) -> String {
    let b = field.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        let escaped = (b[i] == b'\\' && i + 3 < b.len() &&
            b[i + 1..i + 4].iter().all(|c| (b'0'..=b'7').contains(c)))
            .then(|| b[i + 1..i + 4].iter()
                  .fold(0u32, |acc, c| acc * 8 + u32::from(c - b'0')))
            .and_then(|v| u8::try_from(v).ok());
        match escaped {
            Some(c) => {
                out.push(c);
                i += 4;
            }
            None => {
                out.push(b[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse the contents of a mount table in `/proc/mounts` format.
///
/// Malformed lines are skipped.
pub fn parse(contents: &str) -> Vec<MountInfo> {
    contents.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fstype = fields.next()?;
            Some(MountInfo {
                source: PathBuf::from(unescape(source)),
                mount_point: PathBuf::from(unescape(mount_point)),
                fstype: unescape(fstype)
            })
        }).collect()
}

/// Does the mount table entry refer to `device`?
///
/// Mount sources are compared after resolving symlinks, so that for example
/// `/dev/disk/by-id/...` matches the `/dev/sdX` it points to.
fn same_device(source: &Path, device: &Path) -> bool {
    if source == device {
        return true;
    }
    source.is_absolute() &&
        fs::canonicalize(source).is_ok_and(|s| s == device)
}

/// Look up `device` in the mount table stored at `table`.
///
/// `device` should already be canonicalized.
pub fn find(table: &Path, device: &Path) -> io::Result<Option<MountInfo>> {
    let contents = fs::read_to_string(table)?;
    Ok(parse(&contents).into_iter()
        .find(|mi| same_device(&mi.source, device)))
}

// LCOV_EXCL_STOP
