// vim: tw=80
//! Detection of existing content on a device that is about to be formatted.
//!
//! This is a small, read-only subset of what `blkid` knows about: enough to
//! recognize the filesystems and partition tables that are likely to be found
//! on a disk that somebody is about to reformat by mistake.

use std::{
    fmt,
    io::{self, Read},
};

/// What was found on a device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signature {
    Filesystem(&'static str),
    PartitionTable(&'static str),
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Filesystem(t) => write!(f, "an existing filesystem ({t})"),
            Self::PartitionTable(t) => write!(f, "a partition table ({t})"),
        }
    }
}

/// A fixed magic string at a fixed byte offset.
struct Magic {
    sig: Signature,
    offset: usize,
    magic: &'static [u8],
}

/// Checked in order.  Filesystems come before partition tables, because some
/// filesystems (FAT, NTFS) carry the same boot signature as an MBR.
const MAGICS: &[Magic] = &[
    Magic {
        sig: Signature::Filesystem("xfs"),
        offset: 0,
        magic: b"XFSB"
    },
    Magic {
        // dm-zoned super block magic, "DZBD" stored little-endian
        sig: Signature::Filesystem("dm-zoned"),
        offset: 0,
        magic: b"DBZD"
    },
    Magic {
        sig: Signature::Filesystem("btrfs"),
        offset: 0x10040,
        magic: b"_BHRfS_M"
    },
    Magic {
        sig: Signature::Filesystem("f2fs"),
        offset: 0x400,
        magic: &[0x10, 0x20, 0xf5, 0xf2]
    },
    Magic {
        sig: Signature::Filesystem("exfat"),
        offset: 3,
        magic: b"EXFAT   "
    },
    Magic {
        sig: Signature::Filesystem("ntfs"),
        offset: 3,
        magic: b"NTFS    "
    },
    Magic {
        sig: Signature::Filesystem("vfat"),
        offset: 0x36,
        magic: b"FAT12   "
    },
    Magic {
        sig: Signature::Filesystem("vfat"),
        offset: 0x36,
        magic: b"FAT16   "
    },
    Magic {
        sig: Signature::Filesystem("vfat"),
        offset: 0x52,
        magic: b"FAT32   "
    },
    Magic {
        sig: Signature::Filesystem("swap"),
        offset: 4096 - 10,
        magic: b"SWAPSPACE2"
    },
    Magic {
        sig: Signature::Filesystem("swap"),
        offset: 4096 - 10,
        magic: b"SWAP-SPACE"
    },
    Magic {
        sig: Signature::Filesystem("LVM2_member"),
        offset: 0x218,
        magic: b"LVM2 001"
    },
    Magic {
        sig: Signature::Filesystem("iso9660"),
        offset: 0x8001,
        magic: b"CD001"
    },
    Magic {
        sig: Signature::PartitionTable("gpt"),
        offset: 0x200,
        magic: b"EFI PART"
    },
];

/// Number of bytes from the start of the device that must be examined to
/// check every known signature.
pub const PROBE_LEN: usize = 0x10040 + 8;

/// Offset of the ext2/3/4 super block
const EXT_SB: usize = 0x400;
const EXT_MAGIC: [u8; 2] = [0x53, 0xef];
const EXT_COMPAT_HAS_JOURNAL: u32 = 0x4;
const EXT_INCOMPAT_EXT4: u32 = 0x40 | 0x80 | 0x200;    // extents|64bit|flex_bg

/// Offset of the MBR partition entries and boot signature
const MBR_PARTS: usize = 0x1be;
const MBR_SIG: usize = 0x1fe;

fn le32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

fn probe_ext(buf: &[u8]) -> Option<Signature> {
    if buf.len() < EXT_SB + 0x68 ||
        buf[EXT_SB + 0x38..EXT_SB + 0x3a] != EXT_MAGIC
    {
        return None;
    }
    let compat = le32(buf, EXT_SB + 0x5c);
    let incompat = le32(buf, EXT_SB + 0x60);
    let t = if incompat & EXT_INCOMPAT_EXT4 != 0 {
        "ext4"
    } else if compat & EXT_COMPAT_HAS_JOURNAL != 0 {
        "ext3"
    } else {
        "ext2"
    };
    Some(Signature::Filesystem(t))
}

fn probe_mbr(buf: &[u8]) -> Option<Signature> {
    if buf.len() < MBR_SIG + 2 || buf[MBR_SIG..MBR_SIG + 2] != [0x55, 0xaa] {
        return None;
    }
    // An empty partition table is not worth protecting
    let used = (0..4).any(|i| buf[MBR_PARTS + 16 * i + 4] != 0);
    used.then_some(Signature::PartitionTable("dos"))
}

/// Examine a buffer holding (at most) the first [`PROBE_LEN`] bytes of a
/// device.
pub fn detect(buf: &[u8]) -> Option<Signature> {
    probe_ext(buf)
        .or_else(|| {
            MAGICS.iter()
                .find(|m| {
                    buf.get(m.offset..m.offset + m.magic.len()) == Some(m.magic)
                }).map(|m| m.sig)
        }).or_else(|| probe_mbr(buf))
}

/// Read the start of a device and look for known content.
///
/// A device smaller than [`PROBE_LEN`] is examined as far as it goes.
pub fn probe<R: Read>(r: R) -> io::Result<Option<Signature>> {
    let mut buf = Vec::with_capacity(PROBE_LEN);
    r.take(PROBE_LEN as u64).read_to_end(&mut buf)?;
    Ok(detect(&buf))
}

// LCOV_EXCL_STOP
