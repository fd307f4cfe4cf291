// vim: tw=80
//! Raw access to one backend device: positioned I/O, capacity, and the zoned
//! block device ioctls.

use cfg_if::cfg_if;
#[cfg(test)] use mockall::automock;
use std::{
    fmt,
    fs::{File, OpenOptions},
    io,
    os::unix::fs::FileTypeExt,
    path::Path,
};

use crate::types::LocalSector;

/// Size of the buffer used for one zone report query.
pub const REPORT_ZONES_BUFSZ: usize = 524_288;

/// Maximum number of zone records returned by one zone report query.
pub const REPORT_ZONES_MAX: u32 = ((REPORT_ZONES_BUFSZ - ffi::REPORT_HDR_SIZE)
                                  / ffi::ZONE_SIZE) as u32;

/// FFI definitions from `<linux/blkzoned.h>` and `<linux/fs.h>`.  The ioctls
/// can't go in libc because they use Nix's macros.
#[doc(hidden)]
#[allow(non_camel_case_types)]
mod ffi {
    use nix::{ioctl_read, ioctl_readwrite, ioctl_write_ptr};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default)]
    pub struct blk_zone {
        pub start: u64,
        pub len: u64,
        pub wp: u64,
        pub type_: u8,
        pub cond: u8,
        pub non_seq: u8,
        pub reset: u8,
        pub resv: [u8; 4],
        pub capacity: u64,
        pub reserved: [u8; 24],
    }

    #[repr(C)]
    #[derive(Debug)]
    pub struct blk_zone_report {
        pub sector: u64,
        pub nr_zones: u32,
        pub flags: u32,
    }

    #[repr(C)]
    #[derive(Debug)]
    pub struct blk_zone_range {
        pub sector: u64,
        pub nr_sectors: u64,
    }

    pub const REPORT_HDR_SIZE: usize = std::mem::size_of::<blk_zone_report>();
    pub const ZONE_SIZE: usize = std::mem::size_of::<blk_zone>();

    ioctl_read! {
        /// Get the size of a block device in bytes
        blkgetsize64, 0x12, 114, u64
    }

    ioctl_readwrite! {
        /// Report the zones of a zoned block device, starting at a sector
        blkreportzone, 0x12, 130, blk_zone_report
    }

    ioctl_write_ptr! {
        /// Reset the write pointers of a range of zones
        blkresetzone, 0x12, 131, blk_zone_range
    }
}

/// One record of a zone report, in the reporting device's own address space.
///
/// The type and condition are the kernel's raw codes; they are decoded and
/// validated by the zone topology builder.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReportedZone {
    pub start: LocalSector,
    /// Length in sectors
    pub len: u64,
    pub wp: LocalSector,
    /// Usable sectors.  Zero if the kernel doesn't report zone capacity.
    pub capacity: u64,
    pub zone_type: u8,
    pub cond: u8,
    pub non_seq: bool,
    pub reset: bool,
}

impl From<&ffi::blk_zone> for ReportedZone {
    fn from(z: &ffi::blk_zone) -> Self {
        ReportedZone {
            start: LocalSector(z.start),
            len: z.len,
            wp: LocalSector(z.wp),
            capacity: z.capacity,
            zone_type: z.type_,
            cond: z.cond,
            non_seq: z.non_seq != 0,
            reset: z.reset != 0,
        }
    }
}

/// Everything the abstraction layer needs from one physical device.
///
/// All methods block until completion.
#[cfg_attr(test, automock)]
pub trait Disk: fmt::Debug {
    /// Size of the device in bytes
    fn capacity(&self) -> io::Result<u64>;

    /// Read into `buf` from byte `offset`.  Returns the number of bytes read.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Report up to `max_zones` zones, starting with the one containing
    /// `sector`.
    fn report_zones(&self, sector: LocalSector, max_zones: u32)
        -> io::Result<Vec<ReportedZone>>;

    /// Reset the write pointer of every zone within the given range.
    fn reset_zones(&self, sector: LocalSector, nr_sectors: u64)
        -> io::Result<()>;

    /// Flush the device's write cache
    fn sync_all(&self) -> io::Result<()>;

    /// Write `buf` at byte `offset`.  Returns the number of bytes written.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;
}

/// `BlockFile`: `Disk` implementation for a device node
///
/// It also works with regular files, which have no zones.
#[derive(Debug)]
pub struct BlockFile {
    file: File,
}

impl BlockFile {
    /// Open a device for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(|file| BlockFile { file })
    }

    fn is_block_device(&self) -> io::Result<bool> {
        Ok(self.file.metadata()?.file_type().is_block_device())
    }
}

cfg_if! {
    if #[cfg(target_os = "linux")] {
        use std::{mem, os::unix::io::AsRawFd, slice};

        impl BlockFile {
            fn blkgetsize64(&self) -> io::Result<u64> {
                let mut size = 0u64;
                unsafe {
                    ffi::blkgetsize64(self.file.as_raw_fd(), &mut size)
                }?;
                Ok(size)
            }

            fn blkreportzone(&self, sector: LocalSector, max_zones: u32)
                -> io::Result<Vec<ReportedZone>>
            {
                let max_zones = max_zones.min(REPORT_ZONES_MAX) as usize;
                let len = ffi::REPORT_HDR_SIZE + max_zones * ffi::ZONE_SIZE;
                // Use a u64 buffer so the header and records are aligned
                let mut buf = vec![0u64; len / mem::size_of::<u64>()];
                let rep = buf.as_mut_ptr() as *mut ffi::blk_zone_report;
                let nr_zones = unsafe {
                    (*rep).sector = sector.0;
                    (*rep).nr_zones = max_zones as u32;
                    ffi::blkreportzone(self.file.as_raw_fd(), rep)?;
                    (*rep).nr_zones as usize
                };
                // Never trust the kernel to stay within the buffer
                let nr_zones = nr_zones.min(max_zones);
                let zones = unsafe {
                    // Safe because buf holds max_zones records after the
                    // header, and outlives this borrow.
                    let first = rep.add(1) as *const ffi::blk_zone;
                    slice::from_raw_parts(first, nr_zones)
                };
                Ok(zones.iter().map(ReportedZone::from).collect())
            }

            fn blkresetzone(&self, sector: LocalSector, nr_sectors: u64)
                -> io::Result<()>
            {
                let range = ffi::blk_zone_range {
                    sector: sector.0,
                    nr_sectors
                };
                unsafe {
                    ffi::blkresetzone(self.file.as_raw_fd(), &range)
                }?;
                Ok(())
            }
        }
    } else {
        impl BlockFile {
            fn blkgetsize64(&self) -> io::Result<u64> {
                Err(nix::Error::ENOTTY.into())
            }

            fn blkreportzone(&self, _sector: LocalSector, _max_zones: u32)
                -> io::Result<Vec<ReportedZone>>
            {
                Err(nix::Error::ENOTTY.into())
            }

            fn blkresetzone(&self, _sector: LocalSector, _nr_sectors: u64)
                -> io::Result<()>
            {
                Err(nix::Error::ENOTTY.into())
            }
        }
    }
}

impl Disk for BlockFile {
    fn capacity(&self) -> io::Result<u64> {
        if self.is_block_device()? {
            self.blkgetsize64()
        } else {
            Ok(self.file.metadata()?.len())
        }
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        nix::sys::uio::pread(&self.file, buf, offset as libc::off_t)
            .map_err(io::Error::from)
    }

    fn report_zones(&self, sector: LocalSector, max_zones: u32)
        -> io::Result<Vec<ReportedZone>>
    {
        self.blkreportzone(sector, max_zones)
    }

    fn reset_zones(&self, sector: LocalSector, nr_sectors: u64)
        -> io::Result<()>
    {
        self.blkresetzone(sector, nr_sectors)
    }

    fn sync_all(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        nix::sys::uio::pwrite(&self.file, buf, offset as libc::off_t)
            .map_err(io::Error::from)
    }
}

// LCOV_EXCL_STOP
