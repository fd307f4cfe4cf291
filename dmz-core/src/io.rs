// vim: tw=80
//! Metadata block I/O across the composite address space

use tracing::info;

use crate::{
    backend::BackendDevice,
    composite::CompositeDevice,
    types::*,
    util::BLOCK_SIZE,
};

impl CompositeDevice {
    fn locate_io(&self, block: CompositeBlock, len: usize)
        -> Result<(&BackendDevice, LocalBlock)>
    {
        if len != BLOCK_SIZE {
            return Err(IoError::BufferSize { len }.into());
        }
        self.locate_block(block)
            .ok_or_else(|| IoError::OutOfRange {
                block,
                nr_blocks: self.nr_blocks()
            }.into())
    }

    /// Read one metadata block.  `buf` must be exactly one block long.
    #[tracing::instrument(skip(self, buf))]
    pub fn read_block(&self, block: CompositeBlock, buf: &mut [u8])
        -> Result<()>
    {
        let (bd, lb) = self.locate_io(block, buf.len())?;
        let n = bd.disk()?.read_at(buf, lb.byte_offset())
            .map_err(|source| IoError::Read {
                device: bd.name().to_owned(),
                block: lb,
                source
            })?;
        if n != BLOCK_SIZE {
            return Err(IoError::ShortRead {
                device: bd.name().to_owned(),
                block: lb,
                len: n
            }.into());
        }
        Ok(())
    }

    /// Write one metadata block.  `buf` must be exactly one block long.
    #[tracing::instrument(skip(self, buf))]
    pub fn write_block(&self, block: CompositeBlock, buf: &[u8]) -> Result<()>
    {
        let (bd, lb) = self.locate_io(block, buf.len())?;
        let n = bd.disk()?.write_at(buf, lb.byte_offset())
            .map_err(|source| IoError::Write {
                device: bd.name().to_owned(),
                block: lb,
                source
            })?;
        if n != BLOCK_SIZE {
            return Err(IoError::ShortWrite {
                device: bd.name().to_owned(),
                block: lb,
                len: n
            }.into());
        }
        Ok(())
    }

    /// Flush every backend's write cache, in order.  Stops at the first
    /// failure.
    #[tracing::instrument(skip(self))]
    pub fn sync(&self) -> Result<()> {
        info!("Syncing disk{}", if self.backends().len() > 1 { "s" } else { "" });
        for bd in self.backends() {
            bd.disk()?.sync_all()
                .map_err(|source| IoError::Flush {
                    device: bd.name().to_owned(),
                    source
                })?;
        }
        Ok(())
    }
}

// LCOV_EXCL_STOP
