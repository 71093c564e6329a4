//! [`BlockStore`] over an `embedded-storage` NOR flash driver.
//!
//! Each block is one erase sector. The engine writes headers and payload at
//! arbitrary byte offsets, so the driver must be byte-granular for reads and
//! writes (`READ_SIZE == WRITE_SIZE == 1`).

use embedded_storage::nor_flash::{NorFlash, NorFlashError, ReadNorFlash};
use log::{trace, warn};

use crate::error::{Error, Result};
use crate::store::{BlockStore, Geometry};

pub struct NorFlashStore<F> {
    flash: F,
    /// Flash offset of block 0. Sector aligned.
    base: u32,
    geometry: Geometry,
}

impl<F: NorFlash> NorFlashStore<F> {
    /// Use `block_count` sectors of `flash` starting at `base`.
    pub fn new(flash: F, base: u32, block_count: u16) -> Result<Self> {
        let block_size = u16::try_from(F::ERASE_SIZE).map_err(|_| Error::InvalidConfig)?;
        if F::READ_SIZE != 1 || F::WRITE_SIZE != 1 {
            warn!(
                "flash is not byte addressable (read {}, write {})",
                F::READ_SIZE,
                F::WRITE_SIZE
            );
            return Err(Error::InvalidConfig);
        }
        let end = base as usize + block_count as usize * F::ERASE_SIZE;
        if base as usize % F::ERASE_SIZE != 0 || end > flash.capacity() {
            return Err(Error::InvalidConfig);
        }
        Ok(Self {
            flash,
            base,
            geometry: Geometry {
                block_count,
                block_size,
            },
        })
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Flash address of `len` bytes at `offset` in `block`, if they fit in the block.
    fn addr(&self, block: u16, offset: u16, len: usize) -> Result<u32> {
        if block >= self.geometry.block_count
            || offset as usize + len > self.geometry.block_size as usize
        {
            return Err(Error::Failed);
        }
        Ok(self.base + block as u32 * self.geometry.block_size as u32 + offset as u32)
    }
}

fn failed<E: NorFlashError>(op: &str, err: E) -> Error {
    warn!("flash {op} failed: {:?}", err.kind());
    Error::Failed
}

impl<F: NorFlash> BlockStore for NorFlashStore<F> {
    fn geometry(&mut self) -> Result<Geometry> {
        Ok(self.geometry)
    }

    fn read(&mut self, block: u16, offset: u16, buf: &mut [u8]) -> Result<()> {
        let addr = self.addr(block, offset, buf.len())?;
        ReadNorFlash::read(&mut self.flash, addr, buf).map_err(|e| failed("read", e))
    }

    fn write(&mut self, block: u16, offset: u16, buf: &[u8], flush: bool) -> Result<()> {
        let addr = self.addr(block, offset, buf.len())?;
        // NOR writes are durable on return, flush needs no extra step.
        trace!("flash write {addr:#x} len {} flush {flush}", buf.len());
        NorFlash::write(&mut self.flash, addr, buf).map_err(|e| failed("write", e))
    }

    fn erase(&mut self, block: u16) -> Result<()> {
        let from = self.addr(block, 0, self.geometry.block_size as usize)?;
        let to = from + self.geometry.block_size as u32;
        NorFlash::erase(&mut self.flash, from, to).map_err(|e| failed("erase", e))
    }
}
