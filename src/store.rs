//! Block store abstraction.
//!
//! The engine sits on top of a flat array of fixed-size erasable blocks.

use log::trace;

use crate::error::{Error, Result};

/// Fixed geometry reported by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_count: u16,
    /// Block size in bytes, header included.
    pub block_size: u16,
}

/// A block-addressed, erase-before-write device.
///
/// Implementations report low-level failures as [`Error::Failed`]; the engine
/// never retries. Typical implementations:
/// - a NOR/NAND driver (see `NorFlashStore` behind the `nor-flash` feature)
/// - an NVS region
/// - [`RamStore`] for tests and simulation
pub trait BlockStore {
    /// Report the fixed geometry. Called once, at engine init.
    fn geometry(&mut self) -> Result<Geometry>;

    /// Read `buf.len()` bytes from `block` starting at `offset`.
    fn read(&mut self, block: u16, offset: u16, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` into `block` at `offset`.
    ///
    /// `flush` is set for header commits, which must be durable on return.
    /// Payload writes pass `false`; a header commit always follows them.
    fn write(&mut self, block: u16, offset: u16, buf: &[u8], flush: bool) -> Result<()>;

    /// Erase `block`. Its header must read as free afterwards.
    fn erase(&mut self, block: u16) -> Result<()>;
}

impl<T: BlockStore + ?Sized> BlockStore for &mut T {
    fn geometry(&mut self) -> Result<Geometry> {
        (**self).geometry()
    }

    fn read(&mut self, block: u16, offset: u16, buf: &mut [u8]) -> Result<()> {
        (**self).read(block, offset, buf)
    }

    fn write(&mut self, block: u16, offset: u16, buf: &[u8], flush: bool) -> Result<()> {
        (**self).write(block, offset, buf, flush)
    }

    fn erase(&mut self, block: u16) -> Result<()> {
        (**self).erase(block)
    }
}

/// Flash simulator over a caller-owned byte slice.
///
/// Behaves like NOR: a write can only clear bits (new = old & data) and an
/// erase sets the whole block back to `0xFF`. Start from a slice filled
/// with `0xFF` for a blank device.
pub struct RamStore<'a> {
    mem: &'a mut [u8],
    geometry: Geometry,
}

impl<'a> RamStore<'a> {
    /// Wrap `mem` as `block_count` blocks of `block_size` bytes.
    pub fn new(mem: &'a mut [u8], block_count: u16, block_size: u16) -> Result<Self> {
        if mem.len() < block_count as usize * block_size as usize {
            return Err(Error::InvalidConfig);
        }
        Ok(Self {
            mem,
            geometry: Geometry {
                block_count,
                block_size,
            },
        })
    }

    /// Raw contents, for inspecting the on-media image.
    pub fn as_bytes(&self) -> &[u8] {
        self.mem
    }

    /// Byte range of `len` bytes at `offset` inside `block`, if in bounds.
    fn span(&self, block: u16, offset: u16, len: usize) -> Result<core::ops::Range<usize>> {
        let size = self.geometry.block_size as usize;
        if block >= self.geometry.block_count || offset as usize + len > size {
            return Err(Error::Failed);
        }
        let start = block as usize * size + offset as usize;
        Ok(start..start + len)
    }
}

impl BlockStore for RamStore<'_> {
    fn geometry(&mut self) -> Result<Geometry> {
        Ok(self.geometry)
    }

    fn read(&mut self, block: u16, offset: u16, buf: &mut [u8]) -> Result<()> {
        let span = self.span(block, offset, buf.len())?;
        buf.copy_from_slice(&self.mem[span]);
        Ok(())
    }

    fn write(&mut self, block: u16, offset: u16, buf: &[u8], flush: bool) -> Result<()> {
        let span = self.span(block, offset, buf.len())?;
        trace!("ram write block {block} offset {offset} len {} flush {flush}", buf.len());
        for (cell, byte) in self.mem[span].iter_mut().zip(buf) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn erase(&mut self, block: u16) -> Result<()> {
        let span = self.span(block, 0, self.geometry.block_size as usize)?;
        self.mem[span].fill(0xFF);
        Ok(())
    }
}
