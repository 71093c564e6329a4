//! Block scanning and header I/O.

use log::trace;

use crate::config::{FREE, HEADER_SIZE};
use crate::error::Result;
use crate::header::{decode_next, BlockHeader, BlockKind, Key};
use crate::store::BlockStore;

/// Head block found by [`Scanner::find_head`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub block: u16,
    /// Only filled when the full header was requested.
    pub next: Option<u16>,
    pub used: u16,
}

/// Round-robin block scanner.
///
/// The cursor persists across calls and is shared by every scan, so
/// successive allocations spread over the whole store instead of always
/// restarting at block 0.
#[derive(Debug, Clone)]
pub struct Scanner {
    cursor: u16,
    block_count: u16,
    /// Last block handed out by [`find_free`](Self::find_free) whose header
    /// has not been committed yet. Its `info` byte still reads free.
    reserved: Option<u16>,
}

impl Scanner {
    pub fn new(block_count: u16) -> Self {
        Self {
            cursor: 0,
            block_count,
            reserved: None,
        }
    }

    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn reserved(&self) -> Option<u16> {
        self.reserved
    }

    /// Return the current candidate and move the cursor on, wrapping at the end.
    fn probe(&mut self) -> u16 {
        let block = self.cursor;
        self.cursor += 1;
        if self.cursor >= self.block_count {
            self.cursor = 0;
        }
        block
    }

    /// Find a block whose header reads free, skipping the reserved one.
    ///
    /// Gives up after one full revolution.
    pub fn find_free<S: BlockStore>(&mut self, store: &mut S) -> Result<Option<u16>> {
        for _ in 0..self.block_count {
            let block = self.probe();
            if self.reserved == Some(block) {
                continue;
            }
            if read_info(store, block)? == FREE {
                trace!("reserved free block {block}");
                self.reserved = Some(block);
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    /// Find the head block of `key`.
    ///
    /// With `full_header` the whole header is read on each probe and the
    /// match carries its `next` and `used` fields.
    pub fn find_head<S: BlockStore>(
        &mut self,
        store: &mut S,
        key: Key,
        full_header: bool,
    ) -> Result<Option<Found>> {
        for _ in 0..self.block_count {
            let block = self.probe();
            if full_header {
                let header = read_header(store, block)?;
                if header.kind.is_head_of(key) {
                    return Ok(Some(Found {
                        block,
                        next: header.next,
                        used: header.used,
                    }));
                }
            } else {
                let info = read_info(store, block)?;
                if BlockKind::from_info(info).is_head_of(key) {
                    return Ok(Some(Found {
                        block,
                        next: None,
                        used: 0,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Drop the reservation of `block` once its header is on media.
    pub fn release(&mut self, block: u16) {
        if self.reserved == Some(block) {
            self.reserved = None;
        }
    }

    /// Drop any reservation, committed or not.
    pub fn forget(&mut self) {
        self.reserved = None;
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.reserved = None;
    }
}

/// Read only the `info` byte of `block`.
pub fn read_info<S: BlockStore>(store: &mut S, block: u16) -> Result<u8> {
    let mut info = [0u8; 1];
    store.read(block, 0, &mut info)?;
    Ok(info[0])
}

pub fn read_header<S: BlockStore>(store: &mut S, block: u16) -> Result<BlockHeader> {
    let mut raw = [0u8; BlockHeader::SIZE];
    store.read(block, 0, &mut raw)?;
    Ok(BlockHeader::parse(&raw))
}

/// Read only the `next` field of `block`.
pub fn read_next<S: BlockStore>(store: &mut S, block: u16) -> Result<Option<u16>> {
    let mut raw = [0u8; 2];
    store.read(block, 1, &mut raw)?;
    Ok(decode_next(u16::from_le_bytes(raw)))
}

/// Write `header` to `block` with flush. This is what makes a block occupied.
pub fn commit<S: BlockStore>(
    store: &mut S,
    scanner: &mut Scanner,
    block: u16,
    header: &BlockHeader,
) -> Result<()> {
    trace!("commit block {block}: {header:?}");
    store.write(block, 0, &header.to_bytes(), true)?;
    scanner.release(block);
    Ok(())
}

/// Byte offset of payload position `cursor` within a block.
pub fn payload_offset(cursor: u16) -> u16 {
    HEADER_SIZE + cursor
}
