//! Block header encoding.
//!
//! Every block starts with a 5-byte header:
//!
//! | offset | size | field                                        |
//! |--------|------|----------------------------------------------|
//! | 0      | 1    | `info`: head bit + 7-bit key, or `0xFF` free |
//! | 1      | 2    | `next`: following block, `0xFFFF` for none   |
//! | 3      | 2    | `used`: payload bytes in this block          |
//!
//! Multi-byte fields are little-endian. Payload follows immediately.

use crate::config::{BLOCK_NONE, FREE, HEADER_SIZE, HEAD_FLAG, KEY_MASK, MAX_KEY};
use crate::error::{Error, Result};

/// A file key in `0..=126`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u8);

impl Key {
    /// Validate a raw key.
    pub const fn new(raw: u8) -> Result<Self> {
        if raw > MAX_KEY {
            return Err(Error::InvalidArgs);
        }
        Ok(Self(raw))
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Key {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw)
    }
}

/// What a block's `info` byte says about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Free,
    /// First block of the chain for this key.
    Head(Key),
    /// Any later block of a chain. The key is informational only.
    Link(Key),
}

impl BlockKind {
    pub fn from_info(info: u8) -> Self {
        if info == FREE {
            return Self::Free;
        }
        // Masked raw key may be 127 on a foreign image; kept as-is, never matched.
        let key = Key(info & KEY_MASK);
        if info & HEAD_FLAG != 0 {
            Self::Head(key)
        } else {
            Self::Link(key)
        }
    }

    pub fn info(self) -> u8 {
        match self {
            Self::Free => FREE,
            Self::Head(key) => HEAD_FLAG | key.get(),
            Self::Link(key) => key.get(),
        }
    }

    /// True if this is the head of the chain for `key`.
    pub fn is_head_of(self, key: Key) -> bool {
        matches!(self, Self::Head(k) if k == key)
    }
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub kind: BlockKind,
    /// Following block, `None` on the last block of a chain.
    pub next: Option<u16>,
    /// Payload bytes stored in this block.
    pub used: u16,
}

fn le_u16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

pub(crate) fn decode_next(raw: u16) -> Option<u16> {
    (raw != BLOCK_NONE).then_some(raw)
}

impl BlockHeader {
    pub const SIZE: usize = HEADER_SIZE as usize;

    /// Parse a header from its on-media bytes.
    pub fn parse(raw: &[u8; Self::SIZE]) -> Self {
        Self {
            kind: BlockKind::from_info(raw[0]),
            next: decode_next(le_u16(&raw[1..3])),
            used: le_u16(&raw[3..5]),
        }
    }

    /// Build the on-media bytes of this header.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut raw = [0u8; Self::SIZE];
        raw[0] = self.kind.info();
        raw[1..3].copy_from_slice(&self.next.unwrap_or(BLOCK_NONE).to_le_bytes());
        raw[3..5].copy_from_slice(&self.used.to_le_bytes());
        raw
    }

    pub fn is_free(&self) -> bool {
        self.kind == BlockKind::Free
    }
}
