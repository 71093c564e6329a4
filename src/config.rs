//! On-media layout constants.

/// Size of the header at offset 0 of every block: `info`, `next` (u16 LE), `used` (u16 LE).
pub const HEADER_SIZE: u16 = 5;

/// `info` byte of an erased, unclaimed block.
pub const FREE: u8 = 0xFF;

/// High bit of `info`: block is the head of a chain.
pub const HEAD_FLAG: u8 = 0x80;

/// Low 7 bits of `info` carry the key.
pub const KEY_MASK: u8 = 0x7F;

/// Largest usable key. 127 with the head bit set would read as [`FREE`].
pub const MAX_KEY: u8 = 126;

/// `next` value of the last block of a chain. Also never a valid block count.
pub const BLOCK_NONE: u16 = 0xFFFF;
