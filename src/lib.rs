//! Key-addressed files on erase-before-write block storage.
//!
//! Files are chains of fixed-size blocks, found by a 7-bit key stored in the
//! head block's header. No heap, no threads, no filesystem underneath: the
//! host supplies a [`BlockStore`] and the engine does the rest.
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod fs;
pub mod header;
#[cfg(feature = "nor-flash")]
pub mod nor;
pub mod scan;
pub mod shared;
pub mod store;

pub use crate::error::{Error, Result};
pub use crate::fs::{LightFs, Mode};
pub use crate::header::Key;
#[cfg(feature = "nor-flash")]
pub use crate::nor::NorFlashStore;
pub use crate::shared::SharedFs;
pub use crate::store::{BlockStore, Geometry, RamStore};
