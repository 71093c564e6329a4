//! Errors for the block-chaining store.

/// Result alias used by this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors returned by the engine and by [`BlockStore`](crate::store::BlockStore) implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Underlying block store I/O error.
    #[error("block store operation failed")]
    Failed,
    /// A chain with this key already exists.
    #[error("key already exists")]
    AlreadyExists,
    /// No chain with this key.
    #[error("key does not exist")]
    NotExists,
    /// No free block left after a full scan.
    #[error("no free block")]
    OutOfMemory,
    /// Reserved. Chaining absorbs writes of any length, so this is never returned.
    #[error("batch too large")]
    BatchTooLarge,
    /// Key outside `0..=126` or an unusable argument.
    #[error("invalid arguments")]
    InvalidArgs,
    /// Geometry reported by the store is unusable.
    #[error("invalid store geometry")]
    InvalidConfig,
    /// Call not allowed in the current session state.
    #[error("invalid session state")]
    InvalidState,
    /// Read past the last byte of the chain.
    #[error("end of file")]
    EndOfFile,
}
