//! Error kinds surfaced by the core, per the error handling design.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the codec, storage layer, and traversal engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Point lookup of a missing id, or a terminal `one` on an empty pipeline
    /// without a default.
    #[error("not found: {0}")]
    NotFound(u64),

    /// Internal invariant violation during index maintenance. Indicates
    /// corruption: an index row was about to be written where one already
    /// existed for a different entity.
    #[error("duplicate key during index maintenance: {0}")]
    DuplicateKey(String),

    /// decode encountered an unknown type tag or a truncated body. Indicates
    /// corruption of the on-disk format.
    #[error("codec error: {0}")]
    Codec(String),

    /// A text/bytes property value contained NUL, a sort key raised, or
    /// `keys()` was asked for a property name with no defined ordering.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying KV engine failed. Not retried at this layer.
    #[error("storage error: {0}")]
    StorageError(#[from] sled::Error),

    /// msgpack (de)serialization of a property map failed.
    #[error("msgpack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}
