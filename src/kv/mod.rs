//! Thin contract over the underlying ordered KV engine (spec §4.2).
//!
//! No other component talks to the engine directly: the entity store and
//! everything above it goes through [`KvEngine`]. A single implementation
//! ([`sled::SledEngine`]) is provided; the engine choice itself is an
//! external collaborator per spec §1, and this trait is the seam where a
//! different one would plug in.

pub mod sled;

pub use self::sled::{DbConfig, SledEngine};

use crate::error::Result;

/// One operation in an atomic [`KvEngine::batch`] call.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl BatchOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self { BatchOp::Put(key.into(), value.into()) }
    pub fn delete(key: impl Into<Vec<u8>>) -> Self { BatchOp::Delete(key.into()) }
}

/// A lazy forward cursor over keys in `[start, end)` of one logical table.
///
/// Cursors are scarce and must be recycled: an implementation pools its
/// cursor state per table, and dropping a cursor (whether drained or
/// abandoned mid-scan) returns it to that pool. Callers never need to call
/// anything to release one — `Drop` does it, which is what guarantees
/// release on every exit path (success, error, or early `break`).
pub trait Cursor: Send {
    /// Reposition this cursor at the first key >= `key`, replacing its
    /// current scan position.
    fn seek_at_or_after(&mut self, key: &[u8]) -> Result<()>;

    /// Advance to the next entry. Returns `false` once the scan is
    /// exhausted; the cursor is then positioned "off the end" and `key`/
    /// `value` return `None` until `reset` or `seek_at_or_after` is called.
    fn advance(&mut self) -> Result<bool>;

    /// The key at the current position, or `None` if not positioned on an
    /// entry (before the first `advance`, or past the last).
    fn key(&self) -> Option<&[u8]>;

    /// The value at the current position.
    fn value(&self) -> Option<&[u8]>;

    /// Reposition this cursor back at the start of its original range.
    fn reset(&mut self) -> Result<()>;
}

/// Minimal contract over the ordered KV engine: point get/put/delete,
/// prefix/range scans, atomic write batches, and append-mode id allocation.
pub trait KvEngine: Send + Sync {
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Idempotent on value equality.
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete of an absent key is a no-op.
    fn delete(&self, table: &str, key: &[u8]) -> Result<()>;

    /// Open a cursor over `[start, end)`. `end = None` scans to the end of
    /// the table.
    fn scan(&self, table: &str, start: Vec<u8>, end: Option<Vec<u8>>) -> Result<Box<dyn Cursor>>;

    /// Apply a sequence of puts/deletes atomically.
    fn batch(&self, table: &str, ops: Vec<BatchOp>) -> Result<()>;

    /// Allocate the next identifier for `table` and write `value` at it,
    /// returning the assigned id. Ids for a given table are a single
    /// monotonically increasing counter, starting at 0, never reused.
    fn append(&self, table: &str, value: &[u8]) -> Result<u64>;
}
