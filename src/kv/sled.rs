//! `sled`-backed [`KvEngine`]: one `sled::Tree` per logical table, with an
//! explicit per-table cursor pool layered on top (spec §4.2's pooling
//! requirement is the adapter's job, independent of whether the underlying
//! engine's own iterators are cheap or expensive).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use super::{BatchOp, Cursor, KvEngine};
use crate::error::Result;

/// Passed through opaquely to the underlying engine (spec §6).
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub cache_capacity_bytes: Option<u64>,
}

type Pools = Arc<Mutex<HashMap<String, Vec<CursorSlot>>>>;

pub struct SledEngine {
    db: ::sled::Db,
    pools: Pools,
}

/// Recycled cursor state: just the key/value scratch buffers, so repeated
/// scans on a hot table don't keep reallocating them.
#[derive(Default)]
struct CursorSlot {
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
}

impl SledEngine {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> { Self::open_with_config(path, DbConfig::default()) }

    pub fn open_with_config(path: impl AsRef<Path>, config: DbConfig) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref()).map_err(::sled::Error::Io)?;
        let mut cfg = ::sled::Config::new().path(path.as_ref());
        if let Some(cap) = config.cache_capacity_bytes {
            cfg = cfg.cache_capacity(cap);
        }
        let db = cfg.open()?;
        debug!(path = %path.as_ref().display(), "opened sled-backed graph store");
        Ok(Self { db, pools: Arc::new(Mutex::new(HashMap::new())) })
    }

    /// An ephemeral instance for tests and embedding scratch use.
    pub fn temporary() -> Result<Self> {
        let db = ::sled::Config::new().temporary(true).flush_every_ms(None).open()?;
        Ok(Self { db, pools: Arc::new(Mutex::new(HashMap::new())) })
    }

    fn open_tree(&self, table: &str) -> Result<::sled::Tree> { Ok(self.db.open_tree(table)?) }

    fn counter_tree(&self, table: &str) -> Result<::sled::Tree> { Ok(self.db.open_tree(format!("{table}::counter"))?) }

    fn take_slot(&self, table: &str) -> CursorSlot { self.pools.lock().unwrap().entry(table.to_owned()).or_default().pop().unwrap_or_default() }
}

impl KvEngine for SledEngine {
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        trace!(table, ?key, "kv get");
        let tree = self.open_tree(table)?;
        Ok(tree.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        trace!(table, ?key, "kv put");
        let tree = self.open_tree(table)?;
        tree.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<()> {
        trace!(table, ?key, "kv delete");
        let tree = self.open_tree(table)?;
        tree.remove(key)?;
        Ok(())
    }

    fn scan(&self, table: &str, start: Vec<u8>, end: Option<Vec<u8>>) -> Result<Box<dyn Cursor>> {
        trace!(table, ?start, ?end, "kv scan");
        let tree = self.open_tree(table)?;
        let slot = self.take_slot(table);
        let cursor = SledCursor::open(tree, self.pools.clone(), table.to_owned(), start, end, slot);
        Ok(Box::new(cursor))
    }

    fn batch(&self, table: &str, ops: Vec<BatchOp>) -> Result<()> {
        debug!(table, count = ops.len(), "kv batch");
        let tree = self.open_tree(table)?;
        let mut batch = ::sled::Batch::default();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => batch.insert(k, v),
                BatchOp::Delete(k) => batch.remove(k),
            }
        }
        tree.apply_batch(batch)?;
        Ok(())
    }

    fn append(&self, table: &str, value: &[u8]) -> Result<u64> {
        let tree = self.open_tree(table)?;
        let counter = self.counter_tree(table)?;
        let old = counter.fetch_and_update(b"next", |old: Option<&[u8]>| {
            let cur = old.map(|b| u64::from_be_bytes(b.try_into().unwrap())).unwrap_or(0);
            Some((cur + 1).to_be_bytes().to_vec())
        })?;
        let id = old.map(|b| u64::from_be_bytes(b.as_ref().try_into().unwrap())).unwrap_or(0);
        let key = crate::codec::encode(&[crate::codec::Element::Int(id as i64)])?;
        tree.insert(key, value)?;
        debug!(table, id, "kv append");
        Ok(id)
    }
}

pub struct SledCursor {
    tree: ::sled::Tree,
    pools: Pools,
    table: String,
    range_start: Vec<u8>,
    end: Option<Vec<u8>>,
    iter: Option<::sled::Iter>,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
    positioned: bool,
    drained: bool,
}

impl SledCursor {
    fn open(tree: ::sled::Tree, pools: Pools, table: String, start: Vec<u8>, end: Option<Vec<u8>>, slot: CursorSlot) -> Self {
        let mut cursor = Self {
            tree,
            pools,
            table,
            range_start: Vec::new(),
            end,
            iter: None,
            key_buf: slot.key_buf,
            value_buf: slot.value_buf,
            positioned: false,
            drained: false,
        };
        cursor.reset_at(start);
        cursor
    }

    fn reset_at(&mut self, start: Vec<u8>) {
        let iter = match &self.end {
            Some(end) => self.tree.range(start.clone()..end.clone()),
            None => self.tree.range(start.clone()..),
        };
        self.range_start = start;
        self.iter = Some(iter);
        self.positioned = false;
        self.drained = false;
    }
}

impl Cursor for SledCursor {
    fn seek_at_or_after(&mut self, key: &[u8]) -> Result<()> {
        self.reset_at(key.to_vec());
        Ok(())
    }

    fn advance(&mut self) -> Result<bool> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(false);
        };
        match iter.next() {
            Some(Ok((k, v))) => {
                self.key_buf.clear();
                self.key_buf.extend_from_slice(&k);
                self.value_buf.clear();
                self.value_buf.extend_from_slice(&v);
                self.positioned = true;
                Ok(true)
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                self.positioned = false;
                self.drained = true;
                Ok(false)
            }
        }
    }

    fn key(&self) -> Option<&[u8]> { self.positioned.then_some(self.key_buf.as_slice()) }

    fn value(&self) -> Option<&[u8]> { self.positioned.then_some(self.value_buf.as_slice()) }

    fn reset(&mut self) -> Result<()> {
        let start = self.range_start.clone();
        self.reset_at(start);
        Ok(())
    }
}

impl Drop for SledCursor {
    fn drop(&mut self) {
        if !self.drained {
            warn!(table = %self.table, "cursor dropped before exhausting its scan; returning to pool anyway");
        }
        let slot = CursorSlot { key_buf: std::mem::take(&mut self.key_buf), value_buf: std::mem::take(&mut self.value_buf) };
        self.pools.lock().unwrap().entry(self.table.clone()).or_default().push(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SledEngine { SledEngine::temporary().unwrap() }

    #[test]
    fn put_get_delete_roundtrip() {
        let e = engine();
        e.put("t", b"k1", b"v1").unwrap();
        assert_eq!(e.get("t", b"k1").unwrap(), Some(b"v1".to_vec()));
        e.delete("t", b"k1").unwrap();
        assert_eq!(e.get("t", b"k1").unwrap(), None);
    }

    #[test]
    fn delete_of_absent_key_is_noop() {
        let e = engine();
        assert!(e.delete("t", b"missing").is_ok());
    }

    #[test]
    fn append_allocates_increasing_ids() {
        let e = engine();
        let a = e.append("t", b"one").unwrap();
        let b = e.append("t", b"two").unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn scan_yields_ascending_keys_in_range() {
        let e = engine();
        e.put("t", b"a", b"1").unwrap();
        e.put("t", b"b", b"2").unwrap();
        e.put("t", b"c", b"3").unwrap();
        let mut cursor = e.scan("t", b"a".to_vec(), Some(b"c".to_vec())).unwrap();
        let mut seen = Vec::new();
        while cursor.advance().unwrap() {
            seen.push((cursor.key().unwrap().to_vec(), cursor.value().unwrap().to_vec()));
        }
        assert_eq!(seen, vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]);
    }

    #[test]
    fn cursor_pool_recycles_after_drop() {
        let e = engine();
        e.put("t", b"a", b"1").unwrap();
        {
            let mut c = e.scan("t", Vec::new(), None).unwrap();
            c.advance().unwrap();
        }
        assert_eq!(e.pools.lock().unwrap().get("t").map(|v| v.len()), Some(1));
    }

    #[test]
    fn batch_is_all_or_nothing_in_one_call() {
        let e = engine();
        e.batch("t", vec![BatchOp::put(b"x".to_vec(), b"1".to_vec()), BatchOp::put(b"y".to_vec(), b"2".to_vec())]).unwrap();
        assert_eq!(e.get("t", b"x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(e.get("t", b"y").unwrap(), Some(b"2".to_vec()));
    }
}
