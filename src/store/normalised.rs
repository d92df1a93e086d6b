//! Canonical normalised schema (spec §4.3.1): one primary table per entity
//! class, a label index, an optional property index, and — for edges — the
//! outgoing/incoming adjacency indices.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{adjacency_key, adjacency_prefix, id_key, label_key, label_prefix, property_key, property_prefix, scan_trailing_ids};
use crate::error::{Error, Result};
use crate::kv::{BatchOp, KvEngine};
use crate::value::{self, PropertyMap};

#[derive(Serialize, Deserialize)]
struct VertexRow {
    label: String,
    properties: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct EdgeRow {
    start: u64,
    label: String,
    end: u64,
    properties: Vec<u8>,
}

/// `vertices` primary table plus its `vertices:labels` and optional
/// `vertices-keys` indices.
pub struct VertexTable {
    engine: Arc<dyn KvEngine>,
    primary: &'static str,
    labels: &'static str,
    keys: &'static str,
    indexed_properties: Mutex<HashSet<String>>,
}

impl VertexTable {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self { engine, primary: "vertices", labels: "vertices:labels", keys: "vertices-keys", indexed_properties: Mutex::new(HashSet::new()) }
    }

    /// Register `name` for property indexing. Only properties named here are
    /// populated in `vertices-keys` by subsequent `add`/`update` calls.
    pub fn index(&self, name: &str) { self.indexed_properties.lock().unwrap().insert(name.to_owned()); }

    pub fn add(&self, label: &str, properties: PropertyMap) -> Result<u64> {
        let row = VertexRow { label: label.to_owned(), properties: value::pack_properties(&properties)? };
        let row_bytes = rmp_serde::to_vec(&row)?;
        let id = self.engine.append(self.primary, &row_bytes)?;

        self.engine.batch(self.labels, vec![BatchOp::put(label_key(label, id), Vec::new())])?;
        let key_ops: Vec<BatchOp> =
            self.index_rows_for(&properties).into_iter().map(|(name, val)| Ok(BatchOp::put(property_key(&name, &val, id)?, Vec::new()))).collect::<Result<_>>()?;
        if !key_ops.is_empty() {
            self.engine.batch(self.keys, key_ops)?;
        }
        debug!(id, label, "vertex added");
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<(String, PropertyMap)> {
        let bytes = self.engine.get(self.primary, &id_key(id))?.ok_or(Error::NotFound(id))?;
        let row: VertexRow = rmp_serde::from_slice(&bytes)?;
        Ok((row.label, value::unpack_properties(&row.properties)?))
    }

    pub fn update(&self, id: u64, properties: PropertyMap) -> Result<()> {
        let (label, old_properties) = self.get(id)?;
        let mut key_ops: Vec<BatchOp> =
            self.index_rows_for(&old_properties).into_iter().map(|(name, val)| Ok(BatchOp::delete(property_key(&name, &val, id)?))).collect::<Result<_>>()?;
        let row = VertexRow { label: label.clone(), properties: value::pack_properties(&properties)? };
        self.engine.put(self.primary, &id_key(id), &rmp_serde::to_vec(&row)?)?;
        key_ops.extend(
            self.index_rows_for(&properties).into_iter().map(|(name, val)| Ok(BatchOp::put(property_key(&name, &val, id)?, Vec::new()))).collect::<Result<Vec<_>>>()?,
        );
        if !key_ops.is_empty() {
            self.engine.batch(self.keys, key_ops)?;
        }
        debug!(id, "vertex updated");
        Ok(())
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let (label, properties) = self.get(id)?;
        self.engine.delete(self.primary, &id_key(id))?;
        self.engine.delete(self.labels, &label_key(&label, id))?;
        let key_ops: Vec<BatchOp> =
            self.index_rows_for(&properties).into_iter().map(|(name, val)| Ok(BatchOp::delete(property_key(&name, &val, id)?))).collect::<Result<_>>()?;
        if !key_ops.is_empty() {
            self.engine.batch(self.keys, key_ops)?;
        }
        debug!(id, "vertex deleted");
        Ok(())
    }

    pub fn identifiers(&self, label: &str) -> Result<Vec<u64>> { scan_trailing_ids(self.engine.as_ref(), self.labels, label_prefix(label)) }

    pub fn all_identifiers(&self) -> Result<Vec<u64>> { scan_trailing_ids(self.engine.as_ref(), self.labels, Vec::new()) }

    pub fn keys(&self, name: &str, value: &crate::value::PropertyValue) -> Result<Vec<u64>> {
        scan_trailing_ids(self.engine.as_ref(), self.keys, property_prefix(name, value)?)
    }

    fn index_rows_for(&self, properties: &PropertyMap) -> Vec<(String, crate::value::PropertyValue)> {
        let indexed = self.indexed_properties.lock().unwrap();
        properties.iter().filter(|(k, _)| indexed.contains(k.as_str())).map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// `edges` primary table plus `edges:labels`, `edges:outgoings`,
/// `edges:incomings`, and optional `edges-keys`.
pub struct EdgeTable {
    engine: Arc<dyn KvEngine>,
    primary: &'static str,
    labels: &'static str,
    outgoings: &'static str,
    incomings: &'static str,
    keys: &'static str,
    indexed_properties: Mutex<HashSet<String>>,
}

impl EdgeTable {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self {
            engine,
            primary: "edges",
            labels: "edges:labels",
            outgoings: "edges:outgoings",
            incomings: "edges:incomings",
            keys: "edges-keys",
            indexed_properties: Mutex::new(HashSet::new()),
        }
    }

    pub fn index(&self, name: &str) { self.indexed_properties.lock().unwrap().insert(name.to_owned()); }

    pub fn add(&self, start: u64, label: &str, end: u64, properties: PropertyMap) -> Result<u64> {
        let row = EdgeRow { start, label: label.to_owned(), end, properties: value::pack_properties(&properties)? };
        let id = self.engine.append(self.primary, &rmp_serde::to_vec(&row)?)?;

        self.engine.put(self.labels, &label_key(label, id), &[])?;
        self.engine.put(self.outgoings, &adjacency_key(start, id), &[])?;
        self.engine.put(self.incomings, &adjacency_key(end, id), &[])?;
        let key_ops: Vec<BatchOp> =
            self.index_rows_for(&properties).into_iter().map(|(name, val)| Ok(BatchOp::put(property_key(&name, &val, id)?, Vec::new()))).collect::<Result<_>>()?;
        if !key_ops.is_empty() {
            self.engine.batch(self.keys, key_ops)?;
        }
        debug!(id, start, end, label, "edge added");
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<(u64, String, u64, PropertyMap)> {
        let bytes = self.engine.get(self.primary, &id_key(id))?.ok_or(Error::NotFound(id))?;
        let row: EdgeRow = rmp_serde::from_slice(&bytes)?;
        Ok((row.start, row.label, row.end, value::unpack_properties(&row.properties)?))
    }

    pub fn update(&self, id: u64, properties: PropertyMap) -> Result<()> {
        let (start, label, end, old_properties) = self.get(id)?;
        let mut key_ops: Vec<BatchOp> =
            self.index_rows_for(&old_properties).into_iter().map(|(name, val)| Ok(BatchOp::delete(property_key(&name, &val, id)?))).collect::<Result<_>>()?;
        let row = EdgeRow { start, label, end, properties: value::pack_properties(&properties)? };
        self.engine.put(self.primary, &id_key(id), &rmp_serde::to_vec(&row)?)?;
        key_ops.extend(
            self.index_rows_for(&properties).into_iter().map(|(name, val)| Ok(BatchOp::put(property_key(&name, &val, id)?, Vec::new()))).collect::<Result<Vec<_>>>()?,
        );
        if !key_ops.is_empty() {
            self.engine.batch(self.keys, key_ops)?;
        }
        debug!(id, "edge updated");
        Ok(())
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let (start, label, end, properties) = self.get(id)?;
        self.engine.delete(self.primary, &id_key(id))?;
        self.engine.delete(self.labels, &label_key(&label, id))?;
        self.engine.delete(self.outgoings, &adjacency_key(start, id))?;
        self.engine.delete(self.incomings, &adjacency_key(end, id))?;
        let key_ops: Vec<BatchOp> =
            self.index_rows_for(&properties).into_iter().map(|(name, val)| Ok(BatchOp::delete(property_key(&name, &val, id)?))).collect::<Result<_>>()?;
        if !key_ops.is_empty() {
            self.engine.batch(self.keys, key_ops)?;
        }
        debug!(id, "edge deleted");
        Ok(())
    }

    pub fn identifiers(&self, label: &str) -> Result<Vec<u64>> { scan_trailing_ids(self.engine.as_ref(), self.labels, label_prefix(label)) }

    pub fn all_identifiers(&self) -> Result<Vec<u64>> { scan_trailing_ids(self.engine.as_ref(), self.labels, Vec::new()) }

    pub fn keys(&self, name: &str, value: &crate::value::PropertyValue) -> Result<Vec<u64>> {
        scan_trailing_ids(self.engine.as_ref(), self.keys, property_prefix(name, value)?)
    }

    pub fn outgoings(&self, vertex_id: u64) -> Result<Vec<u64>> { scan_trailing_ids(self.engine.as_ref(), self.outgoings, adjacency_prefix(vertex_id)) }

    pub fn incomings(&self, vertex_id: u64) -> Result<Vec<u64>> { scan_trailing_ids(self.engine.as_ref(), self.incomings, adjacency_prefix(vertex_id)) }

    fn index_rows_for(&self, properties: &PropertyMap) -> Vec<(String, crate::value::PropertyValue)> {
        let indexed = self.indexed_properties.lock().unwrap();
        properties.iter().filter(|(k, _)| indexed.contains(k.as_str())).map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}
