//! A plain string-keyed scratch space, grounded in `Collection` in
//! `examples/original_source/ajgudb/storage.py`. Used for anything that
//! does not fit the vertex/edge model: schema version markers, cached
//! aggregates, whatever the application wants to stash next to the graph.

use std::sync::Arc;

use crate::error::Result;
use crate::kv::KvEngine;
use crate::value::PropertyValue;

const TABLE: &str = "collection";

pub struct Collection {
    engine: Arc<dyn KvEngine>,
}

impl Collection {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self { Self { engine } }

    pub fn set(&self, key: &str, value: PropertyValue) -> Result<()> {
        self.engine.put(TABLE, key.as_bytes(), &rmp_serde::to_vec(&value)?)
    }

    pub fn get(&self, key: &str) -> Result<Option<PropertyValue>> {
        match self.engine.get(TABLE, key.as_bytes())? {
            Some(bytes) => Ok(Some(rmp_serde::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> { self.engine.delete(TABLE, key.as_bytes()) }
}
