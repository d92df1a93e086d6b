//! Entity store: maps graph entities to ordered key-value tables and
//! indices (spec §4.3). [`normalised`] is the canonical schema every
//! implementation must support; [`tuplespace`] is the alternate schema for
//! applications that want open-ended property querying without declared
//! indices.

pub mod normalised;
pub mod tuplespace;

use crate::codec::{self, Element};
use crate::error::Result;
use crate::kv::KvEngine;
use crate::value::{PropertyMap, PropertyValue};

/// Schema-independent vertex storage contract. Implemented by both the
/// normalised schema ([`normalised::VertexTable`]) and the tuple-space
/// schema ([`tuplespace::TupleVertexStore`]), so [`crate::graph`] can be
/// written once against either.
pub trait VertexStore: Send + Sync {
    fn index(&self, name: &str);
    fn add(&self, label: &str, properties: PropertyMap) -> Result<u64>;
    fn get(&self, id: u64) -> Result<(String, PropertyMap)>;
    fn update(&self, id: u64, properties: PropertyMap) -> Result<()>;
    fn delete(&self, id: u64) -> Result<()>;
    fn identifiers(&self, label: &str) -> Result<Vec<u64>>;
    /// Every vertex id regardless of label, for the source step `vertices()`
    /// with no label argument.
    fn all_identifiers(&self) -> Result<Vec<u64>>;
    fn keys(&self, name: &str, value: &PropertyValue) -> Result<Vec<u64>>;
}

/// Schema-independent edge storage contract; see [`VertexStore`].
pub trait EdgeStore: Send + Sync {
    fn index(&self, name: &str);
    fn add(&self, start: u64, label: &str, end: u64, properties: PropertyMap) -> Result<u64>;
    fn get(&self, id: u64) -> Result<(u64, String, u64, PropertyMap)>;
    fn update(&self, id: u64, properties: PropertyMap) -> Result<()>;
    fn delete(&self, id: u64) -> Result<()>;
    fn identifiers(&self, label: &str) -> Result<Vec<u64>>;
    fn all_identifiers(&self) -> Result<Vec<u64>>;
    fn keys(&self, name: &str, value: &PropertyValue) -> Result<Vec<u64>>;
    fn outgoings(&self, vertex_id: u64) -> Result<Vec<u64>>;
    fn incomings(&self, vertex_id: u64) -> Result<Vec<u64>>;
}

impl VertexStore for normalised::VertexTable {
    fn index(&self, name: &str) { normalised::VertexTable::index(self, name) }
    fn add(&self, label: &str, properties: PropertyMap) -> Result<u64> { normalised::VertexTable::add(self, label, properties) }
    fn get(&self, id: u64) -> Result<(String, PropertyMap)> { normalised::VertexTable::get(self, id) }
    fn update(&self, id: u64, properties: PropertyMap) -> Result<()> { normalised::VertexTable::update(self, id, properties) }
    fn delete(&self, id: u64) -> Result<()> { normalised::VertexTable::delete(self, id) }
    fn identifiers(&self, label: &str) -> Result<Vec<u64>> { normalised::VertexTable::identifiers(self, label) }
    fn all_identifiers(&self) -> Result<Vec<u64>> { normalised::VertexTable::all_identifiers(self) }
    fn keys(&self, name: &str, value: &PropertyValue) -> Result<Vec<u64>> { normalised::VertexTable::keys(self, name, value) }
}

impl EdgeStore for normalised::EdgeTable {
    fn index(&self, name: &str) { normalised::EdgeTable::index(self, name) }
    fn add(&self, start: u64, label: &str, end: u64, properties: PropertyMap) -> Result<u64> { normalised::EdgeTable::add(self, start, label, end, properties) }
    fn get(&self, id: u64) -> Result<(u64, String, u64, PropertyMap)> { normalised::EdgeTable::get(self, id) }
    fn update(&self, id: u64, properties: PropertyMap) -> Result<()> { normalised::EdgeTable::update(self, id, properties) }
    fn delete(&self, id: u64) -> Result<()> { normalised::EdgeTable::delete(self, id) }
    fn identifiers(&self, label: &str) -> Result<Vec<u64>> { normalised::EdgeTable::identifiers(self, label) }
    fn all_identifiers(&self) -> Result<Vec<u64>> { normalised::EdgeTable::all_identifiers(self) }
    fn keys(&self, name: &str, value: &PropertyValue) -> Result<Vec<u64>> { normalised::EdgeTable::keys(self, name, value) }
    fn outgoings(&self, vertex_id: u64) -> Result<Vec<u64>> { normalised::EdgeTable::outgoings(self, vertex_id) }
    fn incomings(&self, vertex_id: u64) -> Result<Vec<u64>> { normalised::EdgeTable::incomings(self, vertex_id) }
}

pub(crate) fn id_key(id: u64) -> Vec<u8> { codec::encode(&[Element::Int(id as i64)]).expect("id element always encodes") }

pub(crate) fn label_prefix(label: &str) -> Vec<u8> { codec::encode(&[Element::Text(label.to_owned())]).expect("label prefix always encodes") }

pub(crate) fn label_key(label: &str, id: u64) -> Vec<u8> {
    codec::encode(&[Element::Text(label.to_owned()), Element::Int(id as i64)]).expect("label key always encodes")
}

pub(crate) fn property_prefix(name: &str, value: &PropertyValue) -> Result<Vec<u8>> {
    codec::encode(&[Element::Text(name.to_owned()), value.to_index_element()?])
}

pub(crate) fn property_key(name: &str, value: &PropertyValue, id: u64) -> Result<Vec<u8>> {
    codec::encode(&[Element::Text(name.to_owned()), value.to_index_element()?, Element::Int(id as i64)])
}

pub(crate) fn adjacency_prefix(vertex_id: u64) -> Vec<u8> { codec::encode(&[Element::Int(vertex_id as i64)]).expect("adjacency prefix always encodes") }

pub(crate) fn adjacency_key(vertex_id: u64, edge_id: u64) -> Vec<u8> {
    codec::encode(&[Element::Int(vertex_id as i64), Element::Int(edge_id as i64)]).expect("adjacency key always encodes")
}

/// Scan every key under `prefix` in one logical table and return the last
/// decoded element of each key as an id. Used for the label index, property
/// index, and adjacency index, which all put the id last.
pub(crate) fn scan_trailing_ids(engine: &dyn KvEngine, table: &str, prefix: Vec<u8>) -> Result<Vec<u64>> {
    let upper = codec::prefix_upper_bound(&prefix);
    let mut cursor = engine.scan(table, prefix, upper)?;
    let mut ids = Vec::new();
    while cursor.advance()? {
        let key = cursor.key().expect("advance returned true");
        let elements = codec::decode(key)?;
        if let Some(Element::Int(id)) = elements.last() {
            ids.push(*id as u64);
        }
    }
    Ok(ids)
}
