//! Alternate tuple-space schema (spec §4.3.2): every property of every
//! entity is its own row in `tuples`, fully reverse-indexed in `index`.
//! Vertices and edges share one id space and are distinguished by a
//! reserved `_meta_type` property; `_meta_label`, `_meta_start`, `_meta_end`
//! round out the metadata the normalised schema gets from dedicated columns.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{property_key, property_prefix, scan_trailing_ids, EdgeStore, VertexStore};
use crate::codec::{self, Element};
use crate::error::{Error, Result};
use crate::kv::KvEngine;
use crate::value::{PropertyMap, PropertyValue};

const META_TYPE: &str = "_meta_type";
const META_LABEL: &str = "_meta_label";
const META_START: &str = "_meta_start";
const META_END: &str = "_meta_end";

fn reject_reserved_name(name: &str) -> Result<()> {
    if name.starts_with("_meta_") {
        return Err(Error::InvalidArgument(format!("property name {name:?} is reserved for tuple-space metadata")));
    }
    Ok(())
}

fn tuple_key(id: u64, name: &str) -> Vec<u8> {
    codec::encode(&[Element::Int(id as i64), Element::Text(name.to_owned())]).expect("tuple key always encodes")
}

fn encode_value(value: &PropertyValue) -> Result<Vec<u8>> { codec::encode(&[value.to_index_element()?]) }

fn decode_value(bytes: &[u8]) -> Result<PropertyValue> {
    let elements = codec::decode(bytes)?;
    let element = elements.into_iter().next().ok_or_else(|| Error::Codec("empty tuple value".into()))?;
    PropertyValue::from_index_element(&element)
}

/// The raw `tuples`/`index` namespaces plus the shared id counter. Exposes
/// the point primitives (`set`, `get_ref`, `remove`, `query`) the spec
/// describes directly; [`TupleVertexStore`]/[`TupleEdgeStore`] layer the
/// vertex/edge shape on top via the `_meta_*` properties.
pub struct TupleSpace {
    engine: Arc<dyn KvEngine>,
    tuples: &'static str,
    index: &'static str,
    ids: &'static str,
}

impl TupleSpace {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self { Self { engine, tuples: "tuples", index: "index", ids: "tuples:ids" } }

    /// Vertices and edges are both rows in the same `tuples`/`index`
    /// namespaces, so they must draw from one shared counter — otherwise
    /// vertex 5 and edge 5 would alias each other's properties.
    fn allocate_id(&self) -> Result<u64> { self.engine.append(self.ids, &[]) }

    pub fn set(&self, id: u64, name: &str, value: &PropertyValue) -> Result<()> {
        if let Some(old) = self.get(id, name)? {
            self.engine.delete(self.index, &property_key(name, &old, id)?)?;
        }
        self.engine.put(self.tuples, &tuple_key(id, name), &encode_value(value)?)?;
        self.engine.put(self.index, &property_key(name, value, id)?, &[])?;
        Ok(())
    }

    pub fn get(&self, id: u64, name: &str) -> Result<Option<PropertyValue>> {
        match self.engine.get(self.tuples, &tuple_key(id, name))? {
            Some(bytes) => Ok(Some(decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The point primitive "fetch value of a single property" (spec
    /// §4.3.2's `ref`); `ref` is a reserved word, so this is named
    /// `get_ref`.
    pub fn get_ref(&self, id: u64, name: &str) -> Result<PropertyValue> {
        self.get(id, name)?.ok_or_else(|| Error::NotFound(id))
    }

    pub fn remove(&self, id: u64, name: &str) -> Result<()> {
        if let Some(old) = self.get(id, name)? {
            self.engine.delete(self.index, &property_key(name, &old, id)?)?;
        }
        self.engine.delete(self.tuples, &tuple_key(id, name))?;
        Ok(())
    }

    pub fn query(&self, name: &str, value: &PropertyValue) -> Result<Vec<u64>> {
        scan_trailing_ids(self.engine.as_ref(), self.index, property_prefix(name, value)?)
    }

    /// Every property currently set on `id`, including `_meta_*` ones.
    fn properties(&self, id: u64) -> Result<BTreeMap<String, PropertyValue>> {
        let prefix = codec::encode(&[Element::Int(id as i64)])?;
        let upper = codec::prefix_upper_bound(&prefix);
        let mut cursor = self.engine.scan(self.tuples, prefix, upper)?;
        let mut map = BTreeMap::new();
        while cursor.advance()? {
            let key = cursor.key().expect("advance returned true");
            let elements = codec::decode(key)?;
            let Some(Element::Text(name)) = elements.get(1) else { continue };
            let value = decode_value(cursor.value().expect("advance returned true"))?;
            map.insert(name.clone(), value);
        }
        Ok(map)
    }

    fn meta_type(&self, id: u64) -> Result<Option<String>> {
        match self.get(id, META_TYPE)? {
            Some(PropertyValue::Text(kind)) => Ok(Some(kind)),
            _ => Ok(None),
        }
    }

    /// Narrows a candidate id list down to the ones whose `_meta_type`
    /// matches `want` — the tuple-space index is shared by vertices and
    /// edges, so any query keyed on a non-`_meta_type` property (a label, a
    /// user property) can otherwise return ids from the other namespace.
    fn ids_of_type(&self, candidates: Vec<u64>, want: &str) -> Result<Vec<u64>> {
        candidates.into_iter().filter(|id| matches!(self.meta_type(*id), Ok(Some(kind)) if kind == want)).map(Ok).collect()
    }
}

/// Vertex shape over [`TupleSpace`]: writes `_meta_type = "vertex"` and
/// `_meta_label` alongside the user's own properties.
pub struct TupleVertexStore {
    space: Arc<TupleSpace>,
    indexed_properties: Mutex<HashSet<String>>,
}

impl TupleVertexStore {
    pub fn new(space: Arc<TupleSpace>) -> Self { Self { space, indexed_properties: Mutex::new(HashSet::new()) } }
}

impl VertexStore for TupleVertexStore {
    /// The tuple-space index already covers every property (spec §4.3.2);
    /// this exists only so callers can treat both schemas uniformly.
    fn index(&self, name: &str) { self.indexed_properties.lock().unwrap().insert(name.to_owned()); }

    fn add(&self, label: &str, properties: PropertyMap) -> Result<u64> {
        let id = self.space.allocate_id()?;
        self.space.set(id, META_TYPE, &PropertyValue::Text("vertex".into()))?;
        self.space.set(id, META_LABEL, &PropertyValue::Text(label.to_owned()))?;
        for (name, val) in &properties {
            reject_reserved_name(name)?;
            self.space.set(id, name, val)?;
        }
        debug!(id, label, "vertex added (tuple-space)");
        Ok(id)
    }

    fn get(&self, id: u64) -> Result<(String, PropertyMap)> {
        let mut all = self.space.properties(id)?;
        let Some(PropertyValue::Text(label)) = all.remove(META_LABEL) else { return Err(Error::NotFound(id)) };
        all.remove(META_TYPE);
        Ok((label, all))
    }

    fn update(&self, id: u64, properties: PropertyMap) -> Result<()> {
        let (_, old) = self.get(id)?;
        for name in old.keys() {
            if !properties.contains_key(name) {
                self.space.remove(id, name)?;
            }
        }
        for (name, val) in &properties {
            reject_reserved_name(name)?;
            self.space.set(id, name, val)?;
        }
        debug!(id, "vertex updated (tuple-space)");
        Ok(())
    }

    fn delete(&self, id: u64) -> Result<()> {
        let all = self.space.properties(id)?;
        for name in all.keys() {
            self.space.remove(id, name)?;
        }
        debug!(id, "vertex deleted (tuple-space)");
        Ok(())
    }

    fn identifiers(&self, label: &str) -> Result<Vec<u64>> {
        let candidates = self.space.query(META_LABEL, &PropertyValue::Text(label.to_owned()))?;
        self.space.ids_of_type(candidates, "vertex")
    }

    fn all_identifiers(&self) -> Result<Vec<u64>> { self.space.query(META_TYPE, &PropertyValue::Text("vertex".into())) }

    fn keys(&self, name: &str, value: &PropertyValue) -> Result<Vec<u64>> {
        let candidates = self.space.query(name, value)?;
        self.space.ids_of_type(candidates, "vertex")
    }
}

/// Edge shape over [`TupleSpace`]: writes `_meta_type = "edge"`,
/// `_meta_label`, `_meta_start`, `_meta_end`.
pub struct TupleEdgeStore {
    space: Arc<TupleSpace>,
    indexed_properties: Mutex<HashSet<String>>,
}

impl TupleEdgeStore {
    pub fn new(space: Arc<TupleSpace>) -> Self { Self { space, indexed_properties: Mutex::new(HashSet::new()) } }
}

impl EdgeStore for TupleEdgeStore {
    fn index(&self, name: &str) { self.indexed_properties.lock().unwrap().insert(name.to_owned()); }

    fn add(&self, start: u64, label: &str, end: u64, properties: PropertyMap) -> Result<u64> {
        let id = self.space.allocate_id()?;
        self.space.set(id, META_TYPE, &PropertyValue::Text("edge".into()))?;
        self.space.set(id, META_LABEL, &PropertyValue::Text(label.to_owned()))?;
        self.space.set(id, META_START, &PropertyValue::Integer(start as i64))?;
        self.space.set(id, META_END, &PropertyValue::Integer(end as i64))?;
        for (name, val) in &properties {
            reject_reserved_name(name)?;
            self.space.set(id, name, val)?;
        }
        debug!(id, start, end, label, "edge added (tuple-space)");
        Ok(id)
    }

    fn get(&self, id: u64) -> Result<(u64, String, u64, PropertyMap)> {
        let mut all = self.space.properties(id)?;
        let Some(PropertyValue::Text(label)) = all.remove(META_LABEL) else { return Err(Error::NotFound(id)) };
        let Some(PropertyValue::Integer(start)) = all.remove(META_START) else { return Err(Error::NotFound(id)) };
        let Some(PropertyValue::Integer(end)) = all.remove(META_END) else { return Err(Error::NotFound(id)) };
        all.remove(META_TYPE);
        Ok((start as u64, label, end as u64, all))
    }

    fn update(&self, id: u64, properties: PropertyMap) -> Result<()> {
        let (_, _, _, old) = self.get(id)?;
        for name in old.keys() {
            if !properties.contains_key(name) {
                self.space.remove(id, name)?;
            }
        }
        for (name, val) in &properties {
            reject_reserved_name(name)?;
            self.space.set(id, name, val)?;
        }
        debug!(id, "edge updated (tuple-space)");
        Ok(())
    }

    fn delete(&self, id: u64) -> Result<()> {
        let all = self.space.properties(id)?;
        for name in all.keys() {
            self.space.remove(id, name)?;
        }
        debug!(id, "edge deleted (tuple-space)");
        Ok(())
    }

    fn identifiers(&self, label: &str) -> Result<Vec<u64>> {
        let candidates = self.space.query(META_LABEL, &PropertyValue::Text(label.to_owned()))?;
        self.space.ids_of_type(candidates, "edge")
    }

    fn all_identifiers(&self) -> Result<Vec<u64>> { self.space.query(META_TYPE, &PropertyValue::Text("edge".into())) }

    fn keys(&self, name: &str, value: &PropertyValue) -> Result<Vec<u64>> {
        let candidates = self.space.query(name, value)?;
        self.space.ids_of_type(candidates, "edge")
    }

    fn outgoings(&self, vertex_id: u64) -> Result<Vec<u64>> { self.space.query(META_START, &PropertyValue::Integer(vertex_id as i64)) }

    fn incomings(&self, vertex_id: u64) -> Result<Vec<u64>> { self.space.query(META_END, &PropertyValue::Integer(vertex_id as i64)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::SledEngine;

    fn space() -> Arc<TupleSpace> { Arc::new(TupleSpace::new(Arc::new(SledEngine::temporary().unwrap()))) }

    #[test]
    fn vertex_and_edge_ids_share_one_counter() {
        let space = space();
        let vertices = TupleVertexStore::new(space.clone());
        let edges = TupleEdgeStore::new(space);
        let a = vertices.add("person", PropertyMap::new()).unwrap();
        let b = vertices.add("person", PropertyMap::new()).unwrap();
        let e = edges.add(a, "knows", b, PropertyMap::new()).unwrap();
        assert_eq!([a, b, e], [0, 1, 2]);
    }

    #[test]
    fn set_and_get_ref_round_trip_a_property() {
        let space = space();
        space.set(0, "name", &PropertyValue::Text("ash".into())).unwrap();
        assert_eq!(space.get_ref(0, "name").unwrap(), PropertyValue::Text("ash".into()));
    }

    #[test]
    fn set_overwrite_drops_stale_index_row() {
        let space = space();
        space.set(0, "name", &PropertyValue::Text("one".into())).unwrap();
        space.set(0, "name", &PropertyValue::Text("two".into())).unwrap();
        assert!(space.query("name", &PropertyValue::Text("one".into())).unwrap().is_empty());
        assert_eq!(space.query("name", &PropertyValue::Text("two".into())).unwrap(), vec![0]);
    }

    #[test]
    fn vertex_add_then_get_round_trips_label_and_properties() {
        let space = space();
        let vertices = TupleVertexStore::new(space);
        let mut props = PropertyMap::new();
        props.insert("name".into(), "ash".into());
        let id = vertices.add("person", props.clone()).unwrap();
        let (label, got) = vertices.get(id).unwrap();
        assert_eq!(label, "person");
        assert_eq!(got, props);
    }

    #[test]
    fn vertex_delete_removes_every_property_row() {
        let space = space();
        let vertices = TupleVertexStore::new(space.clone());
        let mut props = PropertyMap::new();
        props.insert("name".into(), "ash".into());
        let id = vertices.add("person", props).unwrap();
        vertices.delete(id).unwrap();
        assert!(matches!(vertices.get(id), Err(Error::NotFound(_))));
        assert!(vertices.identifiers("person").unwrap().is_empty());
        assert!(space.properties(id).unwrap().is_empty());
    }

    #[test]
    fn keys_does_not_cross_vertex_and_edge_namespaces() {
        let space = space();
        let vertices = TupleVertexStore::new(space.clone());
        let edges = TupleEdgeStore::new(space);
        let mut vprops = PropertyMap::new();
        vprops.insert("weight".into(), PropertyValue::Integer(5));
        let v = vertices.add("node", vprops).unwrap();
        let a = vertices.add("node", PropertyMap::new()).unwrap();
        let b = vertices.add("node", PropertyMap::new()).unwrap();
        let mut eprops = PropertyMap::new();
        eprops.insert("weight".into(), PropertyValue::Integer(5));
        let e = edges.add(a, "rel", b, eprops).unwrap();

        assert_eq!(vertices.keys("weight", &PropertyValue::Integer(5)).unwrap(), vec![v]);
        assert_eq!(edges.keys("weight", &PropertyValue::Integer(5)).unwrap(), vec![e]);
    }

    #[test]
    fn identifiers_does_not_cross_vertex_and_edge_namespaces() {
        let space = space();
        let vertices = TupleVertexStore::new(space.clone());
        let edges = TupleEdgeStore::new(space);
        let a = vertices.add("knows", PropertyMap::new()).unwrap();
        let b = vertices.add("v", PropertyMap::new()).unwrap();
        let c = vertices.add("v", PropertyMap::new()).unwrap();
        let e = edges.add(b, "knows", c, PropertyMap::new()).unwrap();

        assert_eq!(vertices.identifiers("knows").unwrap(), vec![a]);
        assert_eq!(edges.identifiers("knows").unwrap(), vec![e]);
    }

    #[test]
    fn edge_adjacency_queries_order_by_edge_id() {
        let space = space();
        let vertices = TupleVertexStore::new(space.clone());
        let edges = TupleEdgeStore::new(space);
        let a = vertices.add("v", PropertyMap::new()).unwrap();
        let b = vertices.add("v", PropertyMap::new()).unwrap();
        let e1 = edges.add(a, "rel", b, PropertyMap::new()).unwrap();
        let e2 = edges.add(a, "rel", b, PropertyMap::new()).unwrap();
        assert_eq!(edges.outgoings(a).unwrap(), vec![e1, e2]);
        assert_eq!(edges.incomings(b).unwrap(), vec![e1, e2]);
    }

    #[test]
    fn reserved_meta_property_name_is_rejected() {
        let space = space();
        let vertices = TupleVertexStore::new(space);
        let mut props = PropertyMap::new();
        props.insert("_meta_type".into(), "vertex".into());
        assert!(matches!(vertices.add("x", props), Err(Error::InvalidArgument(_))));
    }
}
