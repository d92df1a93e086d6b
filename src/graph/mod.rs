//! Graph façade (spec §4.4): `Db` holds a vertex store and an edge store
//! behind the schema-independent [`crate::store::VertexStore`]/
//! [`crate::store::EdgeStore`] traits, and hands out `Vertex`/`Edge` value
//! objects plus manager types that build and run traversal pipelines.
//!
//! Value objects are detached snapshots — `Vertex`/`Edge` carry no handle
//! back to `Db` (unlike the original's `self._graphdb`); methods that need
//! storage access take `&Db` explicitly, which is the idiomatic Rust shape
//! for this and keeps `Vertex`/`Edge` trivially `Clone`/`Send`.

use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use crate::collection::Collection;
use crate::error::Result;
use crate::kv::{DbConfig, KvEngine, SledEngine};
use crate::store::normalised::{EdgeTable, VertexTable};
use crate::store::tuplespace::{TupleEdgeStore, TupleSpace, TupleVertexStore};
use crate::store::{EdgeStore, VertexStore};
use crate::traversal::steps::{Edges, Get, Limit, Vertices, Where};
use crate::traversal::{Input, Kind, Pipeline, Step, Token, TokenStream, Value};
use crate::value::PropertyMap;

/// A detached snapshot of a vertex: id, label, and the properties it had
/// when fetched. Equality and hashing are by id only (spec §4.4).
#[derive(Clone, Debug)]
pub struct Vertex {
    id: u64,
    label: String,
    properties: PropertyMap,
}

impl Vertex {
    pub fn id(&self) -> u64 { self.id }
    pub fn label(&self) -> &str { &self.label }
    pub fn properties(&self) -> &PropertyMap { &self.properties }

    /// Mutate the in-memory snapshot; call [`Self::save`] to persist it
    /// (spec §8 property 7: `update` rewrites the stale index rows).
    pub fn properties_mut(&mut self) -> &mut PropertyMap { &mut self.properties }

    /// Fully materialised before the underlying cursor returns to the pool
    /// (spec §4.4) — `outgoings`/`incomings` on the edge store already
    /// collect into a `Vec` before this method ever sees it.
    pub fn outgoings(&self, db: &Db) -> Result<Vec<Edge>> {
        db.edge_store().outgoings(self.id)?.into_iter().map(|id| db.edge().get(id)).collect()
    }

    pub fn incomings(&self, db: &Db) -> Result<Vec<Edge>> {
        db.edge_store().incomings(self.id)?.into_iter().map(|id| db.edge().get(id)).collect()
    }

    /// Edges are created only through this method; `EdgeManager` has no
    /// `create`, enforcing that both endpoints are known vertices.
    pub fn link(&self, db: &Db, label: &str, end: &Vertex, properties: PropertyMap) -> Result<Edge> {
        let id = db.edge_store().add(self.id, label, end.id, properties.clone())?;
        Ok(Edge { id, start: self.id, label: label.to_owned(), end: end.id, properties })
    }

    pub fn save(&self, db: &Db) -> Result<()> { db.vertex_store().update(self.id, self.properties.clone()) }

    /// Enumerates incident edges (outgoings then incomings) and deletes
    /// each before deleting the vertex itself (spec §4.4).
    pub fn delete(self, db: &Db) -> Result<()> {
        for edge in self.outgoings(db)? {
            edge.delete(db)?;
        }
        for edge in self.incomings(db)? {
            edge.delete(db)?;
        }
        db.vertex_store().delete(self.id)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}
impl Eq for Vertex {}
impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

/// A detached snapshot of an edge. Equality and hashing are by id only.
#[derive(Clone, Debug)]
pub struct Edge {
    id: u64,
    start: u64,
    label: String,
    end: u64,
    properties: PropertyMap,
}

impl Edge {
    pub fn id(&self) -> u64 { self.id }
    pub fn label(&self) -> &str { &self.label }
    pub fn properties(&self) -> &PropertyMap { &self.properties }
    pub fn properties_mut(&mut self) -> &mut PropertyMap { &mut self.properties }
    pub fn start(&self, db: &Db) -> Result<Vertex> { db.vertex().get(self.start) }
    pub fn end(&self, db: &Db) -> Result<Vertex> { db.vertex().get(self.end) }
    pub fn save(&self, db: &Db) -> Result<()> { db.edge_store().update(self.id, self.properties.clone()) }
    pub fn delete(self, db: &Db) -> Result<()> { db.edge_store().delete(self.id) }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}
impl Eq for Edge {}
impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

/// Holds the two entity stores and the scratch collection backing one
/// opened graph. The normalised schema (`Db::open`) is canonical; the
/// tuple-space schema (`Db::open_tuplespace`) is the alternate, opted into
/// at open time rather than as a runtime flag (spec §4.3).
pub struct Db {
    vertices: Arc<dyn VertexStore>,
    edges: Arc<dyn EdgeStore>,
    collection: Collection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let engine: Arc<dyn KvEngine> = Arc::new(SledEngine::open(path)?);
        Ok(Self::from_normalised_engine(engine))
    }

    pub fn open_tuplespace(path: impl AsRef<Path>) -> Result<Self> {
        let engine: Arc<dyn KvEngine> = Arc::new(SledEngine::open(path)?);
        Ok(Self::from_tuplespace_engine(engine))
    }

    /// `open`, with the cache size passed through opaquely to the
    /// underlying engine (spec §6).
    pub fn open_with_config(path: impl AsRef<Path>, config: DbConfig) -> Result<Self> {
        let engine: Arc<dyn KvEngine> = Arc::new(SledEngine::open_with_config(path, config)?);
        Ok(Self::from_normalised_engine(engine))
    }

    /// An ephemeral normalised-schema instance for tests and embedding
    /// scratch use.
    pub fn temporary() -> Result<Self> {
        let engine: Arc<dyn KvEngine> = Arc::new(SledEngine::temporary()?);
        Ok(Self::from_normalised_engine(engine))
    }

    pub fn temporary_tuplespace() -> Result<Self> {
        let engine: Arc<dyn KvEngine> = Arc::new(SledEngine::temporary()?);
        Ok(Self::from_tuplespace_engine(engine))
    }

    fn from_normalised_engine(engine: Arc<dyn KvEngine>) -> Self {
        Self {
            vertices: Arc::new(VertexTable::new(engine.clone())),
            edges: Arc::new(EdgeTable::new(engine.clone())),
            collection: Collection::new(engine),
        }
    }

    fn from_tuplespace_engine(engine: Arc<dyn KvEngine>) -> Self {
        let space = Arc::new(TupleSpace::new(engine.clone()));
        Self {
            vertices: Arc::new(TupleVertexStore::new(space.clone())),
            edges: Arc::new(TupleEdgeStore::new(space)),
            collection: Collection::new(engine),
        }
    }

    pub fn vertex(&self) -> VertexManager<'_> { VertexManager { db: self } }
    pub fn edge(&self) -> EdgeManager<'_> { EdgeManager { db: self } }

    /// The scratch key-value space co-located in the same store (spec §6);
    /// not used by the graph itself.
    pub fn set(&self, key: &str, value: crate::value::PropertyValue) -> Result<()> { self.collection.set(key, value) }
    pub fn get(&self, key: &str) -> Result<Option<crate::value::PropertyValue>> { self.collection.get(key) }
    pub fn remove(&self, key: &str) -> Result<()> { self.collection.remove(key) }

    pub(crate) fn vertex_store(&self) -> &dyn VertexStore { self.vertices.as_ref() }
    pub(crate) fn edge_store(&self) -> &dyn EdgeStore { self.edges.as_ref() }

    pub(crate) fn properties_of(&self, kind: Kind, id: u64) -> Result<PropertyMap> {
        match kind {
            Kind::Vertex => Ok(self.vertex_store().get(id)?.1),
            Kind::Edge => Ok(self.edge_store().get(id)?.3),
            Kind::Scalar => Err(crate::error::Error::InvalidArgument("a scalar token has no entity properties".into())),
        }
    }
}

/// Borrowed facade over `Db`'s vertex store; mirrors the original's
/// `VertexManager` (`ajgudb.py`) minus the implicit `self._graphdb` handle.
pub struct VertexManager<'a> {
    db: &'a Db,
}

impl<'a> VertexManager<'a> {
    /// Registers `name` for property indexing (normalised schema only; a
    /// no-op on the tuple-space schema, which indexes everything already).
    pub fn index(&self, name: &str) { self.db.vertices.index(name) }

    pub fn create(&self, label: &str, properties: PropertyMap) -> Result<Vertex> {
        let id = self.db.vertex_store().add(label, properties.clone())?;
        Ok(Vertex { id, label: label.to_owned(), properties })
    }

    pub fn get(&self, id: u64) -> Result<Vertex> {
        let (label, properties) = self.db.vertex_store().get(id)?;
        Ok(Vertex { id, label, properties })
    }

    /// `vertices(label) • where(properties) • limit(1) • get`, taking the
    /// first result if any (spec §4.4).
    pub fn one(&self, label: &str, properties: PropertyMap) -> Result<Option<Vertex>> {
        let pipeline = Pipeline::new()
            .push(Vertices { label: Some(label.to_owned()) })
            .push(Where { properties })
            .push(Limit { count: 1 })
            .push(Get);
        let mut stream = pipeline.run(self.db, Input::None)?;
        match stream.next() {
            Some(Ok(Token { value: Value::Vertex(v), .. })) => Ok(Some(v)),
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Not atomic — the caller accepts the race (spec §4.4).
    pub fn get_or_create(&self, label: &str, properties: PropertyMap) -> Result<Vertex> {
        match self.one(label, properties.clone())? {
            Some(v) => Ok(v),
            None => self.create(label, properties),
        }
    }

    /// Runs `vertices() • steps..` and returns the resulting lazy stream.
    pub fn query(&self, steps: Vec<Box<dyn Step>>) -> Result<TokenStream<'a>> {
        let mut all: Vec<Box<dyn Step>> = vec![Box::new(Vertices { label: None })];
        all.extend(steps);
        Pipeline::from_steps(all).run(self.db, Input::None)
    }
}

/// Borrowed facade over `Db`'s edge store; mirrors the original's
/// `EdgeManager`. There is no `create`: see [`Vertex::link`].
pub struct EdgeManager<'a> {
    db: &'a Db,
}

impl<'a> EdgeManager<'a> {
    pub fn index(&self, name: &str) { self.db.edges.index(name) }

    pub fn get(&self, id: u64) -> Result<Edge> {
        let (start, label, end, properties) = self.db.edge_store().get(id)?;
        Ok(Edge { id, start, label, end, properties })
    }

    pub fn one(&self, label: &str, properties: PropertyMap) -> Result<Option<Edge>> {
        let pipeline = Pipeline::new()
            .push(Edges { label: Some(label.to_owned()) })
            .push(Where { properties })
            .push(Limit { count: 1 })
            .push(Get);
        let mut stream = pipeline.run(self.db, Input::None)?;
        match stream.next() {
            Some(Ok(Token { value: Value::Edge(e), .. })) => Ok(Some(e)),
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    pub fn query(&self, steps: Vec<Box<dyn Step>>) -> Result<TokenStream<'a>> {
        let mut all: Vec<Box<dyn Step>> = vec![Box::new(Edges { label: None })];
        all.extend(steps);
        Pipeline::from_steps(all).run(self.db, Input::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyValue;

    #[test]
    fn create_and_link_vertices_then_walk_adjacency() {
        let db = Db::temporary().unwrap();
        let ash = db.vertex().create("person", PropertyMap::new()).unwrap();
        let mut props = PropertyMap::new();
        props.insert("name".into(), "misty".into());
        let misty = db.vertex().create("person", props).unwrap();
        ash.link(&db, "knows", &misty, PropertyMap::new()).unwrap();

        let out = ash.outgoings(&db).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].end(&db).unwrap(), misty);
        assert_eq!(out[0].start(&db).unwrap(), ash);
    }

    #[test]
    fn vertex_delete_cascades_incident_edges() {
        let db = Db::temporary().unwrap();
        let a = db.vertex().create("v", PropertyMap::new()).unwrap();
        let b = db.vertex().create("v", PropertyMap::new()).unwrap();
        let edge_id = a.link(&db, "rel", &b, PropertyMap::new()).unwrap().id();
        a.delete(&db).unwrap();
        assert!(matches!(db.edge().get(edge_id), Err(crate::error::Error::NotFound(_))));
    }

    #[test]
    fn get_or_create_reuses_existing_match() {
        let db = Db::temporary().unwrap();
        let mut props = PropertyMap::new();
        props.insert("name".into(), PropertyValue::Text("ash".into()));
        let created = db.vertex().create("person", props.clone()).unwrap();
        let found = db.vertex().get_or_create("person", props).unwrap();
        assert_eq!(created, found);
    }

    #[test]
    fn get_or_create_creates_when_absent() {
        let db = Db::temporary().unwrap();
        let mut props = PropertyMap::new();
        props.insert("name".into(), PropertyValue::Text("ash".into()));
        let v = db.vertex().get_or_create("person", props).unwrap();
        assert_eq!(db.vertex().get(v.id()).unwrap(), v);
    }

    #[test]
    fn scratch_collection_round_trips() {
        let db = Db::temporary().unwrap();
        db.set("bootstrap", PropertyValue::Integer(1)).unwrap();
        assert_eq!(db.get("bootstrap").unwrap(), Some(PropertyValue::Integer(1)));
        db.remove("bootstrap").unwrap();
        assert_eq!(db.get("bootstrap").unwrap(), None);
    }
}
