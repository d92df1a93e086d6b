//! `vertexdb` is an embeddable labeled-property graph database: an
//! order-preserving binary key codec, an ordered-KV storage layer with two
//! interchangeable entity-store schemas, and a gremlin-style lazy
//! traversal pipeline on top.
//!
//! ```no_run
//! use vertexdb::{Db, PropertyMap};
//!
//! let db = Db::temporary()?;
//! let ash = db.vertex().create("trainer", PropertyMap::new())?;
//! let mut props = PropertyMap::new();
//! props.insert("name".into(), "pikachu".into());
//! let pikachu = db.vertex().create("pokemon", props)?;
//! ash.link(&db, "owns", &pikachu, PropertyMap::new())?;
//! # Ok::<(), vertexdb::Error>(())
//! ```

pub mod codec;
pub mod collection;
pub mod error;
pub mod graph;
pub mod kv;
pub mod store;
pub mod traversal;
pub mod value;

pub use collection::Collection;
pub use error::{Error, Result};
pub use graph::{Db, Edge, EdgeManager, Vertex, VertexManager};
pub use kv::DbConfig;
pub use traversal::steps;
pub use traversal::{Input, Kind, Pipeline, Step, Token, TokenStream, Value as TraversalValue};
pub use value::{PropertyMap, PropertyValue};
