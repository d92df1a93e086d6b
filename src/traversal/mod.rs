//! Gremlin-style traversal pipeline (spec §4.5), grounded in
//! `examples/original_source/ajgudb/gremlin.py`. A [`Step`] is a function
//! `(graph, input_seq) -> output_seq` over lazy streams of [`Token`]s; a
//! [`Pipeline`] composes steps left-to-right.

pub mod steps;

use std::sync::Arc;

use crate::error::Result;
use crate::graph::{Db, Edge, Vertex};
use crate::value::PropertyValue;

/// What kind of entity (if any) a token's `value` refers to. Non-entity
/// projections (`key`, `value`, `each`, ...) carry `Scalar`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Vertex,
    Edge,
    Scalar,
}

/// The payload a token carries on its hot channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A vertex or edge id, not yet materialised — the common case for
    /// everything between a source step and a terminal `get`.
    Id(u64),
    Property(PropertyValue),
    Vertex(Vertex),
    Edge(Edge),
    /// A plain list of projected values (e.g. `keys`'s output) — its
    /// elements carry no kind of their own.
    List(Vec<Value>),
    /// `path`'s ancestor chain: full tokens, each still carrying its own
    /// kind, so a following `each(get)` knows whether to fetch a vertex or
    /// an edge per element.
    Path(Vec<Token>),
    /// `group_count`'s value→count mapping. Not itself a valid input to
    /// further navigation steps.
    Counts(Vec<(Value, i64)>),
}

/// `(value, parent, kind)` (spec §4.5.1). The parent chain lets `back` and
/// `path` walk backwards without any side-channel state: every step writes
/// the token it consumed as the `parent` of each token it emits.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub value: Value,
    pub parent: Option<Arc<Token>>,
    pub kind: Kind,
}

impl Token {
    pub fn vertex(id: u64) -> Self { Self { value: Value::Id(id), parent: None, kind: Kind::Vertex } }
    pub fn edge(id: u64) -> Self { Self { value: Value::Id(id), parent: None, kind: Kind::Edge } }

    pub fn with_parent(value: Value, kind: Kind, parent: Token) -> Self { Self { value, kind, parent: Some(Arc::new(parent)) } }

    /// The id carried by an entity-kind token, or `None` for a scalar one.
    pub fn id(&self) -> Option<u64> {
        match self.value {
            Value::Id(id) => Some(id),
            _ => None,
        }
    }
}

/// A lazy stream of traversal tokens, borrowed from the `Db` it scans.
pub type TokenStream<'a> = Box<dyn Iterator<Item = Result<Token>> + 'a>;

/// One transducer over a token stream (spec §4.5.1). Steps are pure with
/// respect to their signature; closed-over configuration (`Limit { count:
/// 5 }`) makes a pipeline reusable across runs against the same input.
pub trait Step: Send + Sync {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>>;
}

/// The initial input to a pipeline run (spec §4.5.1).
pub enum Input<'a> {
    /// The first step must be a source step; it is expected to ignore
    /// this stream entirely.
    None,
    Vertex(Vertex),
    Edge(Edge),
    Token(Token),
    Stream(TokenStream<'a>),
}

/// A left-to-right composition of steps.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new() -> Self { Self { steps: Vec::new() } }

    pub fn from_steps(steps: Vec<Box<dyn Step>>) -> Self { Self { steps } }

    pub fn push(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn run<'a>(&self, db: &'a Db, input: Input<'a>) -> Result<TokenStream<'a>> {
        let mut stream: TokenStream<'a> = match input {
            Input::None => Box::new(std::iter::empty()),
            Input::Vertex(v) => Box::new(std::iter::once(Ok(Token::vertex(v.id())))),
            Input::Edge(e) => Box::new(std::iter::once(Ok(Token::edge(e.id())))),
            Input::Token(t) => Box::new(std::iter::once(Ok(t))),
            Input::Stream(s) => s,
        };
        for step in &self.steps {
            stream = step.apply(db, stream)?;
        }
        Ok(stream)
    }
}

impl Default for Pipeline {
    fn default() -> Self { Self::new() }
}
