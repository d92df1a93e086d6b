//! The step catalogue (spec §4.5.2), grounded step-for-step in
//! `examples/original_source/ajgudb/gremlin.py`.

use std::sync::Arc;

use crate::codec::{self, Element};
use crate::error::{Error, Result};
use crate::graph::Db;
use crate::value::PropertyMap;
use crate::value::PropertyValue;

use super::{Kind, Pipeline, Input, Step, Token, TokenStream, Value};

fn entity_token_id(token: &Token, step_name: &str) -> Result<u64> {
    token.id().ok_or_else(|| Error::InvalidArgument(format!("{step_name} expects an entity token")))
}

/// A stable byte key for an arbitrary token value, used by `unique` and
/// `group_count` so dedup cost is O(1) amortised rather than O(n) per item.
fn dedup_key(value: &Value) -> Result<Vec<u8>> {
    Ok(match value {
        Value::Id(id) => codec::encode(&[Element::Int(*id as i64)])?,
        Value::Property(p) => rmp_serde::to_vec(p)?,
        Value::Vertex(v) => codec::encode(&[Element::Int(v.id() as i64)])?,
        Value::Edge(e) => codec::encode(&[Element::Int(e.id() as i64)])?,
        Value::List(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(dedup_key(item)?);
            }
            out
        }
        Value::Path(tokens) => {
            let mut out = Vec::new();
            for token in tokens {
                out.extend(dedup_key(&token.value)?);
            }
            out
        }
        Value::Counts(_) => return Err(Error::InvalidArgument("a group_count mapping cannot itself be deduplicated".into())),
    })
}

fn compare_values(a: &PropertyValue, b: &PropertyValue) -> Result<std::cmp::Ordering> {
    use PropertyValue::*;
    match (a, b) {
        (Integer(x), Integer(y)) => Ok(x.cmp(y)),
        (Text(x), Text(y)) => Ok(x.cmp(y)),
        (Bool(x), Bool(y)) => Ok(x.cmp(y)),
        (Float(x), Float(y)) => x.partial_cmp(y).ok_or_else(|| Error::InvalidArgument("NaN is not orderable".into())),
        _ => Err(Error::InvalidArgument("sort key values are not comparable".into())),
    }
}

fn default_sort_key(token: &Token) -> Result<PropertyValue> {
    match &token.value {
        Value::Id(id) => Ok(PropertyValue::Integer(*id as i64)),
        Value::Property(p) => Ok(p.clone()),
        _ => Err(Error::InvalidArgument("token has no natural sort key; pass an explicit key".into())),
    }
}

/// Source step: every vertex, or every vertex with `label` (spec §4.5.2).
pub struct Vertices {
    pub label: Option<String>,
}

impl Step for Vertices {
    fn apply<'a>(&self, db: &'a Db, _input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let ids = match &self.label {
            Some(label) => db.vertex_store().identifiers(label)?,
            None => db.vertex_store().all_identifiers()?,
        };
        Ok(Box::new(ids.into_iter().map(|id| Ok(Token::vertex(id)))))
    }
}

/// Source step: every edge, or every edge with `label`.
pub struct Edges {
    pub label: Option<String>,
}

impl Step for Edges {
    fn apply<'a>(&self, db: &'a Db, _input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let ids = match &self.label {
            Some(label) => db.edge_store().identifiers(label)?,
            None => db.edge_store().all_identifiers()?,
        };
        Ok(Box::new(ids.into_iter().map(|id| Ok(Token::edge(id)))))
    }
}

/// Source step: vertices whose `key` property equals `value` (spec §4.5.2).
pub struct SelectVertices {
    pub key: String,
    pub value: PropertyValue,
}

impl Step for SelectVertices {
    fn apply<'a>(&self, db: &'a Db, _input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let ids = db.vertex_store().keys(&self.key, &self.value)?;
        Ok(Box::new(ids.into_iter().map(|id| Ok(Token::vertex(id)))))
    }
}

/// Navigation: vertex-kind tokens -> edge-kind tokens, one per outgoing
/// adjacency row, in edge-id ascending order.
pub struct Outgoings;

impl Step for Outgoings {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let iter = input.flat_map(move |item| -> Box<dyn Iterator<Item = Result<Token>>> {
            let token = match item {
                Ok(t) => t,
                Err(e) => return Box::new(std::iter::once(Err(e))),
            };
            let id = match entity_token_id(&token, "outgoings") {
                Ok(id) => id,
                Err(e) => return Box::new(std::iter::once(Err(e))),
            };
            match db.edge_store().outgoings(id) {
                Ok(edge_ids) => Box::new(edge_ids.into_iter().map(move |eid| Ok(Token::with_parent(Value::Id(eid), Kind::Edge, token.clone())))),
                Err(e) => Box::new(std::iter::once(Err(e))),
            }
        });
        Ok(Box::new(iter))
    }
}

/// Navigation: vertex-kind tokens -> edge-kind tokens, via incoming
/// adjacency rows.
pub struct Incomings;

impl Step for Incomings {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let iter = input.flat_map(move |item| -> Box<dyn Iterator<Item = Result<Token>>> {
            let token = match item {
                Ok(t) => t,
                Err(e) => return Box::new(std::iter::once(Err(e))),
            };
            let id = match entity_token_id(&token, "incomings") {
                Ok(id) => id,
                Err(e) => return Box::new(std::iter::once(Err(e))),
            };
            match db.edge_store().incomings(id) {
                Ok(edge_ids) => Box::new(edge_ids.into_iter().map(move |eid| Ok(Token::with_parent(Value::Id(eid), Kind::Edge, token.clone())))),
                Err(e) => Box::new(std::iter::once(Err(e))),
            }
        });
        Ok(Box::new(iter))
    }
}

/// Navigation: edge-kind tokens -> the vertex each edge starts at.
pub struct Start;

impl Step for Start {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let iter = input.map(move |item| {
            let token = item?;
            let id = entity_token_id(&token, "start")?;
            let (start, _, _, _) = db.edge_store().get(id)?;
            Ok(Token::with_parent(Value::Id(start), Kind::Vertex, token))
        });
        Ok(Box::new(iter))
    }
}

/// Navigation: edge-kind tokens -> the vertex each edge ends at.
pub struct End;

impl Step for End {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let iter = input.map(move |item| {
            let token = item?;
            let id = entity_token_id(&token, "end")?;
            let (_, _, end, _) = db.edge_store().get(id)?;
            Ok(Token::with_parent(Value::Id(end), Kind::Vertex, token))
        });
        Ok(Box::new(iter))
    }
}

/// Projection: the single property `name`; silently drops tokens whose
/// entity lacks it (spec §4.5.2).
pub struct Key {
    pub name: String,
}

impl Step for Key {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let name = self.name.clone();
        let iter = input.filter_map(move |item| {
            let token = match item {
                Ok(t) => t,
                Err(e) => return Some(Err(e)),
            };
            let id = match entity_token_id(&token, "key") {
                Ok(id) => id,
                Err(e) => return Some(Err(e)),
            };
            match db.properties_of(token.kind, id) {
                Ok(properties) => properties.get(&name).cloned().map(|v| Ok(Token::with_parent(Value::Property(v), Kind::Scalar, token))),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::new(iter))
    }
}

/// Projection: a list of the named properties' values; a missing property
/// contributes `Null` rather than dropping the whole token.
pub struct Keys {
    pub names: Vec<String>,
}

impl Step for Keys {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let names = self.names.clone();
        let iter = input.map(move |item| {
            let token = item?;
            let id = entity_token_id(&token, "keys")?;
            let properties = db.properties_of(token.kind, id)?;
            let values =
                names.iter().map(|n| Value::Property(properties.get(n).cloned().unwrap_or(PropertyValue::Null))).collect();
            Ok(Token::with_parent(Value::List(values), Kind::Scalar, token))
        });
        Ok(Box::new(iter))
    }
}

/// Filter: drops tokens whose entity does not match every listed property
/// equality.
pub struct Where {
    pub properties: PropertyMap,
}

impl Step for Where {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let wanted = self.properties.clone();
        let iter = input.filter_map(move |item| {
            let token = match item {
                Ok(t) => t,
                Err(e) => return Some(Err(e)),
            };
            let id = match entity_token_id(&token, "where") {
                Ok(id) => id,
                Err(e) => return Some(Err(e)),
            };
            match db.properties_of(token.kind, id) {
                Ok(actual) => {
                    let matches = wanted.iter().all(|(k, v)| actual.get(k) == Some(v));
                    if matches { Some(Ok(token)) } else { None }
                }
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::new(iter))
    }
}

/// A user predicate called with `(graph, token)` (spec §4.5.2).
pub type Predicate = Arc<dyn Fn(&Db, &Token) -> Result<bool> + Send + Sync>;

pub struct Filter {
    pub predicate: Predicate,
}

impl Step for Filter {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let predicate = self.predicate.clone();
        let iter = input.filter_map(move |item| match item {
            Ok(token) => match predicate(db, &token) {
                Ok(true) => Some(Ok(token)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            },
            Err(e) => Some(Err(e)),
        });
        Ok(Box::new(iter))
    }
}

/// Lazy, insertion-ordered dedup by `value`; bounded memory is the number
/// of distinct values seen so far.
pub struct Unique;

impl Step for Unique {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let mut seen: std::collections::HashSet<Vec<u8>> = std::collections::HashSet::new();
        let iter = input.filter_map(move |item| match item {
            Ok(token) => match dedup_key(&token.value) {
                Ok(key) => {
                    if seen.insert(key) {
                        Some(Ok(token))
                    } else {
                        None
                    }
                }
                Err(e) => Some(Err(e)),
            },
            Err(e) => Some(Err(e)),
        });
        Ok(Box::new(iter))
    }
}

pub struct Skip {
    pub count: usize,
}

impl Step for Skip {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> { Ok(Box::new(input.skip(self.count))) }
}

pub struct Limit {
    pub count: usize,
}

impl Step for Limit {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> { Ok(Box::new(input.take(self.count))) }
}

/// Emits one list-token per window of `count`, flushing a partial tail.
pub struct Paginator {
    pub count: usize,
}

impl Step for Paginator {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let window = self.count.max(1);
        let mut input = input;
        let mut done = false;
        let iter = std::iter::from_fn(move || {
            if done {
                return None;
            }
            let mut page = Vec::new();
            while page.len() < window {
                match input.next() {
                    Some(Ok(token)) => page.push(token.value),
                    Some(Err(e)) => {
                        done = true;
                        return Some(Err(e));
                    }
                    None => {
                        done = true;
                        break;
                    }
                }
            }
            if page.is_empty() { None } else { Some(Ok(Token { value: Value::List(page), parent: None, kind: Kind::Scalar })) }
        });
        Ok(Box::new(iter))
    }
}

/// Fully consumes input into a buffer, sorts stably, re-emits (spec
/// §4.5.2). The only non-bounded-memory step besides `unique`/`paginator`.
pub type SortKeyFn = Arc<dyn Fn(&Db, &Token) -> Result<PropertyValue> + Send + Sync>;

pub struct Sort {
    pub key: Option<SortKeyFn>,
    pub reverse: bool,
}

impl Step for Sort {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let mut buffered = Vec::new();
        for item in input {
            let token = item?;
            let key = match &self.key {
                Some(f) => f(db, &token)?,
                None => default_sort_key(&token)?,
            };
            buffered.push((key, token));
        }
        // `sort_by`'s comparator must be infallible; stash the first
        // incompatible pair here and surface it after sorting settles.
        let mut error = None;
        buffered.sort_by(|a, b| match compare_values(&a.0, &b.0) {
            Ok(ordering) => if self.reverse { ordering.reverse() } else { ordering },
            Err(e) => {
                error.get_or_insert(e);
                std::cmp::Ordering::Equal
            }
        });
        if let Some(e) = error {
            return Err(e);
        }
        Ok(Box::new(buffered.into_iter().map(|(_, token)| Ok(token))))
    }
}

/// Terminal: the number of tokens.
pub struct Count;

impl Step for Count {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let mut total: i64 = 0;
        for item in input {
            item?;
            total += 1;
        }
        Ok(Box::new(std::iter::once(Ok(Token { value: Value::Property(PropertyValue::Integer(total)), parent: None, kind: Kind::Scalar }))))
    }
}

/// Terminal: the mean of numeric-valued tokens; undefined (an error) if
/// empty (spec §4.5.2).
pub struct Mean;

impl Step for Mean {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let mut total = 0.0_f64;
        let mut count = 0.0_f64;
        for item in input {
            let token = item?;
            let n = match &token.value {
                Value::Property(PropertyValue::Integer(i)) => *i as f64,
                Value::Property(PropertyValue::Float(f)) => *f,
                _ => return Err(Error::InvalidArgument("mean expects numeric-valued tokens".into())),
            };
            total += n;
            count += 1.0;
        }
        if count == 0.0 {
            return Err(Error::InvalidArgument("mean of an empty sequence is undefined".into()));
        }
        Ok(Box::new(std::iter::once(Ok(Token { value: Value::Property(PropertyValue::Float(total / count)), parent: None, kind: Kind::Scalar }))))
    }
}

/// Terminal: a value -> count mapping.
pub struct GroupCount;

impl Step for GroupCount {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let mut counts: std::collections::BTreeMap<Vec<u8>, (Value, i64)> = std::collections::BTreeMap::new();
        for item in input {
            let token = item?;
            let key = dedup_key(&token.value)?;
            counts.entry(key).or_insert_with(|| (token.value.clone(), 0)).1 += 1;
        }
        let pairs = counts.into_values().collect();
        Ok(Box::new(std::iter::once(Ok(Token { value: Value::Counts(pairs), parent: None, kind: Kind::Scalar }))))
    }
}

/// The `value` step: a lazy stream of raw `value` fields, spec-named
/// `value`; called `Values` here since `Value` already names the enum.
pub struct Values;

impl Step for Values {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        Ok(Box::new(input.map(|item| {
            let token = item?;
            let value = token.value.clone();
            Ok(Token::with_parent(value, Kind::Scalar, token))
        })))
    }
}

/// Terminal: full entity value objects (materialises).
pub struct Get;

impl Step for Get {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let iter = input.map(move |item| {
            let token = item?;
            let id = entity_token_id(&token, "get")?;
            let value = match token.kind {
                Kind::Vertex => Value::Vertex(db.vertex().get(id)?),
                Kind::Edge => Value::Edge(db.edge().get(id)?),
                Kind::Scalar => return Err(Error::InvalidArgument("get expects an entity token".into())),
            };
            Ok(Token::with_parent(value, Kind::Scalar, token))
        });
        Ok(Box::new(iter))
    }
}

/// Back-navigation: each token's parent.
pub struct Back;

impl Step for Back {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        Ok(Box::new(input.filter_map(|item| match item {
            Ok(token) => token.parent.map(|p| Ok((*p).clone())),
            Err(e) => Some(Err(e)),
        })))
    }
}

/// Back-navigation: a list of length `depth + 1` walking `depth` parent
/// links.
pub struct Path {
    pub depth: usize,
}

impl Step for Path {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let depth = self.depth;
        let iter = input.map(move |item| {
            let token = item?;
            let mut ancestors = vec![token.clone()];
            let mut current = token.parent.clone();
            for _ in 0..depth {
                match current {
                    Some(p) => {
                        ancestors.push((*p).clone());
                        current = p.parent.clone();
                    }
                    None => return Err(Error::InvalidArgument("path depth exceeds the token's parent chain".into())),
                }
            }
            Ok(Token::with_parent(Value::Path(ancestors), Kind::Scalar, token))
        });
        Ok(Box::new(iter))
    }
}

/// Higher-order: applies an inner pipeline over a token's contained
/// sequence (its [`Value::Path`] ancestors, if any — otherwise just the
/// token itself) and wraps the results as a new list-valued token. Mirrors
/// `each(proc)` in `examples/original_source/ajgudb/gremlin.py`, where
/// `proc` runs once per outer item over whatever that item's value holds.
pub struct Each {
    pub pipeline: Arc<Pipeline>,
}

impl Step for Each {
    fn apply<'a>(&self, db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let pipeline = self.pipeline.clone();
        let iter = input.map(move |item| {
            let token = item?;
            let sub_stream: TokenStream = match &token.value {
                Value::Path(tokens) => Box::new(tokens.clone().into_iter().map(Ok)),
                _ => Box::new(std::iter::once(Ok(token.clone()))),
            };
            let inner = pipeline.run(db, Input::Stream(sub_stream))?;
            let values: Result<Vec<Value>> = inner.map(|r| r.map(|t| t.value)).collect();
            Ok(Token::with_parent(Value::List(values?), Kind::Scalar, token))
        });
        Ok(Box::new(iter))
    }
}

/// Higher-order: explodes a list- or path-valued token into one token per
/// element, preserving each element's own kind when it is a [`Value::Path`].
pub struct Scatter;

impl Step for Scatter {
    fn apply<'a>(&self, _db: &'a Db, input: TokenStream<'a>) -> Result<TokenStream<'a>> {
        let iter = input.flat_map(|item| -> Box<dyn Iterator<Item = Result<Token>>> {
            let token = match item {
                Ok(t) => t,
                Err(e) => return Box::new(std::iter::once(Err(e))),
            };
            match &token.value {
                Value::Path(tokens) => Box::new(tokens.clone().into_iter().map(Ok)),
                Value::List(items) => {
                    let items = items.clone();
                    let parent = Arc::new(token.clone());
                    Box::new(items.into_iter().map(move |v| Ok(Token { value: v, parent: Some(parent.clone()), kind: Kind::Scalar })))
                }
                _ => Box::new(std::iter::once(Err(Error::InvalidArgument("scatter expects a list- or path-valued token".into())))),
            }
        });
        Ok(Box::new(iter))
    }
}
