//! Dynamically-typed property values.
//!
//! A property value is a tagged scalar, or a nested list/map of the same.
//! `Integer` and `Text` get a distinguished, order-preserving encoding in
//! the codec (spec §4.1); everything else is packed into a self-describing
//! msgpack blob and wrapped as [`crate::codec::Element::Opaque`] when it
//! needs to appear in an index key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::Element;
use crate::error::Result;

/// An entity's properties: a string-keyed map of dynamically-typed values.
/// `BTreeMap` gives deterministic iteration and msgpack encoding, which
/// matters for the property-index maintenance in §4.3.1 (stale index rows
/// must be computed from exactly the same map shape that produced them).
pub type PropertyMap = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Convert to the codec element used when this value appears as the
    /// value component of a property index key. `Integer`/`Text` keep their
    /// order-preserving encoding; everything else is opaque (unordered
    /// within itself, but still a valid equality key).
    pub fn to_index_element(&self) -> Result<Element> {
        Ok(match self {
            PropertyValue::Integer(i) => Element::Int(*i),
            PropertyValue::Text(s) => Element::Text(s.clone()),
            other => Element::Opaque(rmp_serde::to_vec(other)?),
        })
    }

    /// Inverse of [`Self::to_index_element`]; used by the tuple-space schema,
    /// where a property's value is stored (not just indexed) as a codec
    /// element and must come back out whole.
    pub fn from_index_element(element: &Element) -> Result<Self> {
        Ok(match element {
            Element::Int(i) => PropertyValue::Integer(*i),
            Element::Text(s) => PropertyValue::Text(s.clone()),
            Element::Bytes(b) => PropertyValue::Bytes(b.clone()),
            Element::Opaque(bytes) => rmp_serde::from_slice(bytes)?,
        })
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self { PropertyValue::Integer(v) }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self { PropertyValue::Text(v.to_owned()) }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self { PropertyValue::Text(v) }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self { PropertyValue::Bool(v) }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self { PropertyValue::Float(v) }
}

/// Pack a property map as the msgpack blob stored in an entity's primary row.
pub fn pack_properties(properties: &PropertyMap) -> Result<Vec<u8>> { Ok(rmp_serde::to_vec(properties)?) }

/// Unpack a property map from an entity's primary row.
pub fn unpack_properties(bytes: &[u8]) -> Result<PropertyMap> { Ok(rmp_serde::from_slice(bytes)?) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_property_map() {
        let mut map = PropertyMap::new();
        map.insert("name".into(), "ash".into());
        map.insert("age".into(), PropertyValue::Integer(42));
        map.insert("tags".into(), PropertyValue::List(vec!["a".into(), "b".into()]));
        let packed = pack_properties(&map).unwrap();
        let unpacked = unpack_properties(&packed).unwrap();
        assert_eq!(map, unpacked);
    }

    #[test]
    fn integer_and_text_keep_order_preserving_index_element() {
        assert_eq!(PropertyValue::Integer(5).to_index_element().unwrap(), Element::Int(5));
        assert_eq!(PropertyValue::Text("x".into()).to_index_element().unwrap(), Element::Text("x".into()));
    }

    #[test]
    fn other_values_are_opaque_in_index() {
        matches!(PropertyValue::Bool(true).to_index_element().unwrap(), Element::Opaque(_));
        matches!(PropertyValue::Float(1.5).to_index_element().unwrap(), Element::Opaque(_));
    }

    #[test]
    fn from_index_element_inverts_to_index_element() {
        for value in [PropertyValue::Integer(7), PropertyValue::Text("hi".into()), PropertyValue::Bool(true), PropertyValue::Null] {
            let element = value.to_index_element().unwrap();
            assert_eq!(PropertyValue::from_index_element(&element).unwrap(), value);
        }
    }
}
