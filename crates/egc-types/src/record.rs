//! Normalized record representation.
//!
//! A [`Record`] is the flattened form of one entity: a map from storage
//! field name to [`FieldValue`]. Inline objects (objects without identity)
//! reuse the same map type, nested inside their parent's record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::{IdentityKey, Reference};
use crate::TYPENAME_FIELD;

/// A single value stored under one field of a [`Record`].
///
/// Invariant: an identifiable object never appears as [`FieldValue::Object`];
/// the normalizer always replaces it with a [`FieldValue::Reference`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Ordered list; elements may mix references, scalars and inline objects.
    List(Vec<FieldValue>),
    /// Pointer to another record.
    Reference(Reference),
    /// Object without identity, stored inside its parent.
    Object(Record),
    /// Leaf value, including `null` and custom JSON scalars.
    Scalar(Value),
}

impl FieldValue {
    pub fn null() -> Self {
        FieldValue::Scalar(Value::Null)
    }

    pub fn reference(key: impl Into<IdentityKey>) -> Self {
        FieldValue::Reference(Reference::new(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(Value::Null))
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            FieldValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            FieldValue::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Append every key this value points at, in traversal order.
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a IdentityKey>) {
        match self {
            FieldValue::Reference(r) => out.push(r.key()),
            FieldValue::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            FieldValue::Object(record) => record.collect_references(out),
            FieldValue::Scalar(_) => {}
        }
    }

    /// Render as plain JSON, references as `{"__ref": key}`.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Reference(r) => {
                let mut map = serde_json::Map::new();
                map.insert("__ref".into(), Value::String(r.key().to_string()));
                Value::Object(map)
            }
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Object(record) => record.to_json(),
            FieldValue::Scalar(v) => v.clone(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<Reference> for FieldValue {
    fn from(reference: Reference) -> Self {
        FieldValue::Reference(reference)
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        FieldValue::Object(record)
    }
}

/// Flattened field map for one entity or inline object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(field)
    }

    /// Insert a field, returning the previous value if any.
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The stored `__typename`, if the record carries one.
    pub fn typename(&self) -> Option<&str> {
        self.fields
            .get(TYPENAME_FIELD)
            .and_then(FieldValue::as_scalar)
            .and_then(Value::as_str)
    }

    /// Every key referenced from this record, at any depth.
    pub fn references(&self) -> Vec<&IdentityKey> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a IdentityKey>) {
        for value in self.fields.values() {
            value.collect_references(out);
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
