//! Entity records held by the store.

use pluto_proto::Value;

use crate::query::FieldSource;

/// A typed, identified record.
///
/// Entities carry no navigation pointers. Related entities are reached through
/// the store by key, or through the loader's attached navigation state.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Entity kind (schema entity name).
    pub kind: String,
    /// Identifier, unique within the kind.
    pub id: i64,
    /// Scalar fields in declaration order.
    pub fields: Vec<(String, Value)>,
}

impl Entity {
    /// Create an entity with no fields.
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
            fields: Vec::new(),
        }
    }

    /// Add (or replace) a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Get a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Set a field, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Whether this is the same stored record (kind and id).
    pub fn same_identity(&self, other: &Entity) -> bool {
        self.id == other.id && self.kind == other.kind
    }

    /// Make sure the identity field is present and agrees with `id`.
    pub(crate) fn normalize_identity(&mut self, identity_field: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == identity_field) {
            Some((_, slot)) => *slot = Value::Int64(self.id),
            None => self
                .fields
                .insert(0, (identity_field.to_string(), Value::Int64(self.id))),
        }
    }
}

impl FieldSource for Entity {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}
