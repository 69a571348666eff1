//! Field definitions for entities.

use super::types::ScalarType;

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Declared scalar type.
    pub scalar: ScalarType,
    /// Whether the field must be present and non-null.
    pub required: bool,
    /// Maximum length in characters, for string fields.
    pub max_length: Option<usize>,
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            required: true,
            max_length: None,
        }
    }

    /// Create an optional (nullable) field.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            required: false,
            ..Self::new(name, scalar)
        }
    }

    /// Limit string length.
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}
