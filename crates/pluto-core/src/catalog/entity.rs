//! Entity definitions.

use pluto_proto::Value;

use super::field::FieldDef;
use crate::error::ConstraintError;

/// An entity definition (table mapping).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    /// Entity name (unique within schema).
    pub name: String,
    /// Backing table name. Defaults to the entity name.
    pub table: String,
    /// Name of the identity field.
    pub identity_field: String,
    /// Field definitions.
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>, identity_field: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            identity_field: identity_field.into(),
            fields: Vec::new(),
        }
    }

    /// Map the entity onto a differently named table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the entity declares a field with this name.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Check a record against the declared fields.
    ///
    /// Undeclared fields are tolerated and stored as-is.
    pub fn validate(&self, fields: &[(String, Value)]) -> Result<(), ConstraintError> {
        for def in &self.fields {
            let value = fields
                .iter()
                .find(|(name, _)| name == &def.name)
                .map(|(_, v)| v);

            let value = match value {
                None | Some(Value::Null) => {
                    if def.required {
                        return Err(ConstraintError::RequiredField {
                            entity: self.name.clone(),
                            field: def.name.clone(),
                        });
                    }
                    continue;
                }
                Some(v) => v,
            };

            if !def.scalar.accepts(value) {
                return Err(ConstraintError::TypeMismatch {
                    entity: self.name.clone(),
                    field: def.name.clone(),
                    expected: def.scalar.to_string(),
                    actual: value.type_name(),
                });
            }

            if let (Some(max), Value::String(s)) = (def.max_length, value) {
                let actual = s.chars().count();
                if actual > max {
                    return Err(ConstraintError::MaxLength {
                        entity: self.name.clone(),
                        field: def.name.clone(),
                        max,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }
}
