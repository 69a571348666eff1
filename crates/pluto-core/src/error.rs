//! Core error types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the store, query engine and loaders.
#[derive(Debug, Error)]
pub enum Error {
    /// A lookup or single-expecting terminal found nothing.
    #[error("{entity} not found{}", .id.map(|id| format!(" (id {id})")).unwrap_or_default())]
    NotFound {
        /// Entity kind (or query root).
        entity: String,
        /// Identifier, when the lookup was by key.
        id: Option<i64>,
    },

    /// A single-expecting terminal found more than one row.
    #[error("expected a single result, found {count}")]
    MultipleResults {
        /// Number of rows seen before giving up (at least 2).
        count: usize,
    },

    /// A write would break a declared constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] ConstraintError),

    /// A navigation name is not declared on the entity.
    #[error("unknown relationship '{relation}' on {entity}")]
    UnknownRelationship {
        /// Entity kind the navigation was requested on.
        entity: String,
        /// Requested navigation name.
        relation: String,
    },

    /// An entity of one kind was passed where another was required.
    #[error("expected {expected} entity, found {found}")]
    KindMismatch {
        /// Required kind.
        expected: String,
        /// Kind that was passed.
        found: String,
    },

    /// The entity kind is not declared in the schema.
    #[error("unknown entity type '{0}'")]
    UnknownEntity(String),

    /// A terminal expected rows of a different shape.
    #[error("expected {expected} rows, found {found}")]
    UnexpectedShape {
        /// Expected row shape.
        expected: &'static str,
        /// Shape encountered.
        found: &'static str,
    },

    /// Schema definition is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backing store error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Shorthand for a keyed `NotFound`.
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: Some(id),
        }
    }

    /// Shorthand for `UnknownRelationship`.
    pub fn unknown_relationship(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        Error::UnknownRelationship {
            entity: entity.into(),
            relation: relation.into(),
        }
    }
}

/// Constraint violations raised by `add`, `update`, `remove` and `save_changes`.
#[derive(Debug, Error, PartialEq)]
pub enum ConstraintError {
    /// Identifier already present in the entity set.
    #[error("{entity} with id {id} already exists")]
    DuplicateIdentity { entity: String, id: i64 },

    /// Required field missing or null.
    #[error("{entity}.{field} is required")]
    RequiredField { entity: String, field: String },

    /// String longer than the declared maximum.
    #[error("{entity}.{field} exceeds max length {max} (got {actual})")]
    MaxLength {
        entity: String,
        field: String,
        max: usize,
        actual: usize,
    },

    /// Value type does not match the declared scalar type.
    #[error("{entity}.{field} expects {expected}, got {actual}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        actual: &'static str,
    },

    /// Required relationship points at a principal that does not exist.
    #[error("{entity}.{field} references missing {principal}")]
    MissingPrincipal {
        entity: String,
        field: String,
        principal: String,
    },

    /// Removal blocked by dependents of a required relationship.
    #[error("cannot remove {entity} {id}: referenced by {count} {referencing_entity} via '{relation}'")]
    RestrictViolation {
        entity: String,
        id: i64,
        referencing_entity: String,
        relation: String,
        count: usize,
    },

    /// Cascade recursion exceeded the configured depth.
    #[error("cascade exceeded max depth {depth}")]
    MaxDepthExceeded { depth: usize },
}
