//! Schema configuration.
//!
//! Every entity kind, its fields and its relationships are enumerated up
//! front in a [`Schema`] and handed to the store at initialization. Nothing is
//! discovered from attributes at runtime.

mod entity;
mod field;
mod relation;
mod schema;
mod types;

pub use entity::EntityDef;
pub use field::FieldDef;
pub use relation::{Cardinality, DeleteBehavior, Dependency, EdgeDef, RelationDef};
pub use schema::Schema;
pub use types::ScalarType;
