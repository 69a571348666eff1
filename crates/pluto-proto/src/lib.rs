//! Pluto IR types.
//!
//! This crate defines the data-only vocabulary shared by the query engine:
//!
//! - [`value`] - Runtime scalar values held by entity fields
//! - [`query`] - Declarative filter, ordering and pagination expressions
//!
//! Nothing in here touches a store. Expressions are plain data, which is what
//! lets the engine inspect them (merge chained filters, push them down to a
//! driver) before anything executes.

pub mod query;
pub mod value;

pub use query::{FilterExpr, OrderDirection, OrderSpec, Pagination};
pub use value::Value;
