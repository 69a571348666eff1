//! Deferred query engine.
//!
//! A [`Query`] is an immutable chain of [`QueryNode`]s. Building one does not
//! touch the store; a terminal operation hands the chain to the
//! [`QueryExecutor`], which replays it as an iterator pipeline.

mod aggregate;
mod builder;
mod executor;
mod expr;
mod filter;
mod join;
mod row;

pub use aggregate::AggregateExecutor;
pub use builder::{Query, ResultSet};
pub use executor::{QueryExecutor, RowIter};
pub use expr::{
    JoinKind, JoinSpec, Predicate, Projection, ProjectionItem, QueryNode, RowPredicate, RowValue,
};
pub use filter::{FieldSource, FilterEvaluator};
pub use join::JoinExecutor;
pub use row::{Group, Pair, Record, Row};
