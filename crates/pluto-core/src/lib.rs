//! Pluto Core - entity graph store, deferred queries and loading strategies.
//!
//! Queries are built from a [`Context`] as immutable expression chains and
//! only touch the store when a terminal operation runs. Navigations between
//! entities load lazily on access, eagerly through `include`, or explicitly
//! through [`Context::entry`] and [`Context::load_batch`].

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod loading;
pub mod query;
pub mod repository;
pub mod store;

pub use catalog::{
    Cardinality, DeleteBehavior, EdgeDef, EntityDef, FieldDef, RelationDef, ScalarType, Schema,
};
pub use config::ContextConfig;
pub use context::{Change, Context, EntryState};
pub use error::{ConstraintError, Error, Result};
pub use loading::{EntityEntry, LoadState, Loader, NavigationEntry};
pub use query::{Group, Pair, Predicate, Projection, Query, Record, ResultSet, Row};
pub use repository::Repository;
pub use store::{
    Entity, EntityStore, MemoryDriver, RemoveMode, SledConfig, SledDriver, StatsSnapshot,
    StoreDriver,
};

/// Re-export protocol types.
pub use pluto_proto as proto;
pub use pluto_proto::{FilterExpr, OrderDirection, OrderSpec, Pagination, Value};
