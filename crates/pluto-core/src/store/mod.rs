//! Entity graph store and backing-store drivers.

mod driver;
mod entity;
mod graph;
mod key;
mod sled_driver;
mod stats;

pub use driver::{EntityIter, MemoryDriver, StoreDriver};
pub use entity::Entity;
pub use graph::{EntityStore, RemoveMode};
pub use key::ValueKey;
pub use sled_driver::{SledConfig, SledDriver};
pub use stats::{StatsSnapshot, StoreStats};
