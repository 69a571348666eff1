//! Loading strategies for navigations: lazy, eager and explicit.

mod entry;
mod loader;
mod state;

pub use entry::{EntityEntry, NavigationEntry};
pub use loader::Loader;
pub use state::{LoadState, NavKey};
