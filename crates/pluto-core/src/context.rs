//! Unit of work over an entity store.
//!
//! A [`Context`] owns the store, the navigation loader and a list of staged
//! changes. Queries and navigation borrow it shared; staging and saving borrow
//! it mutably. Staged changes reach the store only through
//! [`Context::save_changes`].

use pluto_proto::FilterExpr;

use crate::catalog::Schema;
use crate::config::ContextConfig;
use crate::error::Result;
use crate::loading::{EntityEntry, LoadState, Loader};
use crate::query::{Query, QueryExecutor};
use crate::store::{Entity, EntityStore, RemoveMode, StatsSnapshot, StoreDriver};

/// State of a tracked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Modified,
    Deleted,
}

/// One staged change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert a new entity.
    Add(Entity),
    /// Overwrite an existing entity.
    Update(Entity),
    /// Remove an entity.
    Remove {
        kind: String,
        id: i64,
        mode: RemoveMode,
    },
}

impl Change {
    /// Tracked state this change represents.
    pub fn state(&self) -> EntryState {
        match self {
            Change::Add(_) => EntryState::Added,
            Change::Update(_) => EntryState::Modified,
            Change::Remove { .. } => EntryState::Deleted,
        }
    }

    /// Entity kind the change targets.
    pub fn kind(&self) -> &str {
        match self {
            Change::Add(e) | Change::Update(e) => &e.kind,
            Change::Remove { kind, .. } => kind,
        }
    }

    /// Identifier the change targets.
    pub fn id(&self) -> i64 {
        match self {
            Change::Add(e) | Change::Update(e) => e.id,
            Change::Remove { id, .. } => *id,
        }
    }
}

/// Entity store, loader and change tracker.
#[derive(Debug)]
pub struct Context {
    store: EntityStore,
    loader: Loader,
    config: ContextConfig,
    changes: Vec<Change>,
}

impl Context {
    /// Create a context over an in-memory store.
    pub fn new(schema: Schema, config: ContextConfig) -> Result<Self> {
        Ok(Self::from_store(EntityStore::in_memory(schema)?, config))
    }

    /// Create a context over a specific driver.
    pub fn with_driver(
        schema: Schema,
        driver: impl StoreDriver + 'static,
        config: ContextConfig,
    ) -> Result<Self> {
        Ok(Self::from_store(EntityStore::new(schema, driver)?, config))
    }

    /// Create a context over an existing store.
    pub fn from_store(mut store: EntityStore, config: ContextConfig) -> Self {
        store.set_max_cascade_depth(config.max_cascade_depth);
        tracing::debug!(
            driver = store.driver_name(),
            lazy_loading = config.lazy_loading,
            "context created"
        );
        Self {
            store,
            loader: Loader::new(&config),
            config,
            changes: Vec::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The navigation loader.
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        self.store.schema()
    }

    /// Snapshot of the store access counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.store.stats().snapshot()
    }

    pub(crate) fn executor(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(&self.store, &self.loader)
    }

    // ========== Queries ==========

    /// Start a deferred query over an entity kind.
    pub fn query(&self, kind: impl Into<String>) -> Query<'_> {
        Query::source(self, kind)
    }

    /// Get a saved entity by identifier.
    pub fn get(&self, kind: &str, id: i64) -> Result<Entity> {
        self.store.get(kind, id)
    }

    // ========== Loading ==========

    /// Access a navigation, resolving it lazily when enabled.
    pub fn navigate(&self, entity: &Entity, relation: &str) -> Result<Vec<Entity>> {
        self.loader.navigate(&self.store, entity, relation)
    }

    /// Load state of a navigation.
    pub fn load_state(&self, entity: &Entity, relation: &str) -> LoadState {
        self.loader.state(entity, relation)
    }

    /// Explicit-loading handle for an entity.
    pub fn entry(&self, entity: &Entity) -> EntityEntry<'_> {
        EntityEntry::new(self, entity.clone())
    }

    /// Explicitly load one navigation for many entities in one pass.
    pub fn load_batch(
        &self,
        entities: &[Entity],
        relation: &str,
        filter: Option<FilterExpr>,
    ) -> Result<usize> {
        self.loader
            .load_batch(&self.store, entities, relation, filter.as_ref())
    }

    // ========== Change tracking ==========

    /// Stage an insert.
    pub fn add(&mut self, entity: Entity) {
        self.changes.push(Change::Add(entity));
    }

    /// Stage an update.
    pub fn update(&mut self, entity: Entity) {
        self.changes.push(Change::Update(entity));
    }

    /// Stage a removal that fails on required dependents.
    pub fn remove(&mut self, kind: impl Into<String>, id: i64) {
        self.changes.push(Change::Remove {
            kind: kind.into(),
            id,
            mode: RemoveMode::Restrict,
        });
    }

    /// Stage a removal that takes required dependents with it.
    pub fn remove_cascade(&mut self, kind: impl Into<String>, id: i64) {
        self.changes.push(Change::Remove {
            kind: kind.into(),
            id,
            mode: RemoveMode::Cascade,
        });
    }

    /// Stage inserts for several entities, in iteration order.
    pub fn add_range(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.changes.extend(entities.into_iter().map(Change::Add));
    }

    /// Stage restricting removals for several entities, in iteration order.
    pub fn remove_range<'e>(&mut self, entities: impl IntoIterator<Item = &'e Entity>) {
        for entity in entities {
            self.remove(entity.kind.clone(), entity.id);
        }
    }

    /// Staged changes, in staging order.
    pub fn entries(&self) -> &[Change] {
        &self.changes
    }

    /// Whether anything is staged.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drop every staged change.
    pub fn discard_changes(&mut self) {
        tracing::debug!(discarded = self.changes.len(), "discarding staged changes");
        self.changes.clear();
    }

    /// Commit staged changes in staging order.
    ///
    /// Returns the number of affected entities, cascaded removals and nulled
    /// foreign keys included. On error the changes committed so far stay
    /// committed and the failing change, with everything staged after it,
    /// stays staged. Navigation state is reset either way.
    pub fn save_changes(&mut self) -> Result<usize> {
        let staged = self.changes.len();
        let mut affected = 0;
        let mut applied = 0;

        let result = loop {
            let Some(change) = self.changes.get(applied) else {
                break Ok(());
            };
            let outcome = match change.clone() {
                Change::Add(entity) => self.store.add(entity).map(|()| 1),
                Change::Update(entity) => self.store.update(entity).map(|()| 1),
                Change::Remove { kind, id, mode } => self.store.remove(&kind, id, mode),
            };
            match outcome {
                Ok(n) => {
                    affected += n;
                    applied += 1;
                }
                Err(e) => break Err(e),
            }
        };

        self.changes.drain(..applied);
        self.loader.clear();

        match result {
            Ok(()) => {
                tracing::info!(changes = staged, affected, "saved changes");
                Ok(affected)
            }
            Err(e) => {
                tracing::warn!(
                    applied,
                    pending = self.changes.len(),
                    error = %e,
                    "save stopped at failing change"
                );
                Err(e)
            }
        }
    }
}
