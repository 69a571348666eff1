//! Loading strategy controller.
//!
//! Tracks, per `(entity, relation)`, whether a navigation has been resolved
//! and which entities are attached to it. Three ways in:
//!
//! - lazy: [`Loader::navigate`] resolves an unloaded navigation on access
//! - eager: [`Loader::eager_load`] resolves include paths for a whole result
//!   set, one batch pass per path segment
//! - explicit: [`Loader::load`] and [`Loader::load_batch`], optionally
//!   filtered or forced
//!
//! State sits behind `parking_lot` mutexes so navigation works through a
//! shared context.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use parking_lot::Mutex;
use pluto_proto::FilterExpr;

use super::state::{LoadState, NavEntry, NavKey};
use crate::config::ContextConfig;
use crate::error::Result;
use crate::store::{Entity, EntityStore};

/// Per-navigation load state and attached entities.
#[derive(Debug)]
pub struct Loader {
    lazy_loading: bool,
    n_plus_one_threshold: usize,
    entries: Mutex<HashMap<NavKey, NavEntry>>,
    /// Lazy resolutions per `(kind, relation)`.
    lazy_counts: Mutex<HashMap<(String, String), usize>>,
}

impl Loader {
    /// Create a loader from context configuration.
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            lazy_loading: config.lazy_loading,
            n_plus_one_threshold: config.n_plus_one_threshold,
            entries: Mutex::new(HashMap::new()),
            lazy_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Whether unloaded navigations resolve on access.
    pub fn lazy_loading(&self) -> bool {
        self.lazy_loading
    }

    /// Current state of a navigation.
    pub fn state(&self, entity: &Entity, relation: &str) -> LoadState {
        self.entries
            .lock()
            .get(&NavKey::new(entity, relation))
            .map(|e| e.state)
            .unwrap_or_default()
    }

    /// Entities currently attached to a navigation, without store access.
    pub fn current(&self, entity: &Entity, relation: &str) -> Vec<Entity> {
        self.entries
            .lock()
            .get(&NavKey::new(entity, relation))
            .map(|e| e.related.clone())
            .unwrap_or_default()
    }

    /// Number of lazy resolutions seen for a relation.
    pub fn lazy_resolutions(&self, kind: &str, relation: &str) -> usize {
        self.lazy_counts
            .lock()
            .get(&(kind.to_string(), relation.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Forget all navigation state.
    pub fn clear(&self) {
        self.entries.lock().clear();
        self.lazy_counts.lock().clear();
    }

    // ========== Lazy ==========

    /// Access a navigation.
    ///
    /// A `Loaded` navigation returns its attached entities. Otherwise, with
    /// lazy loading on, the navigation is resolved now (one resolution call)
    /// and marked `Loaded`; with it off, whatever is attached is returned
    /// without touching the store.
    pub fn navigate(&self, store: &EntityStore, entity: &Entity, relation: &str) -> Result<Vec<Entity>> {
        store.schema().relation(&entity.kind, relation)?;
        let key = NavKey::new(entity, relation);

        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_default();
            if entry.state == LoadState::Loaded || !self.lazy_loading {
                return Ok(entry.related.clone());
            }
            entry.state = LoadState::Loading;
        }

        match store.resolve_related(entity, relation) {
            Ok(related) => {
                self.record_lazy(&entity.kind, relation);
                let mut entries = self.entries.lock();
                let entry = entries.entry(key).or_default();
                entry.related = related.clone();
                entry.state = LoadState::Loaded;
                Ok(related)
            }
            Err(e) => {
                if let Some(entry) = self.entries.lock().get_mut(&key) {
                    entry.state = LoadState::Unloaded;
                }
                Err(e)
            }
        }
    }

    fn record_lazy(&self, kind: &str, relation: &str) {
        let count = {
            let mut counts = self.lazy_counts.lock();
            let count = counts
                .entry((kind.to_string(), relation.to_string()))
                .or_insert(0);
            *count += 1;
            *count
        };

        if self.n_plus_one_threshold > 0 && count == self.n_plus_one_threshold {
            tracing::warn!(
                entity = kind,
                relation,
                resolutions = count,
                "possible N+1 access pattern: relationship resolved lazily once per entity, \
                 consider include() or load_batch()"
            );
        }
    }

    // ========== Explicit ==========

    /// Explicitly load one navigation.
    ///
    /// Returns the number of entities newly attached. An unfiltered load
    /// replaces the attached entities and marks the navigation `Loaded`. A
    /// filtered load attaches the matches (replacing when forced, merging
    /// otherwise) and leaves the navigation not `Loaded`. A `Loaded`
    /// navigation is left alone unless `force` is set.
    pub fn load(
        &self,
        store: &EntityStore,
        entity: &Entity,
        relation: &str,
        filter: Option<&FilterExpr>,
        force: bool,
    ) -> Result<usize> {
        self.load_batch_inner(store, std::slice::from_ref(entity), relation, filter, force)
    }

    /// Explicitly load one navigation for a set of entities in one pass.
    ///
    /// Entities whose navigation is already `Loaded` are skipped.
    pub fn load_batch(
        &self,
        store: &EntityStore,
        entities: &[Entity],
        relation: &str,
        filter: Option<&FilterExpr>,
    ) -> Result<usize> {
        self.load_batch_inner(store, entities, relation, filter, false)
    }

    fn load_batch_inner(
        &self,
        store: &EntityStore,
        entities: &[Entity],
        relation: &str,
        filter: Option<&FilterExpr>,
        force: bool,
    ) -> Result<usize> {
        for kind in entities.iter().map(|e| e.kind.as_str()).collect::<HashSet<_>>() {
            store.schema().relation(kind, relation)?;
        }

        let pending = self.pending(entities, relation, force);
        if pending.is_empty() {
            tracing::debug!(relation, "navigation already loaded, skipping");
            return Ok(0);
        }

        let groups = resolve_per_kind(store, &pending, relation, filter)?;

        let mut attached = 0;
        let mut entries = self.entries.lock();
        for (parent, related) in pending.iter().zip(groups) {
            let entry = entries.entry(NavKey::new(parent, relation)).or_default();
            match filter {
                None => {
                    attached += related.len();
                    entry.related = related;
                    entry.state = LoadState::Loaded;
                }
                Some(_) if force => {
                    attached += related.len();
                    entry.related = related;
                    entry.state = LoadState::Unloaded;
                }
                Some(_) => attached += entry.merge(related),
            }
        }

        tracing::debug!(
            relation,
            parents = pending.len(),
            attached,
            filtered = filter.is_some(),
            force,
            "explicit load"
        );
        Ok(attached)
    }

    /// Distinct entities whose navigation still needs resolving.
    fn pending(&self, entities: &[Entity], relation: &str, force: bool) -> Vec<Entity> {
        let entries = self.entries.lock();
        let mut seen = HashSet::new();
        entities
            .iter()
            .filter(|e| seen.insert((e.kind.as_str(), e.id)))
            .filter(|e| {
                force
                    || entries
                        .get(&NavKey::new(e, relation))
                        .map_or(true, |entry| entry.state != LoadState::Loaded)
            })
            .cloned()
            .collect()
    }

    // ========== Eager ==========

    /// Resolve include paths for a result set.
    ///
    /// Each dotted path is walked one segment at a time; every segment is a
    /// single batch resolution over all entities reached so far. Prefixes
    /// shared between paths are resolved once.
    pub fn eager_load(&self, store: &EntityStore, entities: &[Entity], paths: &[String]) -> Result<()> {
        let mut levels: HashMap<String, Vec<Entity>> = HashMap::new();

        for path in paths {
            let mut parents = entities.to_vec();
            let mut prefix = String::new();

            for segment in path.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);

                if let Some(children) = levels.get(&prefix) {
                    parents = children.clone();
                    continue;
                }
                let children = self.eager_level(store, &parents, segment)?;
                levels.insert(prefix.clone(), children.clone());
                parents = children;
            }
        }

        tracing::debug!(
            paths = paths.len(),
            roots = entities.len(),
            passes = levels.len(),
            "eager load complete"
        );
        Ok(())
    }

    /// Resolve one navigation for every parent and return the distinct
    /// children, already-loaded navigations included.
    fn eager_level(&self, store: &EntityStore, parents: &[Entity], relation: &str) -> Result<Vec<Entity>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }

        let pending = self.pending(parents, relation, false);
        let resolved = if pending.is_empty() {
            Vec::new()
        } else {
            resolve_per_kind(store, &pending, relation, None)?
        };

        let mut entries = self.entries.lock();
        for (parent, related) in pending.iter().zip(resolved) {
            let entry = entries.entry(NavKey::new(parent, relation)).or_default();
            entry.related = related;
            entry.state = LoadState::Loaded;
        }

        let mut seen = HashSet::new();
        let mut children = Vec::new();
        for parent in parents {
            if let Some(entry) = entries.get(&NavKey::new(parent, relation)) {
                for child in &entry.related {
                    if seen.insert((child.kind.clone(), child.id)) {
                        children.push(child.clone());
                    }
                }
            }
        }
        Ok(children)
    }
}

/// Batch resolution with one pass per entity kind among `parents`.
///
/// Same-named navigations on different kinds are different relationships,
/// so each kind resolves separately. Groups come back in `parents` order.
fn resolve_per_kind(
    store: &EntityStore,
    parents: &[Entity],
    relation: &str,
    filter: Option<&FilterExpr>,
) -> Result<Vec<Vec<Entity>>> {
    let mut by_kind: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (position, parent) in parents.iter().enumerate() {
        by_kind.entry(parent.kind.as_str()).or_default().push(position);
    }
    if by_kind.len() <= 1 {
        return store.resolve_related_batch(parents, relation, filter);
    }

    let mut groups = vec![Vec::new(); parents.len()];
    for positions in by_kind.values() {
        let batch: Vec<Entity> = positions.iter().map(|&i| parents[i].clone()).collect();
        let resolved = store.resolve_related_batch(&batch, relation, filter)?;
        for (&position, related) in positions.iter().zip(resolved) {
            groups[position] = related;
        }
    }
    Ok(groups)
}
