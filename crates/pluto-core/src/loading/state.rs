//! Navigation load state.

use crate::store::Entity;

/// Load state of one navigation on one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing resolved yet, or only a filtered subset.
    #[default]
    Unloaded,
    /// Resolution in progress.
    Loading,
    /// Fully resolved. Further loads are no-ops unless forced.
    Loaded,
}

/// Identifies a navigation instance: `(kind, id, relation)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavKey {
    pub kind: String,
    pub id: i64,
    pub relation: String,
}

impl NavKey {
    /// Key for a navigation of an entity.
    pub fn new(entity: &Entity, relation: &str) -> Self {
        Self {
            kind: entity.kind.clone(),
            id: entity.id,
            relation: relation.to_string(),
        }
    }
}

/// Tracked state of a navigation plus the entities attached to it.
#[derive(Debug, Clone, Default)]
pub(crate) struct NavEntry {
    pub state: LoadState,
    pub related: Vec<Entity>,
}

impl NavEntry {
    /// Attach entities, skipping ones already attached.
    pub fn merge(&mut self, entities: Vec<Entity>) -> usize {
        let mut added = 0;
        for entity in entities {
            if !self.related.iter().any(|e| e.same_identity(&entity)) {
                self.related.push(entity);
                added += 1;
            }
        }
        added
    }
}
