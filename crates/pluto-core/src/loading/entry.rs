//! Explicit loading handles.

use pluto_proto::FilterExpr;

use super::state::LoadState;
use crate::context::Context;
use crate::error::Result;
use crate::store::Entity;

/// Handle on one entity for explicit loading, from [`Context::entry`].
#[derive(Debug, Clone)]
pub struct EntityEntry<'ctx> {
    ctx: &'ctx Context,
    entity: Entity,
}

impl<'ctx> EntityEntry<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, entity: Entity) -> Self {
        Self { ctx, entity }
    }

    /// The entity this entry is for.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Handle on one of the entity's navigations.
    pub fn navigation(&self, relation: impl Into<String>) -> NavigationEntry<'ctx> {
        NavigationEntry {
            ctx: self.ctx,
            entity: self.entity.clone(),
            relation: relation.into(),
            filter: None,
            force: false,
        }
    }
}

/// Pending explicit load of one navigation.
///
/// Nothing happens until [`load`](NavigationEntry::load).
#[derive(Debug, Clone)]
pub struct NavigationEntry<'ctx> {
    ctx: &'ctx Context,
    entity: Entity,
    relation: String,
    filter: Option<FilterExpr>,
    force: bool,
}

impl<'ctx> NavigationEntry<'ctx> {
    /// Only load related entities matching `expr`. Repeated calls AND together.
    pub fn filter(mut self, expr: FilterExpr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and_also(expr),
            None => expr,
        });
        self
    }

    /// Reload even if the navigation is already loaded.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Resolve the navigation now. Returns the number of entities attached.
    pub fn load(&self) -> Result<usize> {
        self.ctx.loader().load(
            self.ctx.store(),
            &self.entity,
            &self.relation,
            self.filter.as_ref(),
            self.force,
        )
    }

    /// Current load state.
    pub fn state(&self) -> LoadState {
        self.ctx.loader().state(&self.entity, &self.relation)
    }

    /// Whether the navigation is fully loaded.
    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    /// Entities attached so far, without store access.
    pub fn current(&self) -> Vec<Entity> {
        self.ctx.loader().current(&self.entity, &self.relation)
    }
}
