//! Kind-scoped repositories over a context.
//!
//! A [`Repository`] fixes one entity kind and groups the usual lookups and
//! staging calls for it. Reads go through deferred queries and see only
//! saved state; writes are staged on the context until
//! [`Repository::save_changes`] (or [`Context::save_changes`]) runs.
//!
//! Domain repositories wrap one and add their own named queries:
//!
//! ```ignore
//! struct CourseRepository<'ctx>(Repository<'ctx>);
//!
//! impl CourseRepository<'_> {
//!     fn top_selling(&self, count: usize) -> Result<Vec<Entity>> {
//!         self.0.query().order_by_desc("full_price").take(count).to_entities()
//!     }
//! }
//! ```

use crate::context::Context;
use crate::error::{Error, Result};
use crate::query::{Predicate, Query};
use crate::store::Entity;

/// Lookups and staging for one entity kind.
#[derive(Debug)]
pub struct Repository<'ctx> {
    ctx: &'ctx mut Context,
    kind: String,
}

impl<'ctx> Repository<'ctx> {
    /// Repository for `kind`. Fails with `UnknownEntity` if the kind is not
    /// declared.
    pub fn new(ctx: &'ctx mut Context, kind: impl Into<String>) -> Result<Self> {
        let kind = kind.into();
        ctx.schema().entity(&kind)?;
        Ok(Self { ctx, kind })
    }

    /// Entity kind this repository is scoped to.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The underlying context.
    pub fn context(&self) -> &Context {
        &*self.ctx
    }

    /// Deferred query over every entity of the kind.
    pub fn query(&self) -> Query<'_> {
        self.ctx.query(self.kind.as_str())
    }

    // ========== Finding ==========

    /// Entity by identifier, `NotFound` when absent.
    pub fn get(&self, id: i64) -> Result<Entity> {
        self.ctx.get(&self.kind, id)
    }

    /// Every saved entity, in store order.
    pub fn all(&self) -> Result<Vec<Entity>> {
        self.query().to_entities()
    }

    /// Entities matching a predicate.
    pub fn find(&self, predicate: impl Into<Predicate>) -> Result<Vec<Entity>> {
        self.query().filter_with(predicate).to_entities()
    }

    /// The only matching entity, `None` when nothing matches and
    /// `MultipleResults` when more than one does.
    pub fn single_or_default(&self, predicate: impl Into<Predicate>) -> Result<Option<Entity>> {
        let row = self.query().filter_with(predicate).single_or_default()?;
        row.map(|row| {
            let shape = row.shape();
            row.into_entity().ok_or(Error::UnexpectedShape {
                expected: "entity",
                found: shape,
            })
        })
        .transpose()
    }

    // ========== Adding ==========

    /// Stage an insert.
    pub fn add(&mut self, entity: Entity) -> Result<()> {
        self.check_kind(&entity)?;
        self.ctx.add(entity);
        Ok(())
    }

    /// Stage inserts for several entities. Nothing is staged if any of them
    /// is of another kind.
    pub fn add_range(&mut self, entities: impl IntoIterator<Item = Entity>) -> Result<()> {
        let entities: Vec<Entity> = entities.into_iter().collect();
        for entity in &entities {
            self.check_kind(entity)?;
        }
        self.ctx.add_range(entities);
        Ok(())
    }

    // ========== Removing ==========

    /// Stage a restricting removal.
    pub fn remove(&mut self, entity: &Entity) -> Result<()> {
        self.check_kind(entity)?;
        self.ctx.remove(self.kind.clone(), entity.id);
        Ok(())
    }

    /// Stage restricting removals for several entities. Nothing is staged if
    /// any of them is of another kind.
    pub fn remove_range<'e>(&mut self, entities: impl IntoIterator<Item = &'e Entity>) -> Result<()> {
        let entities: Vec<&Entity> = entities.into_iter().collect();
        for entity in &entities {
            self.check_kind(entity)?;
        }
        self.ctx.remove_range(entities);
        Ok(())
    }

    /// Commit everything staged on the context.
    pub fn save_changes(&mut self) -> Result<usize> {
        self.ctx.save_changes()
    }

    fn check_kind(&self, entity: &Entity) -> Result<()> {
        if entity.kind == self.kind {
            Ok(())
        } else {
            Err(Error::KindMismatch {
                expected: self.kind.clone(),
                found: entity.kind.clone(),
            })
        }
    }
}

impl Context {
    /// Repository scoped to one entity kind.
    pub fn repository(&mut self, kind: impl Into<String>) -> Result<Repository<'_>> {
        Repository::new(self, kind)
    }
}
