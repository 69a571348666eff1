//! The entity graph store.
//!
//! [`EntityStore`] sits on top of a [`StoreDriver`] and adds everything the
//! driver does not know about: the schema, relationship traversal by key, and
//! referential consistency on writes.

use std::collections::{HashMap, HashSet};

use pluto_proto::{FilterExpr, Value};

use super::driver::{EntityIter, MemoryDriver, StoreDriver};
use super::{Entity, StoreStats, ValueKey};
use crate::catalog::{DeleteBehavior, EntityDef, RelationDef, Schema};
use crate::config::DEFAULT_MAX_CASCADE_DEPTH;
use crate::error::{ConstraintError, Error, Result};

/// How `remove` treats dependents of a required relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoveMode {
    /// Fail while dependents exist, unless the relationship itself cascades.
    #[default]
    Restrict,
    /// Remove dependents too.
    Cascade,
}

/// Canonical set of entities per kind, plus relationship resolution.
pub struct EntityStore {
    schema: Schema,
    driver: Box<dyn StoreDriver>,
    stats: StoreStats,
    max_cascade_depth: usize,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("driver", &self.driver.name())
            .field("entities", &self.schema.entity_names())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[derive(Default)]
struct RemovalPlan {
    visited: HashSet<(String, i64)>,
    deletes: Vec<(String, i64)>,
    nullify: Vec<(String, i64, String)>,
}

impl EntityStore {
    /// Create a store over a driver. The schema is validated first.
    pub fn new(schema: Schema, mut driver: impl StoreDriver + 'static) -> Result<Self> {
        schema.validate()?;
        driver.prepare(&schema)?;
        tracing::debug!(
            driver = driver.name(),
            entities = schema.entities.len(),
            relations = schema.relations.len(),
            "entity store ready"
        );
        Ok(Self {
            schema,
            driver: Box::new(driver),
            stats: StoreStats::new(),
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        })
    }

    /// Create a store backed by a [`MemoryDriver`].
    pub fn in_memory(schema: Schema) -> Result<Self> {
        Self::new(schema, MemoryDriver::new())
    }

    /// Bound the recursion of cascading removals.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    pub(crate) fn set_max_cascade_depth(&mut self, depth: usize) {
        self.max_cascade_depth = depth;
    }

    /// The schema the store was built with.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Access counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Name of the backing driver.
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    // ========== Reads ==========

    /// Get an entity by identifier.
    pub fn get(&self, kind: &str, id: i64) -> Result<Entity> {
        self.find(kind, id)?.ok_or_else(|| Error::not_found(kind, id))
    }

    /// Get an entity by identifier, `None` when absent.
    pub fn find(&self, kind: &str, id: i64) -> Result<Option<Entity>> {
        let def = self.schema.entity(kind)?;
        self.stats.record_get();
        self.driver.get(&def.table, id)
    }

    /// Scan all entities of a kind, pushing `filter` down to the driver.
    pub fn scan(&self, kind: &str, filter: Option<FilterExpr>) -> Result<EntityIter<'_>> {
        let def = self.schema.entity(kind)?;
        self.scan_table(def, filter)
    }

    /// Lazy sequence of entities matching a declarative predicate.
    pub fn find_all(&self, kind: &str, predicate: FilterExpr) -> Result<EntityIter<'_>> {
        self.scan(kind, Some(predicate))
    }

    /// Lazy sequence of entities matching a closure.
    ///
    /// The closure cannot be handed to the driver, so every row of the kind is
    /// read and tested in-process.
    pub fn find_all_where<'a, F>(&'a self, kind: &str, predicate: F) -> Result<EntityIter<'a>>
    where
        F: Fn(&Entity) -> bool + 'a,
    {
        let rows = self.scan(kind, None)?;
        Ok(Box::new(rows.filter(move |row| match row {
            Ok(entity) => predicate(entity),
            Err(_) => true,
        })))
    }

    fn scan_table(&self, def: &EntityDef, filter: Option<FilterExpr>) -> Result<EntityIter<'_>> {
        self.stats.record_scan();
        self.driver.scan(&def.table, filter)
    }

    /// Value of a key field. The identity field always reads as the entity id,
    /// so detached entities built without it still resolve.
    pub fn key_value(&self, entity: &Entity, field: &str) -> Value {
        let is_identity = self
            .schema
            .get_entity(&entity.kind)
            .is_some_and(|def| def.identity_field == field);
        if is_identity {
            return Value::Int64(entity.id);
        }
        entity.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Related entities of one entity, read from the foreign-key side.
    pub fn resolve_related(&self, entity: &Entity, relation: &str) -> Result<Vec<Entity>> {
        let mut groups =
            self.resolve_related_batch(std::slice::from_ref(entity), relation, None)?;
        Ok(groups.pop().unwrap_or_default())
    }

    /// Resolve one relationship for a set of parents in a single pass.
    ///
    /// Returns one group per parent, in parent order; each group keeps the
    /// store order of the related rows. `filter` restricts which related rows
    /// are returned and is pushed down together with the key restriction.
    ///
    /// All parents must be of one kind; a mixed batch fails with
    /// `KindMismatch` before any store access.
    ///
    /// Algorithm (hash join):
    /// 1. Build: scan the foreign-key side once, restricted to the parents'
    ///    keys, into `key -> rows`
    /// 2. Probe: look each parent key up in the map
    pub fn resolve_related_batch(
        &self,
        parents: &[Entity],
        relation: &str,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Vec<Entity>>> {
        let Some(first) = parents.first() else {
            return Ok(Vec::new());
        };
        if let Some(other) = parents.iter().find(|p| p.kind != first.kind) {
            return Err(Error::KindMismatch {
                expected: first.kind.clone(),
                found: other.kind.clone(),
            });
        }
        let rel = self.schema.relation(&first.kind, relation)?;
        self.stats.record_resolution();

        let parent_keys: Vec<ValueKey> = parents
            .iter()
            .map(|p| ValueKey::from(&self.key_value(p, &rel.from_field)))
            .collect();
        let probe_values = distinct_values(
            parents
                .iter()
                .map(|p| self.key_value(p, &rel.from_field)),
        );

        tracing::debug!(
            relation = %rel.name,
            from = %rel.from_entity,
            to = %rel.to_entity,
            parents = parents.len(),
            keys = probe_values.len(),
            "resolving relationship"
        );

        if probe_values.is_empty() {
            return Ok(vec![Vec::new(); parents.len()]);
        }

        let by_key = match &rel.edge {
            None => {
                let target = self.schema.entity(&rel.to_entity)?;
                let pushdown = restrict(
                    FilterExpr::in_values(rel.to_field.clone(), probe_values),
                    filter,
                );
                let mut by_key: HashMap<ValueKey, Vec<Entity>> = HashMap::new();
                for row in self.scan_table(target, Some(pushdown))? {
                    let row = row?;
                    let key = ValueKey::from(&self.key_value(&row, &rel.to_field));
                    by_key.entry(key).or_default().push(row);
                }
                by_key
            }
            Some(_) => self.build_through_edge(rel, probe_values, filter)?,
        };

        Ok(parent_keys
            .iter()
            .map(|key| {
                if key.is_null() {
                    Vec::new()
                } else {
                    by_key.get(key).cloned().unwrap_or_default()
                }
            })
            .collect())
    }

    /// Build side of a many-to-many resolution: edge rows first, then the
    /// targets they point at.
    fn build_through_edge(
        &self,
        rel: &RelationDef,
        probe_values: Vec<Value>,
        filter: Option<&FilterExpr>,
    ) -> Result<HashMap<ValueKey, Vec<Entity>>> {
        let Some(edge) = &rel.edge else {
            return Ok(HashMap::new());
        };
        let edge_def = self.schema.entity(&edge.entity)?;
        let target = self.schema.entity(&rel.to_entity)?;

        let mut links: Vec<(ValueKey, ValueKey)> = Vec::new();
        let mut right_values = Vec::new();
        for row in self.scan_table(
            edge_def,
            Some(FilterExpr::in_values(edge.left_key.clone(), probe_values)),
        )? {
            let row = row?;
            let left = ValueKey::from(row.get(&edge.left_key));
            let right = row.get(&edge.right_key).cloned().unwrap_or(Value::Null);
            links.push((left, ValueKey::from(&right)));
            right_values.push(right);
        }

        let right_values = distinct_values(right_values.into_iter());
        if right_values.is_empty() {
            return Ok(HashMap::new());
        }

        let mut targets: HashMap<ValueKey, Vec<Entity>> = HashMap::new();
        let pushdown = restrict(
            FilterExpr::in_values(rel.to_field.clone(), right_values),
            filter,
        );
        for row in self.scan_table(target, Some(pushdown))? {
            let row = row?;
            let key = ValueKey::from(&self.key_value(&row, &rel.to_field));
            targets.entry(key).or_default().push(row);
        }

        let mut by_key: HashMap<ValueKey, Vec<Entity>> = HashMap::new();
        for (left, right) in links {
            if let Some(found) = targets.get(&right) {
                by_key.entry(left).or_default().extend(found.iter().cloned());
            }
        }
        Ok(by_key)
    }

    // ========== Writes ==========

    /// Insert a new entity.
    ///
    /// Checks declared fields, identity uniqueness, and that every foreign key
    /// references an existing principal.
    pub fn add(&mut self, mut entity: Entity) -> Result<()> {
        let def = self.schema.entity(&entity.kind)?;
        entity.normalize_identity(&def.identity_field);
        def.validate(&entity.fields)?;

        self.stats.record_get();
        if self.driver.get(&def.table, entity.id)?.is_some() {
            return Err(ConstraintError::DuplicateIdentity {
                entity: entity.kind,
                id: entity.id,
            }
            .into());
        }
        self.check_references(&entity)?;

        tracing::debug!(kind = %entity.kind, id = entity.id, "inserting entity");
        self.driver.insert(&def.table, entity)?;
        self.stats.record_write();
        Ok(())
    }

    /// Overwrite an existing entity with new field values.
    pub fn update(&mut self, mut entity: Entity) -> Result<()> {
        let def = self.schema.entity(&entity.kind)?;
        entity.normalize_identity(&def.identity_field);
        def.validate(&entity.fields)?;
        self.check_references(&entity)?;

        let (kind, id) = (entity.kind.clone(), entity.id);
        if !self.driver.replace(&def.table, entity)? {
            return Err(Error::not_found(kind, id));
        }
        self.stats.record_write();
        tracing::debug!(kind = %kind, id, "updated entity");
        Ok(())
    }

    /// Remove an entity, returning how many entities were deleted or had a
    /// foreign key nulled.
    ///
    /// Dependents are handled per relationship: `Cascade` relationships (or
    /// any required relationship under [`RemoveMode::Cascade`]) remove them,
    /// optional `SetNull` relationships null their foreign key, anything else
    /// fails with `RestrictViolation`. Edge rows of many-to-many relationships
    /// are always removed. Nothing is written unless the whole removal is
    /// allowed.
    pub fn remove(&mut self, kind: &str, id: i64, mode: RemoveMode) -> Result<usize> {
        let root = self.get(kind, id)?;

        let mut plan = RemovalPlan::default();
        self.plan_removal(root, mode, 0, &mut plan)?;

        let mut nullified = 0;
        for (dep_kind, dep_id, field) in &plan.nullify {
            if plan.visited.contains(&(dep_kind.clone(), *dep_id)) {
                continue;
            }
            let def = self.schema.entity(dep_kind)?;
            if let Some(mut dependent) = self.driver.get(&def.table, *dep_id)? {
                dependent.set(field.as_str(), Value::Null);
                self.driver.replace(&def.table, dependent)?;
                self.stats.record_write();
                nullified += 1;
            }
        }

        // Dependents were planned after their principals.
        for (del_kind, del_id) in plan.deletes.iter().rev() {
            let def = self.schema.entity(del_kind)?;
            self.driver.delete(&def.table, *del_id)?;
            self.stats.record_write();
        }

        tracing::info!(
            kind,
            id,
            ?mode,
            removed = plan.deletes.len(),
            nullified,
            "removed entity"
        );
        Ok(plan.deletes.len() + nullified)
    }

    fn plan_removal(
        &self,
        entity: Entity,
        mode: RemoveMode,
        depth: usize,
        plan: &mut RemovalPlan,
    ) -> Result<()> {
        if depth > self.max_cascade_depth {
            return Err(ConstraintError::MaxDepthExceeded {
                depth: self.max_cascade_depth,
            }
            .into());
        }
        if !plan.visited.insert((entity.kind.clone(), entity.id)) {
            return Ok(());
        }
        plan.deletes.push((entity.kind.clone(), entity.id));

        for rel in self.schema.dependents_of(&entity.kind) {
            let Some(dep) = rel.dependency() else {
                continue;
            };
            let key = self.key_value(&entity, dep.principal_key);
            if key.is_null() {
                continue;
            }

            let dependent_def = self.schema.entity(dep.dependent)?;
            let dependents = self
                .scan_table(dependent_def, Some(FilterExpr::eq(dep.foreign_key, key)))?
                .filter(|row| match row {
                    Ok(d) => !plan.visited.contains(&(d.kind.clone(), d.id)),
                    Err(_) => true,
                })
                .collect::<Result<Vec<_>>>()?;
            if dependents.is_empty() {
                continue;
            }

            match rel.on_delete {
                DeleteBehavior::SetNull if !rel.required => {
                    for d in dependents {
                        plan.nullify
                            .push((d.kind, d.id, dep.foreign_key.to_string()));
                    }
                }
                DeleteBehavior::Cascade => {
                    for d in dependents {
                        self.plan_removal(d, mode, depth + 1, plan)?;
                    }
                }
                _ if mode == RemoveMode::Cascade => {
                    for d in dependents {
                        self.plan_removal(d, mode, depth + 1, plan)?;
                    }
                }
                _ => {
                    return Err(ConstraintError::RestrictViolation {
                        entity: entity.kind.clone(),
                        id: entity.id,
                        referencing_entity: dep.dependent.to_string(),
                        relation: rel.name.clone(),
                        count: dependents.len(),
                    }
                    .into());
                }
            }
        }

        for rel in self.schema.edges_touching(&entity.kind) {
            let Some(edge) = &rel.edge else {
                continue;
            };
            let edge_def = self.schema.entity(&edge.entity)?;
            let mut sides = Vec::new();
            if rel.from_entity == entity.kind {
                sides.push((&edge.left_key, &rel.from_field));
            }
            if rel.to_entity == entity.kind {
                sides.push((&edge.right_key, &rel.to_field));
            }
            for (edge_field, key_field) in sides {
                let key = self.key_value(&entity, key_field);
                if key.is_null() {
                    continue;
                }
                let rows = self
                    .scan_table(edge_def, Some(FilterExpr::eq(edge_field.clone(), key)))?
                    .collect::<Result<Vec<_>>>()?;
                for row in rows {
                    self.plan_removal(row, mode, depth + 1, plan)?;
                }
            }
        }

        Ok(())
    }

    /// Every foreign key (and edge key) must point at an existing principal.
    fn check_references(&self, entity: &Entity) -> Result<()> {
        for rel in self.schema.principals_of(&entity.kind) {
            let Some(dep) = rel.dependency() else {
                continue;
            };
            let fk = self.key_value(entity, dep.foreign_key);
            if fk.is_null() {
                if rel.required {
                    return Err(missing_principal(entity, dep.foreign_key, dep.principal));
                }
                continue;
            }
            if !self.principal_exists(dep.principal, dep.principal_key, &fk)? {
                return Err(missing_principal(entity, dep.foreign_key, dep.principal));
            }
        }

        let edges = self
            .schema
            .relations
            .iter()
            .filter_map(|r| r.edge.as_ref().map(|e| (r, e)))
            .filter(|(_, e)| e.entity == entity.kind);
        for (rel, edge) in edges {
            for (field, principal, principal_key) in [
                (&edge.left_key, &rel.from_entity, &rel.from_field),
                (&edge.right_key, &rel.to_entity, &rel.to_field),
            ] {
                let key = self.key_value(entity, field);
                if key.is_null() || !self.principal_exists(principal, principal_key, &key)? {
                    return Err(missing_principal(entity, field, principal));
                }
            }
        }
        Ok(())
    }

    fn principal_exists(&self, kind: &str, key_field: &str, key: &Value) -> Result<bool> {
        let def = self.schema.entity(kind)?;
        if def.identity_field == key_field {
            if let Some(id) = key.as_i64() {
                self.stats.record_get();
                return Ok(self.driver.get(&def.table, id)?.is_some());
            }
        }
        let mut rows = self.scan_table(def, Some(FilterExpr::eq(key_field, key.clone())))?;
        Ok(rows.next().transpose()?.is_some())
    }
}

fn missing_principal(entity: &Entity, field: &str, principal: &str) -> Error {
    ConstraintError::MissingPrincipal {
        entity: entity.kind.clone(),
        field: field.to_string(),
        principal: principal.to_string(),
    }
    .into()
}

fn restrict(keys: FilterExpr, filter: Option<&FilterExpr>) -> FilterExpr {
    match filter {
        Some(f) => keys.and_also(f.clone()),
        None => keys,
    }
}

/// Non-null values in first-seen order, deduplicated by key.
fn distinct_values(values: impl Iterator<Item = Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .filter(|v| !v.is_null() && seen.insert(ValueKey::from(v)))
        .collect()
}
