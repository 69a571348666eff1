//! Backing-store drivers.
//!
//! A driver owns the raw rows, one table per entity kind, and knows nothing
//! about relationships. Referential rules live in
//! [`EntityStore`](super::EntityStore).

use std::collections::HashMap;

use indexmap::IndexMap;
use pluto_proto::FilterExpr;

use super::Entity;
use crate::catalog::Schema;
use crate::error::{ConstraintError, Result};
use crate::query::FilterEvaluator;

/// Lazy sequence of rows produced by a driver scan.
pub type EntityIter<'a> = Box<dyn Iterator<Item = Result<Entity>> + 'a>;

/// Primitive record operations the store is built on.
///
/// Scans return rows in insertion order. A filter passed to [`scan`] must be
/// applied by the driver; it is the pushed-down part of a query.
///
/// [`scan`]: StoreDriver::scan
pub trait StoreDriver: Send + Sync {
    /// Short driver name for logging.
    fn name(&self) -> &'static str;

    /// Create whatever per-table state the driver needs.
    fn prepare(&mut self, _schema: &Schema) -> Result<()> {
        Ok(())
    }

    /// Fetch a row by identifier.
    fn get(&self, table: &str, id: i64) -> Result<Option<Entity>>;

    /// Scan a table, keeping only rows matching `filter`.
    fn scan(&self, table: &str, filter: Option<FilterExpr>) -> Result<EntityIter<'_>>;

    /// Insert a new row. Fails with `DuplicateIdentity` if the id is taken.
    fn insert(&mut self, table: &str, entity: Entity) -> Result<()>;

    /// Overwrite an existing row, keeping its position. Returns `false` when
    /// no row had that id.
    fn replace(&mut self, table: &str, entity: Entity) -> Result<bool>;

    /// Delete a row. Returns `false` when no row had that id.
    fn delete(&mut self, table: &str, id: i64) -> Result<bool>;
}

/// In-memory driver. Rows live in insertion-ordered maps.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    tables: HashMap<String, IndexMap<i64, Entity>>,
}

impl MemoryDriver {
    /// Create an empty driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table.
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map(IndexMap::len).unwrap_or(0)
    }
}

impl StoreDriver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn prepare(&mut self, schema: &Schema) -> Result<()> {
        for entity in schema.entities.values() {
            self.tables.entry(entity.table.clone()).or_default();
        }
        Ok(())
    }

    fn get(&self, table: &str, id: i64) -> Result<Option<Entity>> {
        Ok(self.tables.get(table).and_then(|rows| rows.get(&id)).cloned())
    }

    fn scan(&self, table: &str, filter: Option<FilterExpr>) -> Result<EntityIter<'_>> {
        let Some(rows) = self.tables.get(table) else {
            return Ok(Box::new(std::iter::empty()));
        };
        Ok(Box::new(rows.values().filter_map(move |entity| {
            match &filter {
                Some(f) if !FilterEvaluator::evaluate(f, entity) => None,
                _ => Some(Ok(entity.clone())),
            }
        })))
    }

    fn insert(&mut self, table: &str, entity: Entity) -> Result<()> {
        let rows = self.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&entity.id) {
            return Err(ConstraintError::DuplicateIdentity {
                entity: entity.kind,
                id: entity.id,
            }
            .into());
        }
        rows.insert(entity.id, entity);
        Ok(())
    }

    fn replace(&mut self, table: &str, entity: Entity) -> Result<bool> {
        match self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&entity.id))
        {
            Some(slot) => {
                *slot = entity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&mut self, table: &str, id: i64) -> Result<bool> {
        Ok(self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.shift_remove(&id))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn course(id: i64, author_id: i64) -> Entity {
        Entity::new("Course", id)
            .with_field("id", id)
            .with_field("author_id", author_id)
    }

    #[test]
    fn test_insert_get_delete() {
        let mut driver = MemoryDriver::new();
        driver.insert("Course", course(10, 1)).unwrap();

        assert_eq!(driver.get("Course", 10).unwrap().unwrap().id, 10);
        assert!(driver.get("Course", 11).unwrap().is_none());
        assert!(driver.get("Author", 10).unwrap().is_none());

        assert!(driver.delete("Course", 10).unwrap());
        assert!(!driver.delete("Course", 10).unwrap());
        assert_eq!(driver.len("Course"), 0);
    }

    #[test]
    fn test_duplicate_insert() {
        let mut driver = MemoryDriver::new();
        driver.insert("Course", course(10, 1)).unwrap();

        let err = driver.insert("Course", course(10, 2)).unwrap_err();
        assert!(matches!(
            err,
            Error::ConstraintViolation(ConstraintError::DuplicateIdentity { id: 10, .. })
        ));
    }

    #[test]
    fn test_scan_preserves_order_after_delete() {
        let mut driver = MemoryDriver::new();
        for (id, author) in [(10, 1), (11, 1), (12, 2), (13, 1)] {
            driver.insert("Course", course(id, author)).unwrap();
        }
        driver.delete("Course", 11).unwrap();

        let ids: Vec<i64> = driver
            .scan("Course", None)
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec![10, 12, 13]);
    }

    #[test]
    fn test_scan_applies_filter() {
        let mut driver = MemoryDriver::new();
        for (id, author) in [(10, 1), (11, 1), (12, 2)] {
            driver.insert("Course", course(id, author)).unwrap();
        }

        let ids: Vec<i64> = driver
            .scan("Course", Some(FilterExpr::eq("author_id", 1)))
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut driver = MemoryDriver::new();
        driver.insert("Course", course(10, 1)).unwrap();
        driver.insert("Course", course(11, 1)).unwrap();

        assert!(driver.replace("Course", course(10, 2)).unwrap());
        assert!(!driver.replace("Course", course(99, 2)).unwrap());

        let first = driver.scan("Course", None).unwrap().next().unwrap().unwrap();
        assert_eq!(first.id, 10);
        assert_eq!(first.get("author_id"), Some(&pluto_proto::Value::Int64(2)));
    }
}
