//! Query execution.
//!
//! The executor turns a node chain into a lazy row iterator, replaying the
//! nodes in the order they were composed. Filter, projection, distinct and
//! skip/take stream; ordering, grouping, the right side of joins and
//! navigation stages buffer their input.

use std::cmp::Ordering;
use std::collections::HashSet;

use indexmap::IndexMap;
use pluto_proto::{FilterExpr, OrderDirection, OrderSpec, Value};

use super::expr::{Predicate, Projection, ProjectionItem, QueryNode};
use super::filter::{FieldSource, FilterEvaluator};
use super::join::JoinExecutor;
use super::row::{Group, Record, Row};
use crate::error::{Error, Result};
use crate::loading::Loader;
use crate::store::{Entity, EntityStore, ValueKey};

/// Lazy sequence of rows produced by a pipeline stage.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// Builds and runs execution pipelines.
pub struct QueryExecutor<'a> {
    store: &'a EntityStore,
    loader: &'a Loader,
}

impl<'a> QueryExecutor<'a> {
    /// Create an executor over a store and its loader.
    pub fn new(store: &'a EntityStore, loader: &'a Loader) -> Self {
        Self { store, loader }
    }

    /// Execute a query.
    ///
    /// When the chain declares include paths the result is materialized, the
    /// paths are resolved in one pass each, and the buffered rows are
    /// returned. Otherwise rows are produced on demand.
    pub fn execute(&self, node: &QueryNode) -> Result<RowIter<'a>> {
        let includes = node.include_paths();
        tracing::debug!(
            root = node.root_kind(),
            operations = node.depth(),
            includes = includes.len(),
            "executing query"
        );

        let rows = self.build(node)?;
        if includes.is_empty() {
            return Ok(rows);
        }

        let rows = collect(rows)?;
        let entities: Vec<Entity> = rows.iter().filter_map(Row::as_entity).cloned().collect();
        self.loader.eager_load(self.store, &entities, &includes)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn build(&self, node: &QueryNode) -> Result<RowIter<'a>> {
        match node {
            QueryNode::Source { kind } => self.scan(kind, None),

            QueryNode::Filter { input, predicate } => {
                if let Some((kind, filter)) = Self::pushdown(node) {
                    return self.scan(kind, Some(filter));
                }
                let rows = self.build(input)?;
                let predicate = predicate.clone();
                Ok(Box::new(rows.filter(move |row| match row {
                    Ok(r) => predicate.matches(r),
                    Err(_) => true,
                })))
            }

            QueryNode::OrderBy { input, keys } => {
                let mut rows = collect(self.build(input)?)?;
                sort_rows(&mut rows, keys);
                Ok(Box::new(rows.into_iter().map(Ok)))
            }

            QueryNode::Select { input, projection } => {
                let rows = self.build(input)?;
                self.project(rows, projection)
            }

            QueryNode::SelectMany { input, relation } => {
                let rows = collect(self.build(input)?)?;
                let entities = expect_entities(rows)?;
                let groups = self.store.resolve_related_batch(&entities, relation, None)?;
                Ok(Box::new(
                    groups.into_iter().flatten().map(|e| Ok(Row::Entity(e))),
                ))
            }

            QueryNode::Distinct { input } => {
                let rows = self.build(input)?;
                let mut seen = HashSet::new();
                Ok(Box::new(rows.filter(move |row| match row {
                    Ok(r) => seen.insert(r.distinct_key()),
                    Err(_) => true,
                })))
            }

            QueryNode::Skip { input, count } => {
                let rows = self.build(input)?;
                let mut remaining = *count;
                Ok(Box::new(rows.filter(move |row| {
                    if row.is_ok() && remaining > 0 {
                        remaining -= 1;
                        false
                    } else {
                        true
                    }
                })))
            }

            QueryNode::Take { input, count } => {
                let mut rows = self.build(input)?;
                let limit = *count;
                let mut taken = 0;
                Ok(Box::new(std::iter::from_fn(move || {
                    if taken >= limit {
                        return None;
                    }
                    let next = rows.next()?;
                    if next.is_ok() {
                        taken += 1;
                    }
                    Some(next)
                })))
            }

            QueryNode::GroupBy { input, key } => {
                let rows = collect(self.build(input)?)?;
                let mut groups: IndexMap<ValueKey, (Value, Vec<Row>)> = IndexMap::new();
                for row in rows {
                    let value = row.field(key).cloned().unwrap_or(Value::Null);
                    let group_key = ValueKey::from(&value);
                    groups
                        .entry(group_key)
                        .or_insert_with(|| (value, Vec::new()))
                        .1
                        .push(row);
                }
                Ok(Box::new(groups.into_values().map(|(key, items)| {
                    Ok(Row::Group(Group {
                        key,
                        owner: None,
                        items,
                    }))
                })))
            }

            QueryNode::Join { input, right, spec } => {
                let left = self.build(input)?;
                let right_rows = collect(self.build(right)?)?;
                Ok(JoinExecutor::execute(left, right_rows, spec))
            }

            QueryNode::Include { input, .. } => self.build(input),
        }
    }

    fn scan(&self, kind: &str, filter: Option<FilterExpr>) -> Result<RowIter<'a>> {
        if let Some(filter) = &filter {
            tracing::debug!(kind, ?filter, "pushing filter down to driver");
        }
        let rows = self.store.scan(kind, filter)?;
        Ok(Box::new(rows.map(|r| r.map(Row::Entity))))
    }

    /// Merge a run of declarative filters sitting directly on a source.
    ///
    /// Returns `None` if anything else (a closure filter, any other node)
    /// sits between `node` and the source.
    fn pushdown(node: &QueryNode) -> Option<(&str, FilterExpr)> {
        let mut exprs = Vec::new();
        let mut current = node;
        let kind = loop {
            match current {
                QueryNode::Filter {
                    input,
                    predicate: Predicate::Expr(expr),
                } => {
                    exprs.push(expr);
                    current = input;
                }
                QueryNode::Source { kind } => break kind,
                _ => return None,
            }
        };

        // Innermost filter was composed first.
        let mut exprs = exprs.into_iter().rev().cloned();
        let first = exprs.next()?;
        Some((kind.as_str(), exprs.fold(first, FilterExpr::and_also)))
    }

    fn project(&self, rows: RowIter<'a>, projection: &Projection) -> Result<RowIter<'a>> {
        let projection = projection.clone();
        let relations: Vec<String> = projection.relations().into_iter().map(String::from).collect();

        if relations.is_empty() {
            return Ok(Box::new(
                rows.map(move |row| row.and_then(|r| project_row(&projection, &r, &[]))),
            ));
        }

        // Navigation fields: one resolution pass per navigation for the whole input.
        let rows = collect(rows)?;
        let entities = rows
            .iter()
            .map(|r| {
                r.as_entity().cloned().ok_or(Error::UnexpectedShape {
                    expected: "entity",
                    found: r.shape(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut resolved = Vec::with_capacity(relations.len());
        for relation in &relations {
            let groups = self.store.resolve_related_batch(&entities, relation, None)?;
            resolved.push((relation.as_str(), groups));
        }

        let mut out = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let related: Vec<(&str, Option<&Entity>)> = resolved
                .iter()
                .map(|(name, groups)| (*name, groups.get(i).and_then(|g| g.first())))
                .collect();
            out.push(project_row(&projection, row, &related));
        }
        Ok(Box::new(out.into_iter()))
    }
}

fn project_row(
    projection: &Projection,
    row: &Row,
    related: &[(&str, Option<&Entity>)],
) -> Result<Row> {
    let mut record = Record::new();
    for item in &projection.items {
        let value = match item {
            ProjectionItem::Field { field, .. } => row.field(field).cloned().unwrap_or(Value::Null),
            ProjectionItem::Related {
                relation, field, ..
            } => related
                .iter()
                .find(|(name, _)| *name == relation.as_str())
                .and_then(|(_, entity)| *entity)
                .and_then(|e| e.get(field))
                .cloned()
                .unwrap_or(Value::Null),
            ProjectionItem::GroupKey { .. } => group_of(row)?.key.clone(),
            ProjectionItem::GroupCount { .. } => Value::Int64(group_of(row)?.len() as i64),
            ProjectionItem::Computed { func, .. } => func(row),
        };
        record.fields.push((item.alias().to_string(), value));
    }
    Ok(Row::Record(record))
}

fn group_of(row: &Row) -> Result<&Group> {
    row.as_group().ok_or(Error::UnexpectedShape {
        expected: "group",
        found: row.shape(),
    })
}

/// Drain a stage into memory, stopping at the first error.
pub(crate) fn collect(rows: RowIter<'_>) -> Result<Vec<Row>> {
    rows.collect()
}

/// Unwrap entity rows, failing on any other shape.
pub(crate) fn expect_entities(rows: Vec<Row>) -> Result<Vec<Entity>> {
    rows.into_iter()
        .map(|row| match row {
            Row::Entity(e) => Ok(e),
            other => Err(Error::UnexpectedShape {
                expected: "entity",
                found: other.shape(),
            }),
        })
        .collect()
}

/// Stable multi-key sort, nulls first.
pub(crate) fn sort_rows(rows: &mut [Row], keys: &[OrderSpec]) {
    rows.sort_by(|a, b| {
        for key in keys {
            let mut cmp = FilterEvaluator::sort_order(a.field(&key.field), b.field(&key.field));
            if key.direction == OrderDirection::Desc {
                cmp = cmp.reverse();
            }
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}
