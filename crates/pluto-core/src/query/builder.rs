//! Query builder and terminal operations.

use std::sync::Arc;

use pluto_proto::{FilterExpr, OrderSpec, Pagination, Value};

use super::aggregate::AggregateExecutor;
use super::executor::RowIter;
use super::expr::{JoinKind, JoinSpec, Predicate, Projection, QueryNode};
use super::row::Row;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::store::Entity;

/// A deferred query over a context.
///
/// Every builder method returns a new `Query` whose node wraps this one's, so
/// a query can be extended in several directions without affecting the
/// original. Nothing is read from the store until a terminal operation
/// (`iter`, `to_list`, `count`, `single`, ...) runs, and every terminal
/// re-executes the chain against the store as it is at that moment.
#[derive(Debug, Clone)]
pub struct Query<'ctx> {
    ctx: &'ctx Context,
    node: Arc<QueryNode>,
}

impl<'ctx> Query<'ctx> {
    pub(crate) fn source(ctx: &'ctx Context, kind: impl Into<String>) -> Self {
        Self {
            ctx,
            node: Arc::new(QueryNode::Source { kind: kind.into() }),
        }
    }

    fn wrap(&self, node: QueryNode) -> Self {
        Self {
            ctx: self.ctx,
            node: Arc::new(node),
        }
    }

    /// The expression node this query ends in.
    pub fn node(&self) -> &Arc<QueryNode> {
        &self.node
    }

    /// Entity kind the query starts from.
    pub fn root_kind(&self) -> &str {
        self.node.root_kind()
    }

    // ========== Builders ==========

    /// Keep rows matching a declarative filter.
    pub fn filter(&self, expr: FilterExpr) -> Self {
        self.wrap(QueryNode::Filter {
            input: self.node.clone(),
            predicate: Predicate::Expr(expr),
        })
    }

    /// Keep rows matching a closure. Evaluated in-process, never pushed down.
    pub fn filter_fn<F>(&self, f: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        self.wrap(QueryNode::Filter {
            input: self.node.clone(),
            predicate: Predicate::func(f),
        })
    }

    /// Keep rows matching either kind of predicate.
    pub fn filter_with(&self, predicate: impl Into<Predicate>) -> Self {
        self.wrap(QueryNode::Filter {
            input: self.node.clone(),
            predicate: predicate.into(),
        })
    }

    /// Sort ascending by a field.
    pub fn order_by(&self, field: impl Into<String>) -> Self {
        self.sorted(OrderSpec::asc(field))
    }

    /// Sort descending by a field.
    pub fn order_by_desc(&self, field: impl Into<String>) -> Self {
        self.sorted(OrderSpec::desc(field))
    }

    /// Add an ascending tie-break key to the preceding ordering.
    pub fn then_by(&self, field: impl Into<String>) -> Self {
        self.then_sorted(OrderSpec::asc(field))
    }

    /// Add a descending tie-break key to the preceding ordering.
    pub fn then_by_desc(&self, field: impl Into<String>) -> Self {
        self.then_sorted(OrderSpec::desc(field))
    }

    fn sorted(&self, key: OrderSpec) -> Self {
        self.wrap(QueryNode::OrderBy {
            input: self.node.clone(),
            keys: vec![key],
        })
    }

    // A directly preceding ordering is extended in place. Behind filter,
    // skip, take, distinct or include the rows are still in that order, so
    // they are re-sorted here by its keys plus the new one. Any other stage
    // (or none) means there is no ordering to refine and this starts one.
    fn then_sorted(&self, key: OrderSpec) -> Self {
        if let QueryNode::OrderBy { input, keys } = &*self.node {
            let mut keys = keys.clone();
            keys.push(key);
            return self.wrap(QueryNode::OrderBy {
                input: input.clone(),
                keys,
            });
        }

        let mut keys = preceding_order(&self.node).unwrap_or_default();
        keys.push(key);
        self.wrap(QueryNode::OrderBy {
            input: self.node.clone(),
            keys,
        })
    }

    /// Reshape rows into records.
    pub fn select(&self, projection: Projection) -> Self {
        self.wrap(QueryNode::Select {
            input: self.node.clone(),
            projection,
        })
    }

    /// Replace each entity by the entities of one of its navigations.
    pub fn select_many(&self, relation: impl Into<String>) -> Self {
        self.wrap(QueryNode::SelectMany {
            input: self.node.clone(),
            relation: relation.into(),
        })
    }

    /// Drop repeated rows, keeping the first occurrence.
    pub fn distinct(&self) -> Self {
        self.wrap(QueryNode::Distinct {
            input: self.node.clone(),
        })
    }

    /// Skip the first `count` rows.
    pub fn skip(&self, count: usize) -> Self {
        self.wrap(QueryNode::Skip {
            input: self.node.clone(),
            count,
        })
    }

    /// Keep at most `count` rows.
    pub fn take(&self, count: usize) -> Self {
        self.wrap(QueryNode::Take {
            input: self.node.clone(),
            count,
        })
    }

    /// Skip `offset` rows, then keep at most `limit`.
    pub fn paginate(&self, page: Pagination) -> Self {
        self.skip(page.offset as usize).take(page.limit as usize)
    }

    /// Group rows by a field. Groups come out in first-occurrence order.
    pub fn group_by(&self, field: impl Into<String>) -> Self {
        self.wrap(QueryNode::GroupBy {
            input: self.node.clone(),
            key: field.into(),
        })
    }

    /// Inner join with another query. Aliases default to the root kinds.
    pub fn join(
        &self,
        right: &Query<'ctx>,
        left_key: impl Into<String>,
        right_key: impl Into<String>,
    ) -> Self {
        self.join_as(
            right,
            left_key,
            right_key,
            self.root_kind().to_string(),
            right.root_kind().to_string(),
        )
    }

    /// Inner join with explicit aliases, e.g. for self joins.
    pub fn join_as(
        &self,
        right: &Query<'ctx>,
        left_key: impl Into<String>,
        right_key: impl Into<String>,
        left_alias: impl Into<Arc<str>>,
        right_alias: impl Into<Arc<str>>,
    ) -> Self {
        self.joined(
            right,
            JoinSpec {
                kind: JoinKind::Inner,
                left_key: left_key.into(),
                right_key: right_key.into(),
                left_alias: left_alias.into(),
                right_alias: right_alias.into(),
            },
        )
    }

    /// Group join: one group per left row holding its matches (possibly none).
    pub fn group_join(
        &self,
        right: &Query<'ctx>,
        left_key: impl Into<String>,
        right_key: impl Into<String>,
    ) -> Self {
        self.joined(
            right,
            JoinSpec {
                kind: JoinKind::Group,
                left_key: left_key.into(),
                right_key: right_key.into(),
                left_alias: self.root_kind().into(),
                right_alias: right.root_kind().into(),
            },
        )
    }

    /// Cartesian product with another query.
    pub fn cross_join(&self, right: &Query<'ctx>) -> Self {
        self.joined(
            right,
            JoinSpec {
                kind: JoinKind::Cross,
                left_key: String::new(),
                right_key: String::new(),
                left_alias: self.root_kind().into(),
                right_alias: right.root_kind().into(),
            },
        )
    }

    fn joined(&self, right: &Query<'ctx>, spec: JoinSpec) -> Self {
        self.wrap(QueryNode::Join {
            input: self.node.clone(),
            right: right.node.clone(),
            spec,
        })
    }

    /// Eager-load a navigation path (`"author"`, `"author.courses"`) on the
    /// result entities before they are returned.
    pub fn include(&self, path: impl Into<String>) -> Self {
        self.wrap(QueryNode::Include {
            input: self.node.clone(),
            path: path.into(),
        })
    }

    // ========== Terminals ==========

    fn rows(&self) -> Result<RowIter<'ctx>> {
        self.ctx.executor().execute(&self.node)
    }

    /// Execute and return a lazy result set.
    pub fn iter(&self) -> Result<ResultSet<'ctx>> {
        Ok(ResultSet { rows: self.rows()? })
    }

    /// Alias of [`iter`](Query::iter).
    pub fn execute(&self) -> Result<ResultSet<'ctx>> {
        self.iter()
    }

    /// Execute and collect every row.
    pub fn to_list(&self) -> Result<Vec<Row>> {
        let rows: Vec<Row> = self.rows()?.collect::<Result<_>>()?;
        tracing::debug!(root = self.root_kind(), rows = rows.len(), "query materialized");
        Ok(rows)
    }

    /// Execute and collect entity rows. Fails on any other row shape.
    pub fn to_entities(&self) -> Result<Vec<Entity>> {
        super::executor::expect_entities(self.to_list()?)
    }

    /// Number of result rows.
    pub fn count(&self) -> Result<usize> {
        AggregateExecutor::count(self.rows()?)
    }

    /// The only row. `NotFound` when empty, `MultipleResults` when there are more.
    pub fn single(&self) -> Result<Row> {
        self.single_or_default()?.ok_or_else(|| Error::NotFound {
            entity: self.root_kind().to_string(),
            id: None,
        })
    }

    /// The only row, `None` when empty. `MultipleResults` when there are more.
    pub fn single_or_default(&self) -> Result<Option<Row>> {
        let mut rows = self.rows()?;
        let Some(first) = rows.next().transpose()? else {
            return Ok(None);
        };
        if rows.next().transpose()?.is_some() {
            return Err(Error::MultipleResults { count: 2 });
        }
        Ok(Some(first))
    }

    /// The first row. `NotFound` when empty.
    pub fn first(&self) -> Result<Row> {
        self.first_or_default()?.ok_or_else(|| Error::NotFound {
            entity: self.root_kind().to_string(),
            id: None,
        })
    }

    /// The first row, `None` when empty.
    pub fn first_or_default(&self) -> Result<Option<Row>> {
        self.rows()?.next().transpose()
    }

    /// Largest non-null value of a field.
    pub fn max(&self, field: &str) -> Result<Option<Value>> {
        AggregateExecutor::max(self.rows()?, field)
    }

    /// Smallest non-null value of a field.
    pub fn min(&self, field: &str) -> Result<Option<Value>> {
        AggregateExecutor::min(self.rows()?, field)
    }

    /// Sum of a numeric field.
    pub fn sum(&self, field: &str) -> Result<Value> {
        AggregateExecutor::sum(self.rows()?, field)
    }

    /// Mean of a numeric field, `None` when no row has a value.
    pub fn average(&self, field: &str) -> Result<Option<f64>> {
        AggregateExecutor::average(self.rows()?, field)
    }

    /// Whether every row matches. True for an empty result.
    pub fn all(&self, predicate: impl Into<Predicate>) -> Result<bool> {
        let predicate = predicate.into();
        for row in self.rows()? {
            if !predicate.matches(&row?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether there is at least one row.
    pub fn any(&self) -> Result<bool> {
        Ok(self.first_or_default()?.is_some())
    }

    /// Whether at least one row matches.
    pub fn any_where(&self, predicate: impl Into<Predicate>) -> Result<bool> {
        let predicate = predicate.into();
        for row in self.rows()? {
            if predicate.matches(&row?) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Keys of the nearest ordering reachable through order-preserving stages.
fn preceding_order(node: &QueryNode) -> Option<Vec<OrderSpec>> {
    match node {
        QueryNode::OrderBy { keys, .. } => Some(keys.clone()),
        QueryNode::Filter { input, .. }
        | QueryNode::Skip { input, .. }
        | QueryNode::Take { input, .. }
        | QueryNode::Distinct { input }
        | QueryNode::Include { input, .. } => preceding_order(input),
        _ => None,
    }
}

/// Lazy, single-pass result of an executed query.
pub struct ResultSet<'a> {
    rows: RowIter<'a>,
}

impl ResultSet<'_> {
    /// Collect the remaining rows.
    pub fn to_list(self) -> Result<Vec<Row>> {
        self.rows.collect()
    }
}

impl Iterator for ResultSet<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet").finish_non_exhaustive()
    }
}
