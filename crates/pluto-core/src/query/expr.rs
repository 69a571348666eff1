//! Query expression nodes.
//!
//! A query is a chain of immutable nodes, each wrapping the one it was built
//! from. Nodes are shared through `Arc`, so extending a query never copies or
//! mutates the chain it extends.

use std::fmt;
use std::sync::Arc;

use pluto_proto::{FilterExpr, OrderSpec, Value};

use super::row::Row;

/// Closure predicate over a row.
pub type RowPredicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Closure computing a value from a row.
pub type RowValue = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// A filter condition.
#[derive(Clone)]
pub enum Predicate {
    /// Declarative; can be pushed down to the driver scan.
    Expr(FilterExpr),
    /// Arbitrary code; always evaluated in-process after the scan.
    Func(RowPredicate),
}

impl Predicate {
    /// Wrap a closure.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        Predicate::Func(Arc::new(f))
    }

    /// Test a row.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::Expr(expr) => super::FilterEvaluator::evaluate(expr, row),
            Predicate::Func(f) => f(row),
        }
    }
}

impl From<FilterExpr> for Predicate {
    fn from(expr: FilterExpr) -> Self {
        Predicate::Expr(expr)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Expr(expr) => f.debug_tuple("Expr").field(expr).finish(),
            Predicate::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// One output column of a projection.
#[derive(Clone)]
pub enum ProjectionItem {
    /// A field of the input row.
    Field { field: String, alias: String },
    /// A field of the entity reached through a reference navigation.
    Related {
        relation: String,
        field: String,
        alias: String,
    },
    /// The key of a group row.
    GroupKey { alias: String },
    /// The member count of a group row.
    GroupCount { alias: String },
    /// A value computed in-process.
    Computed { alias: String, func: RowValue },
}

impl ProjectionItem {
    /// Output column name.
    pub fn alias(&self) -> &str {
        match self {
            ProjectionItem::Field { alias, .. }
            | ProjectionItem::Related { alias, .. }
            | ProjectionItem::GroupKey { alias }
            | ProjectionItem::GroupCount { alias }
            | ProjectionItem::Computed { alias, .. } => alias,
        }
    }
}

impl fmt::Debug for ProjectionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionItem::Field { field, alias } => write!(f, "{field} as {alias}"),
            ProjectionItem::Related {
                relation,
                field,
                alias,
            } => write!(f, "{relation}.{field} as {alias}"),
            ProjectionItem::GroupKey { alias } => write!(f, "key as {alias}"),
            ProjectionItem::GroupCount { alias } => write!(f, "count as {alias}"),
            ProjectionItem::Computed { alias, .. } => write!(f, "<computed> as {alias}"),
        }
    }
}

/// Shape of the rows produced by `select`.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub items: Vec<ProjectionItem>,
}

impl Projection {
    /// Create an empty projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a field under its own name.
    pub fn field(self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.field_as(field.clone(), field)
    }

    /// Keep a field under another name.
    pub fn field_as(mut self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.items.push(ProjectionItem::Field {
            field: field.into(),
            alias: alias.into(),
        });
        self
    }

    /// Read a field through a reference navigation, e.g. `author.name`.
    pub fn related(
        mut self,
        relation: impl Into<String>,
        field: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        self.items.push(ProjectionItem::Related {
            relation: relation.into(),
            field: field.into(),
            alias: alias.into(),
        });
        self
    }

    /// Emit the group key.
    pub fn key(mut self, alias: impl Into<String>) -> Self {
        self.items.push(ProjectionItem::GroupKey {
            alias: alias.into(),
        });
        self
    }

    /// Emit the group member count.
    pub fn count(mut self, alias: impl Into<String>) -> Self {
        self.items.push(ProjectionItem::GroupCount {
            alias: alias.into(),
        });
        self
    }

    /// Emit a computed value.
    pub fn computed<F>(mut self, alias: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.items.push(ProjectionItem::Computed {
            alias: alias.into(),
            func: Arc::new(f),
        });
        self
    }

    /// Navigations read by `Related` items, deduplicated.
    pub(crate) fn relations(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for item in &self.items {
            if let ProjectionItem::Related { relation, .. } = item {
                if !out.contains(&relation.as_str()) {
                    out.push(relation);
                }
            }
        }
        out
    }
}

/// Join variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Matching pairs only.
    Inner,
    /// One group per left row with its matches, empty when unmatched.
    Group,
    /// Every left row with every right row.
    Cross,
}

/// Join specification. Keys are ignored by cross joins.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub left_key: String,
    pub right_key: String,
    pub left_alias: Arc<str>,
    pub right_alias: Arc<str>,
}

/// One query operation.
#[derive(Debug, Clone)]
pub enum QueryNode {
    /// All entities of a kind.
    Source { kind: String },
    /// Keep rows matching a predicate.
    Filter {
        input: Arc<QueryNode>,
        predicate: Predicate,
    },
    /// Stable multi-key sort. Keys are in priority order.
    OrderBy {
        input: Arc<QueryNode>,
        keys: Vec<OrderSpec>,
    },
    /// Reshape rows.
    Select {
        input: Arc<QueryNode>,
        projection: Projection,
    },
    /// Replace each entity by the entities of a navigation.
    SelectMany {
        input: Arc<QueryNode>,
        relation: String,
    },
    /// Drop repeated rows, keeping the first.
    Distinct { input: Arc<QueryNode> },
    /// Skip the first rows.
    Skip { input: Arc<QueryNode>, count: usize },
    /// Keep at most this many rows.
    Take { input: Arc<QueryNode>, count: usize },
    /// Group rows by a field, in first-occurrence order.
    GroupBy { input: Arc<QueryNode>, key: String },
    /// Combine with a second query.
    Join {
        input: Arc<QueryNode>,
        right: Arc<QueryNode>,
        spec: JoinSpec,
    },
    /// Eager-load a navigation path on the result entities.
    Include { input: Arc<QueryNode>, path: String },
}

impl QueryNode {
    /// The node this one wraps, `None` for a source.
    pub fn input(&self) -> Option<&Arc<QueryNode>> {
        match self {
            QueryNode::Source { .. } => None,
            QueryNode::Filter { input, .. }
            | QueryNode::OrderBy { input, .. }
            | QueryNode::Select { input, .. }
            | QueryNode::SelectMany { input, .. }
            | QueryNode::Distinct { input }
            | QueryNode::Skip { input, .. }
            | QueryNode::Take { input, .. }
            | QueryNode::GroupBy { input, .. }
            | QueryNode::Join { input, .. }
            | QueryNode::Include { input, .. } => Some(input),
        }
    }

    /// Entity kind at the root of the chain.
    pub fn root_kind(&self) -> &str {
        let mut node = self;
        while let Some(input) = node.input() {
            node = input;
        }
        match node {
            QueryNode::Source { kind } => kind,
            _ => "",
        }
    }

    /// Include paths declared anywhere in the chain, in composition order.
    pub fn include_paths(&self) -> Vec<String> {
        let mut found = Vec::new();
        let mut node = self;
        while let Some(input) = node.input() {
            if let QueryNode::Include { path, .. } = node {
                found.push(path);
            }
            node = input;
        }

        let mut paths: Vec<String> = Vec::new();
        for path in found.into_iter().rev() {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }

    /// Number of operations in the chain, source included.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node = self;
        while let Some(input) = node.input() {
            depth += 1;
            node = input;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(kind: &str) -> Arc<QueryNode> {
        Arc::new(QueryNode::Source { kind: kind.into() })
    }

    #[test]
    fn test_root_kind_and_depth() {
        let node = QueryNode::Take {
            input: Arc::new(QueryNode::Filter {
                input: source("Course"),
                predicate: FilterExpr::eq("level", 1).into(),
            }),
            count: 3,
        };
        assert_eq!(node.root_kind(), "Course");
        assert_eq!(node.depth(), 3);
    }

    #[test]
    fn test_include_paths_in_order() {
        let first = Arc::new(QueryNode::Include {
            input: source("Course"),
            path: "author".into(),
        });
        let second = Arc::new(QueryNode::Include {
            input: first,
            path: "tags".into(),
        });
        let again = QueryNode::Include {
            input: second,
            path: "author".into(),
        };
        assert_eq!(again.include_paths(), vec!["author", "tags"]);
    }

    #[test]
    fn test_projection_relations_deduplicated() {
        let projection = Projection::new()
            .field("name")
            .related("author", "name", "AuthorName")
            .related("author", "id", "AuthorId")
            .count("Count");
        assert_eq!(projection.relations(), vec!["author"]);
        assert_eq!(projection.items[1].alias(), "AuthorName");
    }

    #[test]
    fn test_predicate_matches_row() {
        let row = Row::Entity(crate::store::Entity::new("Course", 1).with_field("level", 2));
        assert!(Predicate::from(FilterExpr::eq("level", 2)).matches(&row));
        assert!(!Predicate::func(|r| r.get("level").is_none()).matches(&row));
    }
}
