//! Join execution.
//!
//! All three join variants buffer the right side and stream the left:
//! - Inner / Group: hash join. Build `key -> rows` from the right side once,
//!   then probe it per left row. Null keys never match.
//! - Cross: every left row paired with every buffered right row.
//!
//! Output follows left order, then right order within a left row.

use std::collections::HashMap;
use std::sync::Arc;

use pluto_proto::Value;

use super::executor::RowIter;
use super::expr::{JoinKind, JoinSpec};
use super::filter::FieldSource;
use super::row::{Group, Pair, Row};
use crate::error::Result;
use crate::store::ValueKey;

/// Executes joins over already-built inputs.
pub struct JoinExecutor;

impl JoinExecutor {
    /// Join a streaming left input with a materialized right input.
    pub fn execute<'a>(left: RowIter<'a>, right: Vec<Row>, spec: &JoinSpec) -> RowIter<'a> {
        let spec = spec.clone();
        match spec.kind {
            JoinKind::Inner => {
                let table = Self::build(right, &spec.right_key);
                Box::new(left.flat_map(move |row| -> Vec<Result<Row>> {
                    let row = match row {
                        Ok(row) => row,
                        Err(e) => return vec![Err(e)],
                    };
                    let key = ValueKey::from(row.field(&spec.left_key));
                    match table.get(&key) {
                        Some(matches) if !key.is_null() => matches
                            .iter()
                            .map(|m| Ok(Self::pair(&spec, row.clone(), m.clone())))
                            .collect(),
                        _ => Vec::new(),
                    }
                }))
            }
            JoinKind::Group => {
                let table = Self::build(right, &spec.right_key);
                Box::new(left.map(move |row| {
                    let row = row?;
                    let key_value = row.field(&spec.left_key).cloned().unwrap_or(Value::Null);
                    let key = ValueKey::from(&key_value);
                    let items = if key.is_null() {
                        Vec::new()
                    } else {
                        table.get(&key).cloned().unwrap_or_default()
                    };
                    Ok(Row::Group(Group {
                        key: key_value,
                        owner: Some(Box::new(row)),
                        items,
                    }))
                }))
            }
            JoinKind::Cross => {
                let right = Arc::new(right);
                Box::new(left.flat_map(move |row| -> Vec<Result<Row>> {
                    match row {
                        Ok(row) => right
                            .iter()
                            .map(|r| Ok(Self::pair(&spec, row.clone(), r.clone())))
                            .collect(),
                        Err(e) => vec![Err(e)],
                    }
                }))
            }
        }
    }

    /// Build phase: index right rows by key, keeping their order.
    fn build(rows: Vec<Row>, key_field: &str) -> HashMap<ValueKey, Vec<Row>> {
        let mut table: HashMap<ValueKey, Vec<Row>> = HashMap::new();
        for row in rows {
            let key = ValueKey::from(row.field(key_field));
            if !key.is_null() {
                table.entry(key).or_default().push(row);
            }
        }
        table
    }

    fn pair(spec: &JoinSpec, left: Row, right: Row) -> Row {
        Row::Pair(Pair {
            left_alias: spec.left_alias.clone(),
            left: Box::new(left),
            right_alias: spec.right_alias.clone(),
            right: Box::new(right),
        })
    }
}
