//! Scalar aggregates over a row stream.
//!
//! Null and missing field values are ignored, the way SQL aggregates treat
//! NULL. Every aggregate consumes its input once.

use std::cmp::Ordering;

use pluto_proto::Value;

use super::executor::RowIter;
use super::filter::{FieldSource, FilterEvaluator};
use crate::error::Result;

/// Computes aggregates over executed pipelines.
pub struct AggregateExecutor;

impl AggregateExecutor {
    /// Number of rows.
    pub fn count(rows: RowIter<'_>) -> Result<usize> {
        let mut count = 0;
        for row in rows {
            row?;
            count += 1;
        }
        Ok(count)
    }

    /// Largest non-null value of a field, `None` when there is none.
    pub fn max(rows: RowIter<'_>, field: &str) -> Result<Option<Value>> {
        Self::extreme(rows, field, Ordering::Greater)
    }

    /// Smallest non-null value of a field, `None` when there is none.
    pub fn min(rows: RowIter<'_>, field: &str) -> Result<Option<Value>> {
        Self::extreme(rows, field, Ordering::Less)
    }

    fn extreme(rows: RowIter<'_>, field: &str, wanted: Ordering) -> Result<Option<Value>> {
        let mut best: Option<Value> = None;
        for row in rows {
            let row = row?;
            let Some(value) = row.field(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some(current) => FilterEvaluator::compare_values(value, current) == Some(wanted),
            };
            if replace {
                best = Some(value.clone());
            }
        }
        Ok(best)
    }

    /// Sum of a numeric field.
    ///
    /// Integer fields sum to `Int64`; as soon as a float is seen the result is
    /// `Float64`. An empty input sums to `Int64(0)`. Non-numeric values are
    /// skipped.
    pub fn sum(rows: RowIter<'_>, field: &str) -> Result<Value> {
        let mut int_sum: i64 = 0;
        let mut float_sum: f64 = 0.0;
        let mut saw_float = false;

        for row in rows {
            let row = row?;
            match row.field(field) {
                Some(Value::Float32(f)) => {
                    saw_float = true;
                    float_sum += *f as f64;
                }
                Some(Value::Float64(f)) => {
                    saw_float = true;
                    float_sum += *f;
                }
                Some(v) => {
                    if let Some(i) = v.as_i64() {
                        int_sum = int_sum.wrapping_add(i);
                        float_sum += i as f64;
                    }
                }
                None => {}
            }
        }

        if saw_float {
            Ok(Value::Float64(float_sum))
        } else {
            Ok(Value::Int64(int_sum))
        }
    }

    /// Mean of a numeric field, `None` when no row has a numeric value.
    pub fn average(rows: RowIter<'_>, field: &str) -> Result<Option<f64>> {
        let mut total = 0.0;
        let mut count = 0usize;
        for row in rows {
            let row = row?;
            if let Some(v) = row.field(field).and_then(Value::as_f64) {
                total += v;
                count += 1;
            }
        }
        Ok((count > 0).then(|| total / count as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::row::{Record, Row};

    fn rows(values: Vec<Value>) -> RowIter<'static> {
        Box::new(
            values
                .into_iter()
                .map(|v| Ok(Row::Record(Record::new().with("price", v)))),
        )
    }

    #[test]
    fn test_max_min_skip_nulls() {
        let values = || {
            vec![
                Value::Float32(10.0),
                Value::Null,
                Value::Float32(30.0),
                Value::Float32(5.5),
            ]
        };
        assert_eq!(
            AggregateExecutor::max(rows(values()), "price").unwrap(),
            Some(Value::Float32(30.0))
        );
        assert_eq!(
            AggregateExecutor::min(rows(values()), "price").unwrap(),
            Some(Value::Float32(5.5))
        );
        assert_eq!(AggregateExecutor::max(rows(vec![]), "price").unwrap(), None);
        assert_eq!(
            AggregateExecutor::min(rows(vec![Value::Null]), "price").unwrap(),
            None
        );
    }

    #[test]
    fn test_sum_widens_to_float() {
        let ints = vec![Value::Int32(1), Value::Int64(2), Value::Null];
        assert_eq!(
            AggregateExecutor::sum(rows(ints), "price").unwrap(),
            Value::Int64(3)
        );

        let mixed = vec![Value::Int32(1), Value::Float64(0.5)];
        assert_eq!(
            AggregateExecutor::sum(rows(mixed), "price").unwrap(),
            Value::Float64(1.5)
        );

        assert_eq!(
            AggregateExecutor::sum(rows(vec![]), "price").unwrap(),
            Value::Int64(0)
        );
    }

    #[test]
    fn test_average() {
        let values = vec![Value::Int32(1), Value::Null, Value::Int32(4)];
        assert_eq!(
            AggregateExecutor::average(rows(values), "price").unwrap(),
            Some(2.5)
        );
        assert_eq!(AggregateExecutor::average(rows(vec![]), "price").unwrap(), None);
    }

    #[test]
    fn test_count_propagates_errors() {
        let failing: RowIter<'static> = Box::new(
            vec![
                Ok(Row::Record(Record::new())),
                Err(crate::error::Error::UnknownEntity("Ghost".into())),
            ]
            .into_iter(),
        );
        assert!(AggregateExecutor::count(failing).is_err());
        assert_eq!(AggregateExecutor::count(rows(vec![Value::Null; 3])).unwrap(), 3);
    }
}
