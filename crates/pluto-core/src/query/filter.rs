//! Filter evaluation.
//!
//! [`FilterEvaluator`] evaluates declarative [`FilterExpr`]s against anything
//! that exposes named fields: a raw field list inside a driver scan, an
//! [`Entity`](crate::store::Entity), or a composite [`Row`](super::Row) during
//! query execution.

use std::cmp::Ordering;

use pluto_proto::{FilterExpr, Value};

/// Named field access used by filters, ordering and projections.
pub trait FieldSource {
    /// Look up a field by name. `None` when the field is absent.
    fn field(&self, name: &str) -> Option<&Value>;
}

impl FieldSource for [(String, Value)] {
    fn field(&self, name: &str) -> Option<&Value> {
        self.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Evaluates filter expressions against field sources.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Evaluate a filter expression against a row.
    ///
    /// Missing fields never satisfy a comparison.
    pub fn evaluate<R: FieldSource + ?Sized>(filter: &FilterExpr, row: &R) -> bool {
        match filter {
            FilterExpr::Eq { field, value } => {
                Self::compare_field(row, field, value, Self::values_equal)
            }
            FilterExpr::Ne { field, value } => {
                Self::compare_field(row, field, value, |a, b| !Self::values_equal(a, b))
            }
            FilterExpr::Lt { field, value } => Self::compare_field(row, field, value, |a, b| {
                Self::compare_values(a, b).is_some_and(Ordering::is_lt)
            }),
            FilterExpr::Le { field, value } => Self::compare_field(row, field, value, |a, b| {
                Self::compare_values(a, b).is_some_and(Ordering::is_le)
            }),
            FilterExpr::Gt { field, value } => Self::compare_field(row, field, value, |a, b| {
                Self::compare_values(a, b).is_some_and(Ordering::is_gt)
            }),
            FilterExpr::Ge { field, value } => Self::compare_field(row, field, value, |a, b| {
                Self::compare_values(a, b).is_some_and(Ordering::is_ge)
            }),
            FilterExpr::In { field, values } => match row.field(field) {
                Some(fv) => values.iter().any(|v| Self::values_equal(fv, v)),
                None => false,
            },
            FilterExpr::NotIn { field, values } => match row.field(field) {
                Some(fv) => !values.iter().any(|v| Self::values_equal(fv, v)),
                None => true,
            },
            FilterExpr::IsNull { field } => matches!(row.field(field), None | Some(Value::Null)),
            FilterExpr::IsNotNull { field } => {
                !matches!(row.field(field), None | Some(Value::Null))
            }
            FilterExpr::Like { field, pattern } => match row.field(field) {
                Some(Value::String(s)) => Self::like_match(s, pattern),
                _ => false,
            },
            FilterExpr::NotLike { field, pattern } => match row.field(field) {
                Some(Value::String(s)) => !Self::like_match(s, pattern),
                _ => true,
            },
            FilterExpr::And(filters) => filters.iter().all(|f| Self::evaluate(f, row)),
            FilterExpr::Or(filters) => filters.iter().any(|f| Self::evaluate(f, row)),
            FilterExpr::Not(inner) => !Self::evaluate(inner, row),
        }
    }

    fn compare_field<R, F>(row: &R, field: &str, value: &Value, comparator: F) -> bool
    where
        R: FieldSource + ?Sized,
        F: FnOnce(&Value, &Value) -> bool,
    {
        match row.field(field) {
            Some(fv) => comparator(fv, value),
            None => false,
        }
    }

    /// Check if two values are equal, widening numeric variants of the same
    /// family.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Int32(a), Value::Int64(b)) => (*a as i64) == *b,
            (Value::Int64(a), Value::Int32(b)) => *a == (*b as i64),
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Float32(a), Value::Float64(b)) => (*a as f64) == *b,
            (Value::Float64(a), Value::Float32(b)) => *a == (*b as f64),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }

    /// Compare two values, returning their ordering if comparable.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int64(b)) => Some((*a as i64).cmp(b)),
            (Value::Int64(a), Value::Int32(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::Float32(a), Value::Float64(b)) => (*a as f64).partial_cmp(b),
            (Value::Float64(a), Value::Float32(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting.
    ///
    /// Nulls (and absent fields) come first. Values of different families
    /// order by family: bool, number, string, bytes, timestamp. Numbers
    /// compare across widths and NaN sorts after every other number.
    pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let a = a.filter(|v| !v.is_null());
        let b = b.filter(|v| !v.is_null());
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => match (sort_number(a), sort_number(b)) {
                (Some(a), Some(b)) => a.total_order(b),
                _ => sort_family(a).cmp(&sort_family(b)).then_with(|| {
                    Self::compare_values(a, b).unwrap_or(Ordering::Equal)
                }),
            },
        }
    }

    /// Match a string against a SQL LIKE pattern.
    ///
    /// Supports:
    /// - `%` matches zero or more characters
    /// - `_` matches exactly one character
    /// - `\%`, `\_` and `\\` match the literal character
    pub fn like_match(value: &str, pattern: &str) -> bool {
        let mut chars = value.chars().peekable();
        let mut pattern_chars = pattern.chars().peekable();

        Self::like_match_recursive(&mut chars, &mut pattern_chars)
    }

    fn like_match_recursive(
        chars: &mut std::iter::Peekable<std::str::Chars>,
        pattern: &mut std::iter::Peekable<std::str::Chars>,
    ) -> bool {
        loop {
            match (pattern.peek().copied(), chars.peek().copied()) {
                (None, None) => return true,
                (None, Some(_)) => return false,
                (Some('%'), _) => {
                    pattern.next();

                    if pattern.peek().is_none() {
                        return true;
                    }

                    // Try matching % with 0, 1, 2, ... characters
                    loop {
                        let mut pattern_clone = pattern.clone();
                        let mut chars_clone = chars.clone();

                        if Self::like_match_recursive(&mut chars_clone, &mut pattern_clone) {
                            return true;
                        }

                        if chars.next().is_none() {
                            return false;
                        }
                    }
                }
                (Some('_'), Some(_)) => {
                    pattern.next();
                    chars.next();
                }
                (Some('_'), None) => return false,
                (Some('\\'), _) => {
                    pattern.next();
                    match (pattern.peek().copied(), chars.peek().copied()) {
                        (Some(p), Some(c)) if p == c => {
                            pattern.next();
                            chars.next();
                        }
                        _ => return false,
                    }
                }
                (Some(p), Some(c)) => {
                    if p == c {
                        pattern.next();
                        chars.next();
                    } else {
                        return false;
                    }
                }
                (Some(_), None) => return false,
            }
        }
    }
}

/// Sort rank of a non-null value's family.
fn sort_family(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_) => 2,
        Value::String(_) => 3,
        Value::Bytes(_) => 4,
        Value::Timestamp(_) => 5,
    }
}

#[derive(Clone, Copy)]
enum SortNumber {
    Int(i64),
    Float(f64),
}

fn sort_number(value: &Value) -> Option<SortNumber> {
    match value {
        Value::Int32(i) => Some(SortNumber::Int(*i as i64)),
        Value::Int64(i) => Some(SortNumber::Int(*i)),
        Value::Float32(f) => Some(SortNumber::Float(*f as f64)),
        Value::Float64(f) => Some(SortNumber::Float(*f)),
        _ => None,
    }
}

impl SortNumber {
    fn total_order(self, other: SortNumber) -> Ordering {
        match (self, other) {
            (SortNumber::Int(a), SortNumber::Int(b)) => a.cmp(&b),
            (SortNumber::Float(a), SortNumber::Float(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            },
            (SortNumber::Int(a), SortNumber::Float(b)) => int_float_order(a, b),
            (SortNumber::Float(a), SortNumber::Int(b)) => int_float_order(b, a).reverse(),
        }
    }
}

/// Exact comparison of an integer with a float; NaN is above everything.
fn int_float_order(int: i64, float: f64) -> Ordering {
    // 2^63, the first float past i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() || float >= LIMIT {
        return Ordering::Less;
    }
    if float < -LIMIT {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    int.cmp(&(whole as i64)).then_with(|| {
        if float > whole {
            Ordering::Less
        } else if float < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}
