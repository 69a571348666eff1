//! Hashable keys derived from field values.

use pluto_proto::Value;

/// A [`Value`] reduced to something `Eq + Hash`, used as the build-side key
/// of hash joins and as the grouping key of `group_by`.
///
/// Integer variants collapse to `i64` and float variants to the bit pattern of
/// the widened `f64`, matching the equality used by filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
}

impl ValueKey {
    /// Whether this key came from a null value. Null keys never join.
    pub fn is_null(&self) -> bool {
        matches!(self, ValueKey::Null)
    }
}

impl From<&Value> for ValueKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int32(i) => ValueKey::Int(*i as i64),
            Value::Int64(i) => ValueKey::Int(*i),
            Value::Float32(f) => ValueKey::Float(float_bits(*f as f64)),
            Value::Float64(f) => ValueKey::Float(float_bits(*f)),
            Value::String(s) => ValueKey::Str(s.clone()),
            Value::Bytes(b) => ValueKey::Bytes(b.clone()),
            Value::Timestamp(t) => ValueKey::Timestamp(*t),
        }
    }
}

impl From<Option<&Value>> for ValueKey {
    fn from(value: Option<&Value>) -> Self {
        value.map(ValueKey::from).unwrap_or(ValueKey::Null)
    }
}

fn float_bits(f: f64) -> u64 {
    // -0.0 == 0.0, and every NaN payload is one key
    if f == 0.0 {
        0.0f64.to_bits()
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}
