//! Rows flowing through a query pipeline.

use std::sync::Arc;

use pluto_proto::Value;

use super::filter::FieldSource;
use crate::store::{Entity, ValueKey};

/// One element of a result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// A stored entity.
    Entity(Entity),
    /// A projected shape.
    Record(Record),
    /// One match of a join.
    Pair(Pair),
    /// A group produced by `group_by` or `group_join`.
    Group(Group),
}

/// A projected row: named values in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: Vec<(String, Value)>,
}

/// Two joined rows under their aliases.
///
/// Fields are addressed as `alias.field`; an unprefixed name is looked up on
/// the left row first, then the right.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub left_alias: Arc<str>,
    pub left: Box<Row>,
    pub right_alias: Arc<str>,
    pub right: Box<Row>,
}

/// Rows sharing a key.
///
/// For `group_join` the `owner` is the left row and `items` are its matches
/// (possibly none). Field lookups other than `key` fall through to the owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: Value,
    pub owner: Option<Box<Row>>,
    pub items: Vec<Row>,
}

impl Group {
    /// Number of member rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Get a value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.as_slice().field(name)
    }
}

impl Row {
    /// Short name of the row shape, used in errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Row::Entity(_) => "entity",
            Row::Record(_) => "record",
            Row::Pair(_) => "pair",
            Row::Group(_) => "group",
        }
    }

    /// Borrow the entity, if this row is one.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Row::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Take the entity, if this row is one.
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Row::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the record, if this row is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Row::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Borrow the pair, if this row is one.
    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Row::Pair(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow the group, if this row is one.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Row::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Field lookup, see [`FieldSource`].
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name)
    }

    /// Identity used by `distinct`.
    pub(crate) fn distinct_key(&self) -> Vec<ValueKey> {
        match self {
            Row::Entity(e) => vec![ValueKey::Str(e.kind.clone()), ValueKey::Int(e.id)],
            Row::Record(r) => r.fields.iter().map(|(_, v)| ValueKey::from(v)).collect(),
            Row::Pair(p) => {
                let mut key = p.left.distinct_key();
                key.extend(p.right.distinct_key());
                key
            }
            Row::Group(g) => {
                let mut key = vec![ValueKey::from(&g.key)];
                if let Some(owner) = &g.owner {
                    key.extend(owner.distinct_key());
                }
                key
            }
        }
    }
}

impl FieldSource for Row {
    fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Entity(e) => e.get(name),
            Row::Record(r) => r.get(name),
            Row::Pair(p) => {
                if let Some((alias, rest)) = name.split_once('.') {
                    if alias == &*p.left_alias {
                        return p.left.field(rest);
                    }
                    if alias == &*p.right_alias {
                        return p.right.field(rest);
                    }
                }
                p.left.field(name).or_else(|| p.right.field(name))
            }
            Row::Group(g) => {
                if name == "key" {
                    return Some(&g.key);
                }
                g.owner.as_ref().and_then(|o| o.field(name))
            }
        }
    }
}

impl From<Entity> for Row {
    fn from(entity: Entity) -> Self {
        Row::Entity(entity)
    }
}

impl From<Record> for Row {
    fn from(record: Record) -> Self {
        Row::Record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Row {
        Row::Pair(Pair {
            left_alias: "a".into(),
            left: Box::new(Row::Entity(
                Entity::new("Author", 1).with_field("id", 1i64).with_field("name", "Ann"),
            )),
            right_alias: "c".into(),
            right: Box::new(Row::Entity(
                Entity::new("Course", 10)
                    .with_field("id", 10i64)
                    .with_field("name", "C#")
                    .with_field("author_id", 1i64),
            )),
        })
    }

    #[test]
    fn test_pair_lookup() {
        let row = pair();
        assert_eq!(row.get("a.name"), Some(&Value::from("Ann")));
        assert_eq!(row.get("c.name"), Some(&Value::from("C#")));
        assert_eq!(row.get("name"), Some(&Value::from("Ann")));
        assert_eq!(row.get("author_id"), Some(&Value::Int64(1)));
        assert_eq!(row.get("x.name"), None);
    }

    #[test]
    fn test_group_lookup() {
        let owner = Row::Entity(Entity::new("Author", 2).with_field("name", "Bo"));
        let row = Row::Group(Group {
            key: Value::Int64(2),
            owner: Some(Box::new(owner)),
            items: Vec::new(),
        });
        assert_eq!(row.get("key"), Some(&Value::Int64(2)));
        assert_eq!(row.get("name"), Some(&Value::from("Bo")));
        assert!(row.as_group().unwrap().is_empty());
    }

    #[test]
    fn test_distinct_key() {
        let a = Row::Record(Record::new().with("level", 1));
        let b = Row::Record(Record::new().with("level", 1i64));
        assert_eq!(a.distinct_key(), b.distinct_key());
        assert_ne!(pair().distinct_key(), a.distinct_key());
    }
}
