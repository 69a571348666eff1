//! Schema - the complete entity and relationship configuration.

use indexmap::IndexMap;

use super::{EntityDef, RelationDef};
use crate::error::{Error, Result};

/// Every entity kind and relationship known to a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Entity definitions keyed by name, in declaration order.
    pub entities: IndexMap<String, EntityDef>,
    /// Relationship definitions in declaration order.
    pub relations: Vec<RelationDef>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a relationship to the schema.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get an entity by name, failing with `UnknownEntity`.
    pub fn entity(&self, name: &str) -> Result<&EntityDef> {
        self.get_entity(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Look up a navigation declared on `entity`.
    pub fn relation(&self, entity: &str, name: &str) -> Result<&RelationDef> {
        self.entity(entity)?;
        self.relations
            .iter()
            .find(|r| r.from_entity == entity && r.name == name)
            .ok_or_else(|| Error::unknown_relationship(entity, name))
    }

    /// All navigations declared on an entity.
    pub fn relations_from<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a RelationDef> {
        self.relations.iter().filter(move |r| r.from_entity == entity)
    }

    /// Foreign-key relationships in which `entity` is the principal.
    ///
    /// A key pair declared from both ends (`Author.courses` and
    /// `Course.author`) is reported once, using the first declaration.
    pub fn dependents_of(&self, entity: &str) -> Vec<&RelationDef> {
        let mut seen: Vec<(&str, &str)> = Vec::new();
        let mut out = Vec::new();
        for relation in &self.relations {
            if let Some(dep) = relation.dependency() {
                if dep.principal == entity && !seen.contains(&(dep.dependent, dep.foreign_key)) {
                    seen.push((dep.dependent, dep.foreign_key));
                    out.push(relation);
                }
            }
        }
        out
    }

    /// Foreign-key relationships in which `entity` is the dependent, deduplicated
    /// the same way as [`dependents_of`](Self::dependents_of).
    pub fn principals_of(&self, entity: &str) -> Vec<&RelationDef> {
        let mut seen: Vec<(&str, &str)> = Vec::new();
        let mut out = Vec::new();
        for relation in &self.relations {
            if let Some(dep) = relation.dependency() {
                if dep.dependent == entity && !seen.contains(&(dep.principal, dep.foreign_key)) {
                    seen.push((dep.principal, dep.foreign_key));
                    out.push(relation);
                }
            }
        }
        out
    }

    /// Many-to-many relationships with `entity` on either end.
    pub fn edges_touching<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a RelationDef> {
        self.relations
            .iter()
            .filter(move |r| r.is_many_to_many() && (r.from_entity == entity || r.to_entity == entity))
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Check internal consistency: identity fields are declared, relations
    /// point at declared entities and fields, navigation names are unique per
    /// entity.
    pub fn validate(&self) -> Result<()> {
        for entity in self.entities.values() {
            if !entity.has_field(&entity.identity_field) {
                return Err(Error::InvalidSchema(format!(
                    "{} does not declare its identity field '{}'",
                    entity.name, entity.identity_field
                )));
            }
        }

        for (idx, relation) in self.relations.iter().enumerate() {
            let from = self.declared(&relation.from_entity, &relation.name)?;
            let to = self.declared(&relation.to_entity, &relation.name)?;
            Self::field_declared(from, &relation.from_field, &relation.name)?;
            Self::field_declared(to, &relation.to_field, &relation.name)?;

            if let Some(edge) = &relation.edge {
                let edge_def = self.declared(&edge.entity, &relation.name)?;
                Self::field_declared(edge_def, &edge.left_key, &relation.name)?;
                Self::field_declared(edge_def, &edge.right_key, &relation.name)?;
            } else if relation.is_many_to_many() {
                return Err(Error::InvalidSchema(format!(
                    "many-to-many relation '{}' has no edge entity",
                    relation.name
                )));
            }

            let duplicate = self.relations[..idx]
                .iter()
                .any(|r| r.from_entity == relation.from_entity && r.name == relation.name);
            if duplicate {
                return Err(Error::InvalidSchema(format!(
                    "{} declares navigation '{}' twice",
                    relation.from_entity, relation.name
                )));
            }
        }

        Ok(())
    }

    fn declared(&self, entity: &str, relation: &str) -> Result<&EntityDef> {
        self.get_entity(entity).ok_or_else(|| {
            Error::InvalidSchema(format!(
                "relation '{relation}' references undeclared entity '{entity}'"
            ))
        })
    }

    fn field_declared(entity: &EntityDef, field: &str, relation: &str) -> Result<()> {
        if entity.has_field(field) {
            Ok(())
        } else {
            Err(Error::InvalidSchema(format!(
                "relation '{relation}' references undeclared field {}.{field}",
                entity.name
            )))
        }
    }
}
