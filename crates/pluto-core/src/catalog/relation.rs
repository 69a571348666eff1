//! Relationship definitions between entities.

/// Cardinality of a relationship, seen from the navigation owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// One-to-one; the target carries the foreign key.
    OneToOne,
    /// One-to-many; the target carries the foreign key.
    OneToMany,
    /// Many-to-one; the source carries the foreign key.
    ManyToOne,
    /// Many-to-many through an edge entity.
    ManyToMany,
}

/// Behavior when a principal entity is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteBehavior {
    /// Remove dependents too.
    Cascade,
    /// Refuse while dependents exist.
    Restrict,
    /// Null the dependents' foreign key.
    SetNull,
}

/// Join entity backing a many-to-many relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDef {
    /// Edge entity name.
    pub entity: String,
    /// Edge field holding the source key.
    pub left_key: String,
    /// Edge field holding the target key.
    pub right_key: String,
}

impl EdgeDef {
    /// Create an edge definition.
    pub fn new(
        entity: impl Into<String>,
        left_key: impl Into<String>,
        right_key: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            left_key: left_key.into(),
            right_key: right_key.into(),
        }
    }
}

/// A named navigation from one entity kind to another.
///
/// Related rows are the `to_entity` rows whose `to_field` equals the source
/// row's `from_field` (through the edge entity for many-to-many).
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    /// Navigation name (unique per source entity).
    pub name: String,
    /// Source entity name.
    pub from_entity: String,
    /// Key field on the source entity.
    pub from_field: String,
    /// Target entity name.
    pub to_entity: String,
    /// Key field on the target entity.
    pub to_field: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Whether the dependent's foreign key must reference an existing principal.
    pub required: bool,
    /// Delete behavior.
    pub on_delete: DeleteBehavior,
    /// Edge entity for many-to-many relations.
    pub edge: Option<EdgeDef>,
}

/// The foreign-key view of a non-edge relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency<'a> {
    /// Referenced entity.
    pub principal: &'a str,
    /// Referenced key on the principal.
    pub principal_key: &'a str,
    /// Entity carrying the foreign key.
    pub dependent: &'a str,
    /// Foreign key field on the dependent.
    pub foreign_key: &'a str,
}

impl RelationDef {
    fn build(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            to_field: to_field.into(),
            cardinality,
            required: true,
            on_delete: DeleteBehavior::Restrict,
            edge: None,
        }
    }

    /// Reference navigation to a principal, e.g. `Course.author` via
    /// `Course.author_id -> Author.id`.
    pub fn many_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        foreign_key: impl Into<String>,
        to_entity: impl Into<String>,
        to_key: impl Into<String>,
    ) -> Self {
        Self::build(
            name,
            from_entity,
            foreign_key,
            to_entity,
            to_key,
            Cardinality::ManyToOne,
        )
    }

    /// Collection navigation to dependents, e.g. `Author.courses` via
    /// `Author.id <- Course.author_id`.
    pub fn one_to_many(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        key: impl Into<String>,
        to_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(
            name,
            from_entity,
            key,
            to_entity,
            foreign_key,
            Cardinality::OneToMany,
        )
    }

    /// Reference navigation from a principal to its single dependent.
    pub fn one_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        key: impl Into<String>,
        to_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(
            name,
            from_entity,
            key,
            to_entity,
            foreign_key,
            Cardinality::OneToOne,
        )
    }

    /// Collection navigation through an edge entity.
    pub fn many_to_many(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_key: impl Into<String>,
        to_entity: impl Into<String>,
        to_key: impl Into<String>,
        edge: EdgeDef,
    ) -> Self {
        Self {
            required: false,
            on_delete: DeleteBehavior::Cascade,
            edge: Some(edge),
            ..Self::build(
                name,
                from_entity,
                from_key,
                to_entity,
                to_key,
                Cardinality::ManyToMany,
            )
        }
    }

    /// Allow a null foreign key; removing the principal nulls it.
    pub fn optional(mut self) -> Self {
        self.required = false;
        if self.on_delete == DeleteBehavior::Restrict {
            self.on_delete = DeleteBehavior::SetNull;
        }
        self
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }

    /// Check if this is a many-to-many relation.
    pub fn is_many_to_many(&self) -> bool {
        self.cardinality == Cardinality::ManyToMany
    }

    /// Whether the navigation yields a collection rather than a reference.
    pub fn is_collection(&self) -> bool {
        matches!(
            self.cardinality,
            Cardinality::OneToMany | Cardinality::ManyToMany
        )
    }

    /// Principal/dependent roles, or `None` for many-to-many.
    pub fn dependency(&self) -> Option<Dependency<'_>> {
        match self.cardinality {
            Cardinality::ManyToOne => Some(Dependency {
                principal: &self.to_entity,
                principal_key: &self.to_field,
                dependent: &self.from_entity,
                foreign_key: &self.from_field,
            }),
            Cardinality::OneToMany | Cardinality::OneToOne => Some(Dependency {
                principal: &self.from_entity,
                principal_key: &self.from_field,
                dependent: &self.to_entity,
                foreign_key: &self.to_field,
            }),
            Cardinality::ManyToMany => None,
        }
    }
}
