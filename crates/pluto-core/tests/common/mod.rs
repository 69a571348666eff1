//! Shared fixture: a small course catalog.
//!
//! Authors `{1: Ann, 2: Bo}`, courses `{10, 11}` by Ann and `{12}` by Bo,
//! two tags linked through `CourseTag`, and one cover on course 10.

#![allow(dead_code)]

use pluto_core::{
    Context, ContextConfig, EdgeDef, Entity, EntityDef, FieldDef, RelationDef, ScalarType, Schema,
    StoreDriver,
};

pub fn schema() -> Schema {
    Schema::new()
        .with_entity(
            EntityDef::new("Author", "id")
                .with_field(FieldDef::new("id", ScalarType::Int64))
                .with_field(FieldDef::new("name", ScalarType::String).max_length(50)),
        )
        .with_entity(
            EntityDef::new("Course", "id")
                .with_field(FieldDef::new("id", ScalarType::Int64))
                .with_field(FieldDef::new("name", ScalarType::String).max_length(255))
                .with_field(FieldDef::optional("description", ScalarType::String))
                .with_field(FieldDef::new("level", ScalarType::Int32))
                .with_field(FieldDef::new("full_price", ScalarType::Float32))
                .with_field(FieldDef::new("author_id", ScalarType::Int64)),
        )
        .with_entity(
            EntityDef::new("Tag", "id")
                .with_field(FieldDef::new("id", ScalarType::Int64))
                .with_field(FieldDef::new("name", ScalarType::String)),
        )
        .with_entity(
            EntityDef::new("CourseTag", "id")
                .table("CourseTags")
                .with_field(FieldDef::new("id", ScalarType::Int64))
                .with_field(FieldDef::new("course_id", ScalarType::Int64))
                .with_field(FieldDef::new("tag_id", ScalarType::Int64)),
        )
        .with_entity(
            EntityDef::new("Cover", "id")
                .with_field(FieldDef::new("id", ScalarType::Int64))
                .with_field(FieldDef::optional("course_id", ScalarType::Int64)),
        )
        .with_relation(RelationDef::many_to_one(
            "author", "Course", "author_id", "Author", "id",
        ))
        .with_relation(RelationDef::one_to_many(
            "courses", "Author", "id", "Course", "author_id",
        ))
        .with_relation(RelationDef::many_to_many(
            "tags",
            "Course",
            "id",
            "Tag",
            "id",
            EdgeDef::new("CourseTag", "course_id", "tag_id"),
        ))
        .with_relation(RelationDef::many_to_many(
            "courses",
            "Tag",
            "id",
            "Course",
            "id",
            EdgeDef::new("CourseTag", "tag_id", "course_id"),
        ))
        .with_relation(
            RelationDef::one_to_one("cover", "Course", "id", "Cover", "course_id").optional(),
        )
}

pub fn author(id: i64, name: &str) -> Entity {
    Entity::new("Author", id).with_field("name", name)
}

pub fn course(id: i64, name: &str, level: i32, price: f32, author_id: i64) -> Entity {
    Entity::new("Course", id)
        .with_field("name", name)
        .with_field("level", level)
        .with_field("full_price", price)
        .with_field("author_id", author_id)
}

pub fn seed_entities() -> Vec<Entity> {
    vec![
        author(1, "Ann"),
        author(2, "Bo"),
        course(10, "C# Basics", 1, 49.0, 1),
        course(11, "C# Advanced", 2, 69.0, 1),
        course(12, "Javascript", 1, 149.0, 2),
        Entity::new("Tag", 1).with_field("name", "c#"),
        Entity::new("Tag", 2).with_field("name", "beginner"),
        Entity::new("CourseTag", 100)
            .with_field("course_id", 10i64)
            .with_field("tag_id", 1i64),
        Entity::new("CourseTag", 101)
            .with_field("course_id", 10i64)
            .with_field("tag_id", 2i64),
        Entity::new("CourseTag", 102)
            .with_field("course_id", 11i64)
            .with_field("tag_id", 1i64),
        Entity::new("CourseTag", 103)
            .with_field("course_id", 12i64)
            .with_field("tag_id", 2i64),
        Entity::new("Cover", 200).with_field("course_id", 10i64),
    ]
}

fn seed(ctx: &mut Context) {
    for entity in seed_entities() {
        ctx.add(entity);
    }
    ctx.save_changes().unwrap();
    ctx.store().stats().reset();
}

/// Seeded in-memory context.
pub fn context(config: ContextConfig) -> Context {
    let mut ctx = Context::new(schema(), config).unwrap();
    seed(&mut ctx);
    ctx
}

/// Seeded context over a specific driver.
pub fn context_with(driver: impl StoreDriver + 'static, config: ContextConfig) -> Context {
    let mut ctx = Context::with_driver(schema(), driver, config).unwrap();
    seed(&mut ctx);
    ctx
}

pub fn ids(entities: &[Entity]) -> Vec<i64> {
    entities.iter().map(|e| e.id).collect()
}
