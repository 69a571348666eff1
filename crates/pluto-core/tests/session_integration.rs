//! Integration tests for staging, saving and referential consistency.

mod common;

use common::ids;
use pluto_core::{
    ConstraintError, ContextConfig, Entity, EntryState, Error, FilterExpr, Value,
};

fn course_count(ctx: &pluto_core::Context) -> usize {
    ctx.query("Course").count().unwrap()
}

#[test]
fn test_staged_changes_invisible_until_saved() {
    let mut ctx = common::context(ContextConfig::default());
    ctx.add(common::author(3, "Cy"));
    ctx.add(common::course(13, "New Course", 1, 19.95, 3));

    assert_eq!(ctx.query("Author").count().unwrap(), 2);
    assert!(ctx.store().find("Author", 3).unwrap().is_none());
    let states: Vec<EntryState> = ctx.entries().iter().map(|c| c.state()).collect();
    assert_eq!(states, vec![EntryState::Added, EntryState::Added]);

    assert_eq!(ctx.save_changes().unwrap(), 2);
    assert!(!ctx.has_changes());
    assert_eq!(ctx.query("Author").count().unwrap(), 3);
    let cy = ctx.get("Author", 3).unwrap();
    assert_eq!(ids(&ctx.navigate(&cy, "courses").unwrap()), vec![13]);
}

#[test]
fn test_discard_changes() {
    let mut ctx = common::context(ContextConfig::default());
    ctx.add(common::author(3, "Cy"));
    ctx.remove("Course", 12);
    assert_eq!(ctx.entries().len(), 2);

    ctx.discard_changes();
    assert!(ctx.entries().is_empty());
    assert_eq!(ctx.save_changes().unwrap(), 0);
    assert_eq!(ctx.query("Author").count().unwrap(), 2);
    assert_eq!(course_count(&ctx), 3);
}

#[test]
fn test_update_moves_course_to_other_author() {
    let mut ctx = common::context(ContextConfig::default());
    let mut course = ctx.get("Course", 11).unwrap();
    course.set("name", "C# Advanced 2");
    course.set("author_id", 2i64);
    ctx.update(course);
    assert_eq!(ctx.entries()[0].state(), EntryState::Modified);
    assert_eq!(ctx.save_changes().unwrap(), 1);

    let bo = ctx.get("Author", 2).unwrap();
    assert_eq!(ids(&ctx.navigate(&bo, "courses").unwrap()), vec![11, 12]);
    assert_eq!(
        ctx.get("Course", 11).unwrap().get("name"),
        Some(&Value::from("C# Advanced 2"))
    );

    ctx.update(common::author(9, "Nobody"));
    assert!(matches!(
        ctx.save_changes(),
        Err(Error::NotFound { id: Some(9), .. })
    ));
}

#[test]
fn test_remove_restrict_fails_without_changes() {
    let mut ctx = common::context(ContextConfig::default());
    ctx.remove("Author", 1);

    let err = ctx.save_changes().unwrap_err();
    match err {
        Error::ConstraintViolation(ConstraintError::RestrictViolation {
            entity,
            id,
            referencing_entity,
            count,
            ..
        }) => {
            assert_eq!(entity, "Author");
            assert_eq!(id, 1);
            assert_eq!(referencing_entity, "Course");
            assert_eq!(count, 2);
        }
        other => panic!("expected restrict violation, got {other:?}"),
    }

    assert_eq!(ctx.entries().len(), 1);
    assert_eq!(course_count(&ctx), 3);
    assert!(ctx.store().find("Author", 1).unwrap().is_some());
}

#[test]
fn test_remove_cascade_counts_every_affected_entity() {
    let mut ctx = common::context(ContextConfig::default());
    ctx.remove_cascade("Author", 1);

    // Author, two courses, three edge rows removed; one cover nulled.
    assert_eq!(ctx.save_changes().unwrap(), 7);

    assert_eq!(ids(&ctx.query("Course").to_entities().unwrap()), vec![12]);
    assert_eq!(ids(&ctx.query("CourseTag").to_entities().unwrap()), vec![103]);
    let cover = ctx.get("Cover", 200).unwrap();
    assert_eq!(cover.get("course_id"), Some(&Value::Null));
}

#[test]
fn test_remove_without_dependents_drops_edges() {
    let mut ctx = common::context(ContextConfig::default());
    ctx.remove("Course", 12);
    assert_eq!(ctx.save_changes().unwrap(), 2);

    let tag = ctx.get("Tag", 2).unwrap();
    assert_eq!(ids(&ctx.navigate(&tag, "courses").unwrap()), vec![10]);
}

#[test]
fn test_cascade_depth_is_bounded() {
    let mut ctx = common::context(ContextConfig::default().with_max_cascade_depth(0));
    ctx.remove_cascade("Author", 1);
    assert!(matches!(
        ctx.save_changes(),
        Err(Error::ConstraintViolation(ConstraintError::MaxDepthExceeded { depth: 0 }))
    ));
    assert_eq!(course_count(&ctx), 3);
}

#[test]
fn test_add_validation() {
    let mut ctx = common::context(ContextConfig::default());

    ctx.add(common::author(3, &"x".repeat(51)));
    assert!(matches!(
        ctx.save_changes(),
        Err(Error::ConstraintViolation(ConstraintError::MaxLength { max: 50, actual: 51, .. }))
    ));
    ctx.discard_changes();

    ctx.add(
        Entity::new("Course", 13)
            .with_field("level", 1)
            .with_field("full_price", 10.0f32)
            .with_field("author_id", 1i64),
    );
    assert!(matches!(
        ctx.save_changes(),
        Err(Error::ConstraintViolation(ConstraintError::RequiredField { .. }))
    ));
    ctx.discard_changes();

    ctx.add(common::course(13, "Typed", 1, 10.0, 1).with_field("level", "one"));
    assert!(matches!(
        ctx.save_changes(),
        Err(Error::ConstraintViolation(ConstraintError::TypeMismatch { .. }))
    ));
    ctx.discard_changes();

    ctx.add(common::course(13, "Orphan", 1, 10.0, 9));
    assert!(matches!(
        ctx.save_changes(),
        Err(Error::ConstraintViolation(ConstraintError::MissingPrincipal { .. }))
    ));
    ctx.discard_changes();

    ctx.add(common::author(1, "Ann again"));
    assert!(matches!(
        ctx.save_changes(),
        Err(Error::ConstraintViolation(ConstraintError::DuplicateIdentity { id: 1, .. }))
    ));
}

#[test]
fn test_find_all_pushdown_and_closure() {
    let ctx = common::context(ContextConfig::default());
    let store = ctx.store();

    let by_filter: Vec<Entity> = store
        .find_all("Course", FilterExpr::eq("author_id", 1i64))
        .unwrap()
        .collect::<pluto_core::Result<_>>()
        .unwrap();
    let by_closure: Vec<Entity> = store
        .find_all_where("Course", |c| c.get("author_id") == Some(&Value::Int64(1)))
        .unwrap()
        .collect::<pluto_core::Result<_>>()
        .unwrap();
    assert_eq!(ids(&by_filter), vec![10, 11]);
    assert_eq!(by_filter, by_closure);
}
