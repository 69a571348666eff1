//! Integration tests for deferred query composition and execution.

mod common;

use common::ids;
use pluto_core::{ContextConfig, Error, FilterExpr, Predicate, Projection, Row, Value};

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|r| r.get("name").and_then(Value::as_str).unwrap_or("").to_string())
        .collect()
}

#[test]
fn test_filter_by_author() {
    let ctx = common::context(ContextConfig::default());
    let courses = ctx
        .query("Course")
        .filter(FilterExpr::eq("author_id", 1i64))
        .to_entities()
        .unwrap();
    assert_eq!(ids(&courses), vec![10, 11]);
}

#[test]
fn test_chained_filters_equal_conjunction() {
    let ctx = common::context(ContextConfig::default());
    let a = FilterExpr::eq("level", 1);
    let b = FilterExpr::gt("full_price", 100.0f32);

    let chained = ctx.query("Course").filter(a.clone()).filter(b.clone());
    let combined = ctx.query("Course").filter(FilterExpr::and(vec![a.clone(), b.clone()]));
    assert_eq!(chained.to_list().unwrap(), combined.to_list().unwrap());
    assert_eq!(ids(&chained.to_entities().unwrap()), vec![12]);

    // A closure in the chain disables pushdown but not the result.
    let mixed = ctx
        .query("Course")
        .filter(a)
        .filter_fn(|r| r.get("full_price").and_then(Value::as_f64).unwrap_or(0.0) > 1.0)
        .filter(b);
    assert_eq!(mixed.to_list().unwrap(), combined.to_list().unwrap());
}

#[test]
fn test_building_does_not_touch_store() {
    let ctx = common::context(ContextConfig::default());
    let before = ctx.stats();

    let query = ctx
        .query("Course")
        .filter(FilterExpr::eq("level", 1))
        .include("author")
        .order_by("name")
        .select(Projection::new().field("name"))
        .take(5);
    let _other = query.skip(1).distinct();
    assert_eq!(ctx.stats(), before);

    assert_eq!(query.count().unwrap(), 2);
    assert!(ctx.stats().reads() > before.reads());
}

#[test]
fn test_terminal_reexecutes_against_current_store() {
    let mut ctx = common::context(ContextConfig::default());
    let count_before = ctx.query("Author").count().unwrap();

    ctx.add(common::author(3, "Cy"));
    ctx.save_changes().unwrap();

    let query = ctx.query("Author");
    assert_eq!(count_before, 2);
    assert_eq!(query.count().unwrap(), 3);
}

#[test]
fn test_ordering_is_stable_with_tie_breaks() {
    let ctx = common::context(ContextConfig::default());

    let by_level = ctx.query("Course").order_by("level").to_entities().unwrap();
    assert_eq!(ids(&by_level), vec![10, 12, 11]);

    let by_level_then_price = ctx
        .query("Course")
        .order_by("level")
        .then_by_desc("full_price")
        .to_entities()
        .unwrap();
    assert_eq!(ids(&by_level_then_price), vec![12, 10, 11]);

    let desc = ctx.query("Course").order_by_desc("full_price").to_entities().unwrap();
    assert_eq!(ids(&desc), vec![12, 11, 10]);
}

#[test]
fn test_then_by_refines_ordering_across_streaming_stages() {
    let ctx = common::context(ContextConfig::default());

    let after_skip = ctx
        .query("Course")
        .order_by("level")
        .skip(0)
        .then_by_desc("full_price")
        .to_entities()
        .unwrap();
    assert_eq!(ids(&after_skip), vec![12, 10, 11]);

    let after_filter = ctx
        .query("Course")
        .order_by_desc("level")
        .filter_fn(|_| true)
        .take(3)
        .then_by("full_price")
        .to_entities()
        .unwrap();
    assert_eq!(ids(&after_filter), vec![11, 10, 12]);

    let after_projection = ctx
        .query("Course")
        .order_by("level")
        .select(Projection::new().field("name"))
        .then_by("name")
        .to_list()
        .unwrap();
    assert_eq!(
        names(&after_projection),
        vec!["C# Advanced", "C# Basics", "Javascript"]
    );
}

#[test]
fn test_skip_take_returns_second_element() {
    let ctx = common::context(ContextConfig::default());
    let page = ctx
        .query("Course")
        .order_by("id")
        .skip(1)
        .take(1)
        .to_entities()
        .unwrap();
    assert_eq!(ids(&page), vec![11]);

    let past_end = ctx.query("Course").skip(5).to_list().unwrap();
    assert!(past_end.is_empty());
}

#[test]
fn test_single_cardinality() {
    let ctx = common::context(ContextConfig::default());

    let none = ctx.query("Course").filter(FilterExpr::eq("level", 9));
    assert!(matches!(none.single(), Err(Error::NotFound { id: None, .. })));
    assert!(none.single_or_default().unwrap().is_none());

    let one = ctx.query("Course").filter(FilterExpr::eq("level", 2));
    assert_eq!(one.single().unwrap().as_entity().unwrap().id, 11);

    let many = ctx.query("Course").filter(FilterExpr::eq("level", 1));
    assert!(matches!(many.single(), Err(Error::MultipleResults { count: 2 })));
    assert!(matches!(
        many.single_or_default(),
        Err(Error::MultipleResults { .. })
    ));
}

#[test]
fn test_first_and_any() {
    let ctx = common::context(ContextConfig::default());
    let cheap = ctx.query("Course").order_by("full_price");
    assert_eq!(cheap.first().unwrap().as_entity().unwrap().id, 10);

    let none = ctx.query("Course").filter(FilterExpr::gt("full_price", 1000.0f32));
    assert!(none.first_or_default().unwrap().is_none());
    assert!(matches!(none.first(), Err(Error::NotFound { .. })));
    assert!(!none.any().unwrap());
    assert!(ctx.query("Course").any().unwrap());
}

#[test]
fn test_aggregates() {
    let ctx = common::context(ContextConfig::default());
    let courses = ctx.query("Course");

    assert_eq!(courses.max("full_price").unwrap(), Some(Value::Float32(149.0)));
    assert_eq!(courses.min("full_price").unwrap(), Some(Value::Float32(49.0)));
    assert_eq!(courses.sum("level").unwrap(), Value::Int64(4));
    assert_eq!(courses.sum("full_price").unwrap(), Value::Float64(267.0));
    assert_eq!(courses.average("full_price").unwrap(), Some(89.0));

    assert!(courses.all(FilterExpr::gt("full_price", 10.0f32)).unwrap());
    assert!(!courses.all(FilterExpr::eq("level", 1)).unwrap());
    assert!(courses
        .any_where(Predicate::func(|r| r.get("name") == Some(&Value::from("Javascript"))))
        .unwrap());

    let empty = ctx.query("Course").filter(FilterExpr::eq("level", 9));
    assert_eq!(empty.max("full_price").unwrap(), None);
    assert_eq!(empty.average("full_price").unwrap(), None);
    assert!(empty.all(FilterExpr::eq("level", 1)).unwrap());
}

#[test]
fn test_projection_with_navigation() {
    let ctx = common::context(ContextConfig::default());
    let rows = ctx
        .query("Course")
        .filter(FilterExpr::eq("level", 1))
        .order_by("name")
        .select(
            Projection::new()
                .field_as("name", "CourseName")
                .related("author", "name", "AuthorName"),
        )
        .to_list()
        .unwrap();

    let pairs: Vec<(Value, Value)> = rows
        .iter()
        .map(|r| {
            let record = r.as_record().unwrap();
            (
                record.get("CourseName").cloned().unwrap(),
                record.get("AuthorName").cloned().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Value::from("C# Basics"), Value::from("Ann")),
            (Value::from("Javascript"), Value::from("Bo")),
        ]
    );
}

#[test]
fn test_group_by_first_occurrence_order() {
    let ctx = common::context(ContextConfig::default());
    let rows = ctx
        .query("Course")
        .group_by("level")
        .select(Projection::new().key("Level").count("Count"))
        .to_list()
        .unwrap();

    let groups: Vec<(Value, Value)> = rows
        .iter()
        .map(|r| (r.get("Level").cloned().unwrap(), r.get("Count").cloned().unwrap()))
        .collect();
    assert_eq!(
        groups,
        vec![
            (Value::Int32(1), Value::Int64(2)),
            (Value::Int32(2), Value::Int64(1)),
        ]
    );
}

#[test]
fn test_inner_join() {
    let ctx = common::context(ContextConfig::default());
    let rows = ctx
        .query("Course")
        .join(&ctx.query("Author"), "author_id", "id")
        .select(
            Projection::new()
                .field_as("Course.name", "CourseName")
                .field_as("Author.name", "AuthorName"),
        )
        .to_list()
        .unwrap();

    let authors: Vec<Value> = rows.iter().map(|r| r.get("AuthorName").cloned().unwrap()).collect();
    assert_eq!(
        authors,
        vec![Value::from("Ann"), Value::from("Ann"), Value::from("Bo")]
    );
}

#[test]
fn test_group_join_counts() {
    let ctx = common::context(ContextConfig::default());
    let rows = ctx
        .query("Author")
        .group_join(&ctx.query("Course"), "id", "author_id")
        .select(Projection::new().field("name").count("Courses"))
        .to_list()
        .unwrap();

    let counts: Vec<(Value, Value)> = rows
        .iter()
        .map(|r| (r.get("name").cloned().unwrap(), r.get("Courses").cloned().unwrap()))
        .collect();
    assert_eq!(
        counts,
        vec![
            (Value::from("Ann"), Value::Int64(2)),
            (Value::from("Bo"), Value::Int64(1)),
        ]
    );
}

#[test]
fn test_cross_join_pairs() {
    let ctx = common::context(ContextConfig::default());
    let query = ctx.query("Author").cross_join(&ctx.query("Course"));
    assert_eq!(query.count().unwrap(), 6);

    let first = query.first().unwrap();
    let pair = first.as_pair().unwrap();
    assert_eq!(&*pair.left_alias, "Author");
    assert_eq!(pair.right.as_entity().unwrap().id, 10);
}

#[test]
fn test_select_many_and_distinct() {
    let ctx = common::context(ContextConfig::default());

    let tags = ctx.query("Course").select_many("tags").to_entities().unwrap();
    assert_eq!(ids(&tags), vec![1, 2, 1, 2]);

    let distinct = ctx
        .query("Course")
        .select_many("tags")
        .distinct()
        .to_list()
        .unwrap();
    assert_eq!(names(&distinct), vec!["c#", "beginner"]);

    let levels = ctx
        .query("Course")
        .select(Projection::new().field("level"))
        .distinct()
        .count()
        .unwrap();
    assert_eq!(levels, 2);
}

#[test]
fn test_computed_projection() {
    let ctx = common::context(ContextConfig::default());
    let rows = ctx
        .query("Course")
        .order_by("id")
        .select(Projection::new().field("id").computed("IsBeginner", |r| {
            Value::Bool(r.get("level") == Some(&Value::Int32(1)))
        }))
        .to_list()
        .unwrap();
    let flags: Vec<Value> = rows.iter().map(|r| r.get("IsBeginner").cloned().unwrap()).collect();
    assert_eq!(
        flags,
        vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]
    );
}

#[test]
fn test_result_set_is_lazy_iterator() {
    let ctx = common::context(ContextConfig::default());
    let mut results = ctx.query("Course").order_by("id").iter().unwrap();
    assert_eq!(results.next().unwrap().unwrap().as_entity().unwrap().id, 10);
    assert_eq!(results.to_list().unwrap().len(), 2);
}

#[test]
fn test_shape_and_schema_errors() {
    let ctx = common::context(ContextConfig::default());

    let records = ctx.query("Course").select(Projection::new().field("name"));
    assert!(matches!(
        records.to_entities(),
        Err(Error::UnexpectedShape {
            expected: "entity",
            found: "record"
        })
    ));

    assert!(matches!(
        ctx.query("Publisher").to_list(),
        Err(Error::UnknownEntity(_))
    ));
    assert!(matches!(
        ctx.query("Course").select_many("students").to_list(),
        Err(Error::UnknownRelationship { .. })
    ));
}
