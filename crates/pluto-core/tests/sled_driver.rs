//! The sled driver behaves like the in-memory driver.

mod common;

use common::ids;
use pluto_core::{
    Context, ContextConfig, FilterExpr, MemoryDriver, Projection, Row, SledConfig, SledDriver,
};

fn sled_context(dir: &tempfile::TempDir) -> Context {
    let driver = SledDriver::open(SledConfig::new(dir.path())).unwrap();
    common::context_with(driver, ContextConfig::default())
}

fn scenario(ctx: &Context) -> Vec<Vec<Row>> {
    vec![
        ctx.query("Course")
            .filter(FilterExpr::eq("author_id", 1i64))
            .to_list()
            .unwrap(),
        ctx.query("Course")
            .order_by("level")
            .then_by_desc("full_price")
            .skip(1)
            .to_list()
            .unwrap(),
        ctx.query("Author")
            .group_join(&ctx.query("Course"), "id", "author_id")
            .select(Projection::new().field("name").count("Courses"))
            .to_list()
            .unwrap(),
        ctx.query("Course").select_many("tags").distinct().to_list().unwrap(),
    ]
}

#[test]
fn test_query_parity_with_memory_driver() {
    let dir = tempfile::tempdir().unwrap();
    let sled = sled_context(&dir);
    let memory = common::context_with(MemoryDriver::new(), ContextConfig::default());

    assert_eq!(sled.store().driver_name(), "sled");
    assert_eq!(scenario(&sled), scenario(&memory));
}

#[test]
fn test_loading_parity_with_memory_driver() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = sled_context(&dir);
    let before = ctx.stats();

    let courses = ctx.query("Course").include("tags").to_entities().unwrap();
    assert_eq!(ctx.stats().resolutions, before.resolutions + 1);
    assert_eq!(ids(&ctx.loader().current(&courses[0], "tags")), vec![1, 2]);

    let ann = ctx.get("Author", 1).unwrap();
    let beginner = ctx
        .entry(&ann)
        .navigation("courses")
        .filter(FilterExpr::eq("level", 1));
    assert_eq!(beginner.load().unwrap(), 1);
    assert!(!beginner.is_loaded());
}

#[test]
fn test_saved_changes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut ctx = sled_context(&dir);
        ctx.remove_cascade("Author", 2);
        assert_eq!(ctx.save_changes().unwrap(), 3);
    }

    let driver = SledDriver::open(SledConfig::new(dir.path())).unwrap();
    assert!(driver.was_recovered());
    let ctx = Context::with_driver(common::schema(), driver, ContextConfig::default()).unwrap();

    assert_eq!(ctx.query("Author").count().unwrap(), 1);
    assert_eq!(ids(&ctx.query("Course").to_entities().unwrap()), vec![10, 11]);
    let ann = ctx.get("Author", 1).unwrap();
    assert_eq!(ids(&ctx.navigate(&ann, "courses").unwrap()), vec![10, 11]);
}
