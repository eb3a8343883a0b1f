//! Integration tests for the ORM execution pipeline.
//!
//! These run derived models through SQL compilation, execution on a real
//! in-memory SQLite database, and hydration back into model instances.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use strata_core::StrataError;
use strata_db::fields::now;
use strata_db::executor::{create_all_tables, drop_all_tables, ActiveRecord, DbExecutor};
use strata_db::model::{ManyToMany, Model};
use strata_db::registry::{ModelRegistry, RegisterOptions};
use strata_db::related::Related;
use strata_db::value::Value;
use strata_db_backends::SqliteBackend;
use strata_macros::Model;

// ── Test model definitions ────────────────────────────────────────────

#[derive(Debug, Clone, Model)]
struct Category {
    id: Option<i64>,
    #[field(max_length = 50, unique)]
    name: String,
}

#[derive(Debug, Clone, Model)]
struct Tag {
    id: Option<i64>,
    #[field(max_length = 30)]
    label: String,
}

#[derive(Debug, Clone, Model)]
struct Post {
    id: Option<i64>,
    #[field(max_length = 200)]
    title: String,
    #[field(default = "false")]
    is_published: Option<bool>,
    #[field(max_length = 20, default = "draft")]
    status: Option<String>,
    #[field(default_fn = "now")]
    created_at: Option<DateTime<Utc>>,
    #[field(default_fn = "next_rank")]
    rank: Option<i64>,
    #[field(foreign_key = "Category", null, on_delete = "set_null")]
    category_id: Option<i64>,
    #[field(many_to_many = "Tag")]
    tags: ManyToMany,
}

#[derive(Debug, Clone, Model)]
struct Author {
    id: Option<i64>,
    #[field(max_length = 100)]
    name: String,
}

#[derive(Debug, Clone, Model)]
struct Book {
    id: Option<i64>,
    #[field(max_length = 100)]
    title: String,
    #[field(foreign_key = "Author", on_delete = "restrict")]
    author_id: i64,
}

#[derive(Debug, Clone, Model)]
struct Review {
    id: Option<i64>,
    body: String,
    #[field(foreign_key = "Book")]
    book_id: i64,
}

static RANK: AtomicI64 = AtomicI64::new(0);

fn next_rank() -> Value {
    Value::Int(RANK.fetch_add(1, Ordering::SeqCst) + 1)
}

fn post(title: &str) -> Post {
    Post {
        id: None,
        title: title.into(),
        is_published: None,
        status: None,
        created_at: None,
        rank: None,
        category_id: None,
        tags: ManyToMany,
    }
}

fn registry() -> ModelRegistry {
    let registry = ModelRegistry::new();
    registry.register::<Category>(RegisterOptions::new()).unwrap();
    registry.register::<Tag>(RegisterOptions::new()).unwrap();
    registry.register::<Post>(RegisterOptions::new()).unwrap();
    registry.register::<Author>(RegisterOptions::new()).unwrap();
    registry.register::<Book>(RegisterOptions::new()).unwrap();
    registry.register::<Review>(RegisterOptions::new()).unwrap();
    registry
}

async fn setup() -> (SqliteBackend, ModelRegistry) {
    let db = SqliteBackend::memory().unwrap();
    let registry = registry();
    create_all_tables(&db, &registry).await.unwrap();
    (db, registry)
}

async fn table_names(db: &SqliteBackend) -> Vec<String> {
    db.query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        &[],
    )
    .await
    .unwrap()
    .iter()
    .map(|r| r.get::<String>("name").unwrap())
    .collect()
}

// ── Save / get / update ───────────────────────────────────────────────

#[tokio::test]
async fn test_save_get_update_round_trip() {
    let (db, _) = setup().await;

    let mut p = post("Hello");
    p.save(&db).await.unwrap();
    let id = p.id.unwrap();
    assert!(id > 0);

    let fetched = Post::objects()
        .get(&[("id", Value::Int(id))], &db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.title, "Hello");
    assert_eq!(fetched.is_published, Some(false));

    let mut fetched = fetched;
    fetched.is_published = Some(true);
    fetched.save(&db).await.unwrap();
    assert_eq!(fetched.id, Some(id));

    let again = Post::objects()
        .get(&[("id", Value::Int(id))], &db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.is_published, Some(true));
    assert_eq!(Post::objects().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let (db, _) = setup().await;
    let found = Post::objects()
        .get(&[("id", Value::Int(999))], &db)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_get_multiple_matches_is_error() {
    let (db, _) = setup().await;
    Post::objects().create(post("same"), &db).await.unwrap();
    Post::objects().create(post("same"), &db).await.unwrap();
    let err = Post::objects()
        .get(&[("title", Value::from("same"))], &db)
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::MultipleObjectsReturned(_)));
}

#[tokio::test]
async fn test_literal_default_persisted_when_omitted() {
    let (db, _) = setup().await;
    let mut p = post("Defaults");
    p.save(&db).await.unwrap();
    p.refresh(&db).await.unwrap();
    assert_eq!(p.status.as_deref(), Some("draft"));
    assert_eq!(p.is_published, Some(false));
    assert!(p.created_at.is_some());
}

#[tokio::test]
async fn test_callable_default_invoked_per_save() {
    let (db, _) = setup().await;
    let first = Post::objects().create(post("a"), &db).await.unwrap();
    let second = Post::objects().create(post("b"), &db).await.unwrap();

    let mut first = first;
    let mut second = second;
    first.refresh(&db).await.unwrap();
    second.refresh(&db).await.unwrap();
    assert!(first.rank.unwrap() > 0);
    assert!(second.rank.unwrap() > first.rank.unwrap());
}

#[tokio::test]
async fn test_explicit_value_overrides_default() {
    let (db, _) = setup().await;
    let mut p = post("Live");
    p.status = Some("live".into());
    p.save(&db).await.unwrap();
    p.refresh(&db).await.unwrap();
    assert_eq!(p.status.as_deref(), Some("live"));
}

#[tokio::test]
async fn test_unique_violation_is_integrity_error() {
    let (db, _) = setup().await;
    let mut a = Category { id: None, name: "rust".into() };
    a.save(&db).await.unwrap();
    let mut b = Category { id: None, name: "rust".into() };
    let err = b.save(&db).await.unwrap_err();
    assert!(matches!(err, StrataError::IntegrityError(_)));
    assert!(b.id.is_none());
}

// ── Query sets ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_filter_order_count_delete() {
    let (db, _) = setup().await;
    for (title, published) in [("c", true), ("a", true), ("b", false)] {
        let mut p = post(title);
        p.is_published = Some(published);
        p.save(&db).await.unwrap();
    }

    let published = Post::objects()
        .filter("is_published", true)
        .order_by("title")
        .all(&db)
        .await
        .unwrap();
    let titles: Vec<&str> = published.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "c"]);

    let newest = Post::objects().order_by("-id").first(&db).await.unwrap().unwrap();
    assert_eq!(newest.title, "b");

    assert_eq!(Post::objects().filter("is_published", false).count(&db).await.unwrap(), 1);

    let removed = Post::objects().filter("is_published", true).delete(&db).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(Post::objects().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_chained_filters_count_rows_matching_both() {
    let (db, _) = setup().await;
    let rows = [
        ("a", true, "live"),
        ("b", true, "draft"),
        ("c", false, "live"),
        ("d", true, "live"),
        ("e", false, "draft"),
    ];
    for (title, published, status) in rows {
        let mut p = post(title);
        p.is_published = Some(published);
        p.status = Some(status.into());
        p.save(&db).await.unwrap();
    }

    let expected = Post::objects()
        .all()
        .all(&db)
        .await
        .unwrap()
        .iter()
        .filter(|p| p.is_published == Some(true) && p.status.as_deref() == Some("live"))
        .count() as u64;
    let counted = Post::objects()
        .filter("is_published", true)
        .filter("status", "live")
        .count(&db)
        .await
        .unwrap();
    assert_eq!(counted, expected);
    assert_eq!(counted, 2);
    assert_eq!(Post::objects().count(&db).await.unwrap(), rows.len() as u64);
}

#[tokio::test]
async fn test_queryset_delete_leaves_no_matches() {
    let (db, _) = setup().await;
    for title in ["keep", "drop", "drop"] {
        post(title).save(&db).await.unwrap();
    }
    let doomed = Post::objects().filter("title", "drop");
    assert_eq!(doomed.delete(&db).await.unwrap(), 2);
    assert!(doomed.all(&db).await.unwrap().is_empty());
    assert_eq!(doomed.delete(&db).await.unwrap(), 0);

    let rest = Post::objects().all().all(&db).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].title, "keep");
}

#[tokio::test]
async fn test_publishing_a_post() {
    let (db, _) = setup().await;
    Post::objects().create(post("Hello"), &db).await.unwrap();

    assert_eq!(Post::objects().filter("is_published", false).count(&db).await.unwrap(), 1);
    let mut hello = Post::objects()
        .get(&[("title", Value::from("Hello"))], &db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hello.is_published, Some(false));

    hello.is_published = Some(true);
    hello.save(&db).await.unwrap();
    assert_eq!(Post::objects().filter("is_published", false).count(&db).await.unwrap(), 0);
    assert_eq!(Post::objects().filter("is_published", true).count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_filter_on_null_matches_missing_values() {
    let (db, _) = setup().await;
    let mut cat = Category { id: None, name: "news".into() };
    cat.save(&db).await.unwrap();

    let mut filed = post("filed");
    filed.category_id = cat.id;
    filed.save(&db).await.unwrap();
    post("loose").save(&db).await.unwrap();

    let loose = Post::objects()
        .filter("category_id", Value::Null)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(loose.len(), 1);
    assert_eq!(loose[0].title, "loose");
}

#[tokio::test]
async fn test_limit_and_offset() {
    let (db, _) = setup().await;
    for title in ["p1", "p2", "p3", "p4"] {
        post(title).save(&db).await.unwrap();
    }
    let page = Post::objects()
        .order_by("id")
        .limit(2)
        .offset(1)
        .all(&db)
        .await
        .unwrap();
    let titles: Vec<&str> = page.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["p2", "p3"]);

    let tail = Post::objects().order_by("id").offset(3).all(&db).await.unwrap();
    assert_eq!(tail.len(), 1);
}

#[tokio::test]
async fn test_paging_beyond_sqlite_integer_range() {
    let (db, _) = setup().await;
    for title in ["p1", "p2"] {
        post(title).save(&db).await.unwrap();
    }
    let everything = Post::objects().all().limit(u64::MAX).all(&db).await.unwrap();
    assert_eq!(everything.len(), 2);
    let nothing = Post::objects().all().offset(u64::MAX).all(&db).await.unwrap();
    assert!(nothing.is_empty());
}

// ── Delete ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_instance() {
    let (db, _) = setup().await;
    let p = Post::objects().create(post("gone"), &db).await.unwrap();
    let id = p.id.unwrap();
    p.delete(&db).await.unwrap();
    assert!(Post::objects()
        .get(&[("id", Value::Int(id))], &db)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_unsaved_is_invalid_operation() {
    let (db, _) = setup().await;
    let err = post("never saved").delete(&db).await.unwrap_err();
    assert!(matches!(err, StrataError::InvalidOperation(_)));
}

#[tokio::test]
async fn test_refresh_deleted_row_is_does_not_exist() {
    let (db, _) = setup().await;
    let mut p = Post::objects().create(post("x"), &db).await.unwrap();
    Post::objects().all().delete(&db).await.unwrap();
    let err = p.refresh(&db).await.unwrap_err();
    assert!(matches!(err, StrataError::DoesNotExist(_)));
}

// ── Foreign keys ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_cascade_removes_dependents() {
    let (db, _) = setup().await;
    let author = Author::objects()
        .create(Author { id: None, name: "Le Guin".into() }, &db)
        .await
        .unwrap();
    let book = Book::objects()
        .create(
            Book { id: None, title: "Earthsea".into(), author_id: author.id.unwrap() },
            &db,
        )
        .await
        .unwrap();
    Review::objects()
        .create(Review { id: None, body: "great".into(), book_id: book.id.unwrap() }, &db)
        .await
        .unwrap();

    book.delete(&db).await.unwrap();
    assert_eq!(Review::objects().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_restrict_blocks_parent_delete() {
    let (db, _) = setup().await;
    let author = Author::objects()
        .create(Author { id: None, name: "Butler".into() }, &db)
        .await
        .unwrap();
    Book::objects()
        .create(
            Book { id: None, title: "Kindred".into(), author_id: author.id.unwrap() },
            &db,
        )
        .await
        .unwrap();

    let err = author.clone().delete(&db).await.unwrap_err();
    assert!(matches!(err, StrataError::IntegrityError(_)));
    assert_eq!(Author::objects().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_set_null_clears_reference() {
    let (db, _) = setup().await;
    let cat = Category::objects()
        .create(Category { id: None, name: "misc".into() }, &db)
        .await
        .unwrap();
    let mut p = post("filed");
    p.category_id = cat.id;
    p.save(&db).await.unwrap();

    cat.delete(&db).await.unwrap();
    p.refresh(&db).await.unwrap();
    assert_eq!(p.category_id, None);
}

#[tokio::test]
async fn test_dangling_reference_rejected() {
    let (db, _) = setup().await;
    let err = Book::objects()
        .create(Book { id: None, title: "Orphan".into(), author_id: 404 }, &db)
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::IntegrityError(_)));
}

#[tokio::test]
async fn test_unregistered_target_fails_create_table() {
    let db = SqliteBackend::memory().unwrap();
    let registry = ModelRegistry::new();
    let err = Book::create_table(&db, &registry).await.unwrap_err();
    assert!(matches!(err, StrataError::ImproperlyConfigured(_)));
    assert!(table_names(&db).await.is_empty());
}

// ── Many-to-many ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_related_add_set_remove() {
    let (db, registry) = setup().await;
    let p = Post::objects().create(post("tagged"), &db).await.unwrap();
    let mut tag_ids = Vec::new();
    for label in ["rust", "orm", "sqlite"] {
        let t = Tag::objects()
            .create(Tag { id: None, label: label.into() }, &db)
            .await
            .unwrap();
        tag_ids.push(t.id.unwrap());
    }
    let pid = p.id.unwrap();
    let tags = Related::resolve(&registry, Post::meta(), "tags").unwrap();
    assert_eq!(tags.junction().table, "post_tags");

    assert!(tags.add(&db, pid, tag_ids[0]).await.unwrap());
    assert!(!tags.add(&db, pid, tag_ids[0]).await.unwrap());
    assert_eq!(tags.ids(&db, pid).await.unwrap(), vec![tag_ids[0]]);

    tags.set(&db, pid, &[tag_ids[2], tag_ids[1], tag_ids[2]]).await.unwrap();
    assert_eq!(tags.ids(&db, pid).await.unwrap(), vec![tag_ids[2], tag_ids[1]]);

    assert!(tags.remove(&db, pid, tag_ids[1]).await.unwrap());
    assert!(!tags.remove(&db, pid, tag_ids[1]).await.unwrap());
    assert!(tags.contains(&db, pid, tag_ids[2]).await.unwrap());

    assert_eq!(tags.clear(&db, pid).await.unwrap(), 1);
    assert!(tags.ids(&db, pid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_related_set_rolls_back_on_bad_id() {
    let (db, registry) = setup().await;
    let p = Post::objects().create(post("tagged"), &db).await.unwrap();
    let t = Tag::objects()
        .create(Tag { id: None, label: "keep".into() }, &db)
        .await
        .unwrap();
    let pid = p.id.unwrap();
    let tags = Related::resolve(&registry, Post::meta(), "tags").unwrap();
    tags.add(&db, pid, t.id.unwrap()).await.unwrap();

    let err = tags.set(&db, pid, &[9999]).await.unwrap_err();
    assert!(matches!(err, StrataError::IntegrityError(_)));
    assert_eq!(tags.ids(&db, pid).await.unwrap(), vec![t.id.unwrap()]);
}

#[tokio::test]
async fn test_deleting_owner_cascades_to_junction() {
    let (db, registry) = setup().await;
    let p = Post::objects().create(post("tagged"), &db).await.unwrap();
    let t = Tag::objects()
        .create(Tag { id: None, label: "x".into() }, &db)
        .await
        .unwrap();
    let pid = p.id.unwrap();
    let tags = Related::resolve(&registry, Post::meta(), "tags").unwrap();
    tags.add(&db, pid, t.id.unwrap()).await.unwrap();

    p.delete(&db).await.unwrap();
    assert!(tags.ids(&db, pid).await.unwrap().is_empty());
}

// ── Schema lifecycle ──────────────────────────────────────────────────

#[tokio::test]
async fn test_create_and_drop_all_tables() {
    let (db, registry) = setup().await;
    assert_eq!(
        table_names(&db).await,
        vec!["authors", "books", "categories", "post_tags", "posts", "reviews", "tags"]
    );

    // Creating again is a no-op.
    create_all_tables(&db, &registry).await.unwrap();

    drop_all_tables(&db, &registry).await.unwrap();
    assert!(table_names(&db).await.is_empty());
}

#[tokio::test]
async fn test_file_backed_database_persists_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orm.db");
    {
        let db = SqliteBackend::open(&path).unwrap();
        let registry = registry();
        create_all_tables(&db, &registry).await.unwrap();
        Category::objects()
            .create(Category { id: None, name: "kept".into() }, &db)
            .await
            .unwrap();
    }
    let db = SqliteBackend::open(&path).unwrap();
    let found = Category::objects()
        .get(&[("name", Value::from("kept"))], &db)
        .await
        .unwrap();
    assert!(found.is_some());
}
