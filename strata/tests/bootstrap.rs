//! End-to-end bootstrap through the facade: settings, database, registry,
//! permissions, ORM, and admin.

use std::sync::Arc;

use strata::auth::hasher_from_settings;
use strata::auth::permissions::grant_user_permission;
use strata::core::settings_loader;
use strata::prelude::*;

#[derive(Debug, Clone, PartialEq, Model)]
struct Post {
    id: Option<i64>,
    #[field(max_length = 200)]
    title: String,
    #[field(default = "false")]
    is_published: bool,
}

fn registry() -> anyhow::Result<ModelRegistry> {
    let registry = ModelRegistry::new();
    register_auth_models(&registry)?;
    registry.register::<Post>(
        RegisterOptions::new()
            .app("blog")
            .search_fields(&["title"])
            .filter_fields(&["is_published"]),
    )?;
    Ok(registry)
}

#[tokio::test]
async fn test_post_lifecycle_on_configured_database() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("blog.sqlite3");
    let settings = settings_loader::from_toml_str(&format!(
        r#"
        debug = false
        log_level = "warn"

        [database]
        path = "{}"

        [auth]
        password_hasher = "bcrypt"
        bcrypt_cost = 4
        "#,
        path.display()
    ))?;
    assert_eq!(settings.database.journal_mode, "wal");
    assert_eq!(settings.admin.per_page, 25);
    setup_logging(&settings);

    let db = SqliteBackend::from_settings(&settings.database)?;
    let registry = registry()?;
    create_all_tables(&db, &registry).await?;
    assert_eq!(sync_permissions(&db, &registry).await?, 28);

    let mut post = Post {
        id: None,
        title: "Hello".into(),
        is_published: false,
    };
    post.save(&db).await?;
    let id = post.id.expect("saved posts have an id");
    assert!(id > 0);

    let fetched = Post::objects()
        .get(&[("id", Value::from(id))], &db)
        .await?
        .expect("post exists");
    assert_eq!(fetched, post);
    assert_eq!(Post::objects().filter("is_published", false).count(&db).await?, 1);
    let hello = Post::objects()
        .get(&[("title", Value::from("Hello"))], &db)
        .await?
        .expect("post exists");
    assert!(!hello.is_published);

    post.is_published = true;
    post.save(&db).await?;
    assert_eq!(Post::objects().filter("is_published", false).count(&db).await?, 0);
    let published = Post::objects().filter("is_published", true).all(&db).await?;
    assert_eq!(published.len(), 1);
    assert!(published[0].is_published);

    let hasher = hasher_from_settings(&settings.auth)?;
    let author = create_user(&db, hasher.as_ref(), "author", "author@example.com", Some("pw")).await?;
    assert!(author.password.starts_with("$2b$04$"));
    assert!(authenticate(&db, "author", "pw").await?.is_some());

    drop(db);
    let reopened = SqliteBackend::from_settings(&settings.database)?;
    assert_eq!(Post::objects().count(&reopened).await?, 1);

    post.delete(&reopened).await?;
    assert_eq!(Post::objects().count(&reopened).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_admin_through_the_facade() -> anyhow::Result<()> {
    let mut settings = Settings::default();
    settings.database.path = ":memory:".into();
    settings.database.journal_mode = "memory".into();
    settings.admin.per_page = 2;

    let db = Arc::new(SqliteBackend::from_settings(&settings.database)?);
    let registry = Arc::new(registry()?);
    create_all_tables(db.as_ref(), &registry).await?;
    sync_permissions(db.as_ref(), &registry).await?;

    let hasher = hasher_from_settings(&settings.auth)?;
    let mut staff = create_user(db.as_ref(), hasher.as_ref(), "staff", "s@example.com", None).await?;
    staff.is_staff = true;
    staff.save(db.as_ref()).await?;
    for code in ["view_post", "add_post"] {
        grant_user_permission(db.as_ref(), &staff, code).await?;
    }
    let caller = Caller::for_user(db.as_ref(), &staff).await?;

    let admin = AdminService::new(registry, db.clone(), settings.admin.clone());
    for title in ["one", "two", "three"] {
        admin
            .create(&caller, "Post", &serde_json::json!({ "title": title }))
            .await?;
    }

    let page = admin.list(&caller, "Post", ListParams::new().page(2)).await?;
    assert_eq!((page.count, page.per_page, page.total_pages), (3, 2, 2));
    assert_eq!(page.results[0]["title"], "three");
    assert_eq!(page.results[0]["is_published"], false);

    let err = admin.delete(&caller, "Post", 1).await.unwrap_err();
    assert!(matches!(err, StrataError::PermissionDenied(_)));
    assert_eq!(Post::objects().count(db.as_ref()).await?, 3);
    Ok(())
}
