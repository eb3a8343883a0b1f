//! Admin service scenarios against an in-memory database with the auth
//! models and a small blog app registered.

use std::sync::Arc;

use serde_json::json;
use strata_admin::{AdminService, ListParams};
use strata_auth::permissions::grant_user_permission;
use strata_auth::{
    authenticate, create_superuser, create_user, register_auth_models, sync_permissions,
    BcryptHasher, Caller, User,
};
use strata_core::settings::AdminSettings;
use strata_core::StrataError;
use strata_db::executor::ActiveRecord;
use strata_db::registry::{ModelRegistry, PermissionAction, RegisterOptions};
use strata_macros::Model;
use strata_test::{assert_num_queries, TestDatabase};

const HASHER: BcryptHasher = BcryptHasher { cost: 4 };

#[derive(Debug, Clone, Model)]
struct Post {
    id: Option<i64>,
    #[field(max_length = 40)]
    title: String,
    #[field(default = "")]
    body: String,
    #[field(default = "false")]
    is_published: bool,
    #[field(default = "0")]
    views: i64,
    #[field(default = "")]
    internal_notes: String,
}

#[derive(Debug, Clone, Model)]
struct AuditLog {
    id: Option<i64>,
    message: String,
}

struct Fixture {
    db: Arc<TestDatabase>,
    admin: AdminService,
}

async fn setup() -> Fixture {
    setup_with(AdminSettings::default()).await
}

async fn setup_with(settings: AdminSettings) -> Fixture {
    let registry = ModelRegistry::new();
    register_auth_models(&registry).unwrap();
    registry
        .register::<Post>(
            RegisterOptions::new()
                .app("blog")
                .icon("file-text")
                .exclude(&["internal_notes"])
                .search_fields(&["title", "body"])
                .filter_fields(&["is_published"])
                .list_display(&["title", "is_published"]),
        )
        .unwrap();
    registry
        .register::<AuditLog>(RegisterOptions::new().permissions(&[PermissionAction::View]))
        .unwrap();

    let db = Arc::new(TestDatabase::new());
    db.setup_registry(&registry).await.unwrap();
    sync_permissions(db.as_ref(), &registry).await.unwrap();

    let admin = AdminService::new(Arc::new(registry), db.clone(), settings);
    Fixture { db, admin }
}

impl Fixture {
    async fn superuser(&self) -> Caller {
        let root = create_superuser(self.db.as_ref(), &HASHER, "root", "root@example.com", "pw")
            .await
            .unwrap();
        Caller::for_user(self.db.as_ref(), &root).await.unwrap()
    }

    async fn staff(&self, name: &str, codenames: &[&str]) -> Caller {
        let mut user = create_user(self.db.as_ref(), &HASHER, name, "staff@example.com", None)
            .await
            .unwrap();
        user.is_staff = true;
        user.save(self.db.as_ref()).await.unwrap();
        for code in codenames {
            grant_user_permission(self.db.as_ref(), &user, code).await.unwrap();
        }
        Caller::for_user(self.db.as_ref(), &user).await.unwrap()
    }

    async fn posts(&self, caller: &Caller, titles: &[(&str, bool)]) -> Vec<i64> {
        let mut ids = Vec::new();
        for (title, published) in titles {
            let row = self
                .admin
                .create(caller, "Post", &json!({"title": title, "is_published": published}))
                .await
                .unwrap();
            ids.push(row["id"].as_i64().unwrap());
        }
        ids
    }
}

fn assert_denied<T: std::fmt::Debug>(result: Result<T, StrataError>) {
    let err = result.unwrap_err();
    assert!(matches!(err, StrataError::PermissionDenied(_)), "got {err:?}");
    assert_eq!(err.status_code(), 403);
}

fn titles(results: &[serde_json::Value]) -> Vec<&str> {
    results.iter().map(|r| r["title"].as_str().unwrap()).collect()
}

// ── Gating ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_anonymous_and_non_staff_are_denied() {
    let fx = setup().await;
    let anonymous = Caller::anonymous();
    assert_denied(fx.admin.index(&anonymous));
    assert_denied(fx.admin.list(&anonymous, "Post", ListParams::new()).await);

    let member = Caller {
        user_id: Some(1),
        username: "member".into(),
        is_active: true,
        ..Caller::default()
    };
    assert_denied(fx.admin.get(&member, "Post", 1).await);

    let retired = Caller {
        is_active: false,
        is_superuser: true,
        ..member
    };
    assert_denied(fx.admin.schema(&retired, "Post"));
}

#[tokio::test]
async fn test_staff_without_permissions_sees_nothing() {
    let fx = setup().await;
    let staff = fx.staff("clerk", &[]).await;
    assert!(fx.admin.index(&staff).unwrap().apps.is_empty());
    assert_denied(fx.admin.list(&staff, "Post", ListParams::new()).await);
    assert_denied(fx.admin.create(&staff, "Post", &json!({"title": "x"})).await);
}

#[tokio::test]
async fn test_add_permission_allows_create_only() {
    let fx = setup().await;
    let editor = fx.staff("editor", &["add_post"]).await;

    let created = fx
        .admin
        .create(&editor, "Post", &json!({"title": "Hello"}))
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["title"], "Hello");

    assert_denied(fx.admin.update(&editor, "Post", id, &json!({"title": "Edited"})).await);
    assert_denied(fx.admin.delete(&editor, "Post", id).await);
    assert_denied(fx.admin.get(&editor, "Post", id).await);

    let index = fx.admin.index(&editor).unwrap();
    assert_eq!(index.apps.len(), 1);
    assert_eq!(index.apps[0].app, "blog");
    assert_eq!(index.apps[0].models[0].actions, vec![PermissionAction::Add]);
}

#[tokio::test]
async fn test_verbs_outside_model_permissions_are_denied_even_to_superusers() {
    let fx = setup().await;
    let root = fx.superuser().await;
    assert_denied(fx.admin.create(&root, "AuditLog", &json!({"message": "m"})).await);
    assert_denied(fx.admin.delete(&root, "AuditLog", 1).await);
    assert!(fx.admin.list(&root, "AuditLog", ListParams::new()).await.is_ok());

    let schema = fx.admin.schema(&root, "AuditLog").unwrap();
    assert_eq!(schema.actions, vec![PermissionAction::View]);
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let fx = setup().await;
    let root = fx.superuser().await;
    let err = fx.admin.list(&root, "Comment", ListParams::new()).await.unwrap_err();
    assert!(matches!(err, StrataError::NotFound(_)));
}

#[tokio::test]
async fn test_superuser_index_groups_by_app() {
    let fx = setup().await;
    let root = fx.superuser().await;
    let index = fx.admin.index(&root).unwrap();

    let apps: Vec<&str> = index.apps.iter().map(|a| a.app.as_str()).collect();
    assert_eq!(apps, vec!["auth", "blog", "default"]);
    assert_eq!(index.apps[0].models.len(), 6);
    let post = &index.apps[1].models[0];
    assert_eq!(post.name, "Post");
    assert_eq!(post.icon.as_deref(), Some("file-text"));
    assert_eq!(post.actions, PermissionAction::ALL.to_vec());
}

// ── Redaction ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hidden_and_excluded_fields_are_redacted() {
    let fx = setup().await;
    let root = fx.superuser().await;

    let users = fx.admin.list(&root, "User", ListParams::new()).await.unwrap();
    assert_eq!(users.count, 1);
    assert!(users.results[0].get("password").is_none());
    assert_eq!(users.results[0]["username"], "root");

    let schema = fx.admin.schema(&root, "User").unwrap();
    assert!(schema.fields.iter().all(|f| f.name != "password"));

    let post = fx
        .admin
        .create(
            &root,
            "Post",
            &json!({"title": "T", "internal_notes": "secret", "id": 500}),
        )
        .await
        .unwrap();
    assert!(post.get("internal_notes").is_none());
    assert_ne!(post["id"], 500);

    let schema = fx.admin.schema(&root, "Post").unwrap();
    assert!(schema.fields.iter().all(|f| f.name != "internal_notes"));
    assert_eq!(schema.list_display, vec!["title", "is_published"]);
    assert_eq!(schema.filter_fields, vec!["is_published"]);
}

#[tokio::test]
async fn test_admin_created_user_has_no_usable_password() {
    let fx = setup().await;
    let root = fx.superuser().await;
    let created = fx
        .admin
        .create(
            &root,
            "User",
            &json!({"username": "bob", "email": "bob@example.com", "password": "x"}),
        )
        .await
        .unwrap();
    assert!(created.get("password").is_none());
    assert_eq!(created["is_active"], true);

    let stored = User::find_by_username(fx.db.as_ref(), "bob").await.unwrap().unwrap();
    assert!(!stored.has_usable_password());
    assert!(authenticate(fx.db.as_ref(), "bob", "x").await.unwrap().is_none());
}

// ── Validation ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_input_reports_field_errors() {
    let fx = setup().await;
    let root = fx.superuser().await;

    let err = fx
        .admin
        .create(
            &root,
            "Post",
            &json!({"title": "x".repeat(41), "is_published": "maybe", "views": 1.5}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    let StrataError::ValidationError(validation) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(validation.errors_for("title").unwrap()[0].code, "max_length");
    assert_eq!(validation.errors_for("is_published").unwrap()[0].code, "invalid");
    assert_eq!(validation.errors_for("views").unwrap()[0].code, "invalid");

    let err = fx.admin.create(&root, "Post", &json!({})).await.unwrap_err();
    let StrataError::ValidationError(validation) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(validation.errors_for("title").unwrap()[0].code, "required");
    assert!(validation.errors_for("body").is_none());

    let err = fx.admin.create(&root, "Post", &json!("title")).await.unwrap_err();
    assert!(matches!(err, StrataError::BadRequest(_)));

    let list = fx.admin.list(&root, "Post", ListParams::new()).await.unwrap();
    assert_eq!(list.count, 0);
}

#[tokio::test]
async fn test_unique_violation_surfaces_as_integrity_error() {
    let fx = setup().await;
    let root = fx.superuser().await;
    let err = fx
        .admin
        .create(&root, "User", &json!({"username": "root", "email": "r@example.com"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::IntegrityError(_)));
}

// ── List ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pagination() {
    let fx = setup_with(AdminSettings {
        per_page: 3,
        max_per_page: 5,
    })
    .await;
    let root = fx.superuser().await;
    let names: Vec<(String, bool)> = (1..=7).map(|i| (format!("p{i}"), false)).collect();
    let refs: Vec<(&str, bool)> = names.iter().map(|(n, p)| (n.as_str(), *p)).collect();
    fx.posts(&root, &refs).await;

    let page = fx.admin.list(&root, "Post", ListParams::new()).await.unwrap();
    assert_eq!((page.count, page.page, page.per_page, page.total_pages), (7, 1, 3, 3));
    assert_eq!(titles(&page.results), vec!["p1", "p2", "p3"]);

    let last = fx
        .admin
        .list(&root, "Post", ListParams::new().page(3))
        .await
        .unwrap();
    assert_eq!(titles(&last.results), vec!["p7"]);

    let clamped = fx
        .admin
        .list(&root, "Post", ListParams::new().page(0).per_page(1000))
        .await
        .unwrap();
    assert_eq!((clamped.page, clamped.per_page, clamped.total_pages), (1, 5, 2));
    assert_eq!(clamped.results.len(), 5);

    let beyond = fx
        .admin
        .list(&root, "Post", ListParams::new().page(9))
        .await
        .unwrap();
    assert!(beyond.results.is_empty());
    assert_eq!(beyond.count, 7);
}

#[tokio::test]
async fn test_empty_list_has_one_page() {
    let fx = setup().await;
    let root = fx.superuser().await;
    let page = fx.admin.list(&root, "Post", ListParams::new()).await.unwrap();
    assert_eq!((page.count, page.total_pages), (0, 1));
    assert_eq!(page.per_page, 25);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let fx = setup().await;
    let root = fx.superuser().await;
    fx.posts(&root, &[("only", false)]).await;

    for page in [2, u64::MAX / 2, u64::MAX] {
        let listed = fx
            .admin
            .list(&root, "Post", ListParams::new().page(page).per_page(100))
            .await
            .unwrap();
        assert!(listed.results.is_empty(), "page {page}");
        assert_eq!((listed.count, listed.page, listed.total_pages), (1, page, 1));
    }

    let admin = &fx.admin;
    let root = &root;
    assert_num_queries(fx.db.as_ref(), 1, || async move {
        admin
            .list(root, "Post", ListParams::new().page(u64::MAX))
            .await
            .unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_filter_search_and_ordering() {
    let fx = setup().await;
    let root = fx.superuser().await;
    fx.posts(
        &root,
        &[("Learning Rust", true), ("Cooking", false), ("rust in prod", true), ("Gardening", true)],
    )
    .await;

    let published = fx
        .admin
        .list(&root, "Post", ListParams::new().filter("is_published", "true"))
        .await
        .unwrap();
    assert_eq!(published.count, 3);
    assert!(published.results.iter().all(|r| r["is_published"] == true));

    let search = fx
        .admin
        .list(&root, "Post", ListParams::new().search("RUST").ordering("-title"))
        .await
        .unwrap();
    assert_eq!(titles(&search.results), vec!["rust in prod", "Learning Rust"]);

    let combined = fx
        .admin
        .list(
            &root,
            "Post",
            ListParams::new().search("rust").filter("is_published", "1").ordering("title"),
        )
        .await
        .unwrap();
    assert_eq!(combined.count, 2);

    let blank = fx
        .admin
        .list(&root, "Post", ListParams::new().search("   "))
        .await
        .unwrap();
    assert_eq!(blank.count, 4);
}

#[tokio::test]
async fn test_list_rejects_undeclared_filters_and_ordering() {
    let fx = setup().await;
    let root = fx.superuser().await;

    let err = fx
        .admin
        .list(&root, "Post", ListParams::new().filter("title", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::BadRequest(_)));

    let err = fx
        .admin
        .list(&root, "Post", ListParams::new().filter("is_published", "maybe"))
        .await
        .unwrap_err();
    let StrataError::ValidationError(validation) = err else {
        panic!("expected a validation error");
    };
    assert!(validation.errors_for("is_published").is_some());

    for ordering in ["internal_notes", "-nope", "password"] {
        let err = fx
            .admin
            .list(&root, "Post", ListParams::new().ordering(ordering))
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::BadRequest(_)), "{ordering}");
    }
}

#[tokio::test]
async fn test_list_is_two_statements() {
    let fx = setup().await;
    let root = fx.superuser().await;
    fx.posts(&root, &[("a", true), ("b", false)]).await;

    let admin = &fx.admin;
    let root = &root;
    assert_num_queries(fx.db.as_ref(), 2, || async move {
        let page = admin
            .list(root, "Post", ListParams::new().filter("is_published", "true"))
            .await
            .unwrap();
        assert_eq!(page.count, 1);
    })
    .await;
}

// ── Get / update / delete ────────────────────────────────────────────

#[tokio::test]
async fn test_update_is_partial() {
    let fx = setup().await;
    let root = fx.superuser().await;
    let id = fx
        .admin
        .create(&root, "Post", &json!({"title": "Draft", "body": "text", "views": 3}))
        .await
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let updated = fx
        .admin
        .update(&root, "Post", id, &json!({"is_published": true, "id": 77}))
        .await
        .unwrap();
    assert_eq!(updated["id"], id);
    assert_eq!(updated["title"], "Draft");
    assert_eq!(updated["body"], "text");
    assert_eq!(updated["views"], 3);
    assert_eq!(updated["is_published"], true);

    let fetched = fx.admin.get(&root, "Post", id).await.unwrap();
    assert_eq!(fetched, updated);

    let err = fx
        .admin
        .update(&root, "Post", id, &json!({"title": null}))
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::ValidationError(_)));
}

#[tokio::test]
async fn test_missing_rows_are_not_found() {
    let fx = setup().await;
    let root = fx.superuser().await;
    let id = fx.posts(&root, &[("gone", false)]).await[0];
    fx.admin.delete(&root, "Post", id).await.unwrap();

    for result in [
        fx.admin.get(&root, "Post", id).await.map(|_| ()),
        fx.admin.update(&root, "Post", id, &json!({"title": "x"})).await.map(|_| ()),
        fx.admin.delete(&root, "Post", id).await,
    ] {
        let err = result.unwrap_err();
        assert!(matches!(err, StrataError::NotFound(_)), "got {err:?}");
        assert_eq!(err.status_code(), 404);
    }
}

#[tokio::test]
async fn test_caller_snapshot_does_not_see_later_grants() {
    let fx = setup().await;
    let viewer = fx.staff("viewer", &[]).await;
    let user = User::find_by_username(fx.db.as_ref(), "viewer").await.unwrap().unwrap();
    grant_user_permission(fx.db.as_ref(), &user, "view_post").await.unwrap();

    assert_denied(fx.admin.list(&viewer, "Post", ListParams::new()).await);
    let refreshed = Caller::for_user(fx.db.as_ref(), &user).await.unwrap();
    assert!(fx.admin.list(&refreshed, "Post", ListParams::new()).await.is_ok());
}
