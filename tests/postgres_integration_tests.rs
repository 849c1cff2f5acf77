//! PostgreSQL Integration Tests
//!
//! The CRUD pipelines against a real database through [`PgDatabase`]. Each test
//! gets a fresh database from `#[sqlx::test]` (set `DATABASE_URL`) and creates the
//! `posts` table itself.

mod common;

use common::posts_schema;
use resource_orm::{Database, Operations, OrmError, OrmResult, PgDatabase, Record, SchemaValidator, Value};
use sqlx::PgPool;
use std::sync::Arc;

const CREATE_POSTS: &str = r#"
CREATE TABLE posts (
    id uuid PRIMARY KEY,
    title text NOT NULL,
    body text,
    status text NOT NULL,
    views bigint NOT NULL DEFAULT 0,
    author_id bigint,
    slug text UNIQUE,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL,
    deleted_at timestamptz,
    version bigint NOT NULL DEFAULT 1
)
"#;

async fn post_ops(pool: PgPool) -> OrmResult<Operations> {
    let db = Arc::new(PgDatabase::from_pool(pool));
    db.execute(CREATE_POSTS, &[]).await?;
    Ok(Operations::new(Arc::new(posts_schema()), db)
        .with_validator(Arc::new(SchemaValidator::new())))
}

fn new_post(title: &str) -> Record {
    Record::new()
        .with("title", title)
        .with("status", "draft")
        .with("views", 0)
}

fn id_of(record: &Record) -> Value {
    record.get("id").cloned().unwrap_or(Value::Null)
}

#[sqlx::test(migrations = false)]
async fn test_create_and_update_live_row(pool: PgPool) -> OrmResult<()> {
    let posts = post_ops(pool).await?;

    let created = posts.create(new_post("First")).await?;
    assert!(matches!(created.get("id"), Some(Value::Uuid(_))));
    assert_eq!(created.get("version"), Some(&Value::Int(1)));
    assert_eq!(created.get("deleted_at"), Some(&Value::Null));

    // The loaded row carries NULL body, slug and deleted_at; none of them is rewritten.
    let updated = posts
        .update(id_of(&created), Record::new().with("title", "Second").with("version", 1))
        .await?;
    assert_eq!(updated.get("title"), Some(&Value::from("Second")));
    assert_eq!(updated.get("version"), Some(&Value::Int(2)));
    assert_eq!(updated.get("deleted_at"), Some(&Value::Null));

    // Clearing a nullable column binds a typed NULL.
    let with_body = posts
        .update(id_of(&created), Record::new().with("body", "text"))
        .await?;
    assert_eq!(with_body.get("body"), Some(&Value::from("text")));
    let cleared = posts
        .update(id_of(&created), Record::new().with("body", Value::Null))
        .await?;
    assert_eq!(cleared.get("body"), Some(&Value::Null));
    assert_eq!(cleared.get("version"), Some(&Value::Int(4)));
    Ok(())
}

#[sqlx::test(migrations = false)]
async fn test_textual_uuid_keys_find_rows(pool: PgPool) -> OrmResult<()> {
    let posts = post_ops(pool).await?;
    let created = posts.create(new_post("Keyed")).await?;
    let Some(Value::Uuid(id)) = created.get("id").cloned() else {
        panic!("expected a uuid key, got {:?}", created.get("id"));
    };

    let found = posts.find(id.to_string()).await?;
    assert_eq!(found.get("title"), Some(&Value::from("Keyed")));

    let matches = posts
        .find_all(&Record::new().with("id", Value::Array(vec![Value::Text(id.to_string())])))
        .await?;
    assert_eq!(matches.len(), 1);
    Ok(())
}

#[sqlx::test(migrations = false)]
async fn test_stale_version_is_rejected(pool: PgPool) -> OrmResult<()> {
    let posts = post_ops(pool).await?;
    let created = posts.create(new_post("Versioned")).await?;
    posts
        .update(id_of(&created), Record::new().with("views", 5))
        .await?;

    let err = posts
        .update(id_of(&created), Record::new().with("views", 9).with("version", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::OptimisticLockFailed {
            expected: 1,
            actual: 2,
            ..
        }
    ));
    assert_eq!(posts.find(id_of(&created)).await?.get("views"), Some(&Value::Int(5)));
    Ok(())
}

#[sqlx::test(migrations = false)]
async fn test_soft_delete_restore_and_hard_delete(pool: PgPool) -> OrmResult<()> {
    let posts = post_ops(pool).await?;
    let created = posts.create(new_post("Archivable")).await?;
    let id = id_of(&created);

    posts.delete(id.clone()).await?;
    assert!(posts.find(id.clone()).await.unwrap_err().is_not_found());
    let archived = posts.find_including_archived(id.clone()).await?;
    assert!(matches!(archived.get("deleted_at"), Some(Value::Timestamp(_))));
    assert!(posts.delete(id.clone()).await.unwrap_err().is_not_found());

    let restored = posts.restore(id.clone()).await?;
    assert_eq!(restored.get("deleted_at"), Some(&Value::Null));
    assert!(posts.restore(id.clone()).await.unwrap_err().is_not_found());
    assert!(posts.find(id.clone()).await.is_ok());

    posts.hard_delete(id.clone()).await?;
    assert!(posts.find_including_archived(id).await.unwrap_err().is_not_found());
    Ok(())
}

#[sqlx::test(migrations = false)]
async fn test_duplicate_slug_is_a_unique_violation(pool: PgPool) -> OrmResult<()> {
    let posts = post_ops(pool).await?;
    posts.create(new_post("One").with("slug", "same")).await?;

    let err = posts
        .create(new_post("Two").with("slug", "same"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::UniqueViolation { .. }), "got {err:?}");
    assert_eq!(posts.count(&Record::new()).await?, 1);
    Ok(())
}
