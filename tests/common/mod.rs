//! Shared fixtures for integration tests
//!
//! A small blog domain: `Post` (soft-deletable, versioned, uuid key), `User`
//! (integer key) and `Comment`.

#![allow(dead_code)]

pub mod strategies;

use resource_orm::schema::{Annotation, Constraint, Field, FieldType, Relationship, Scope};
use resource_orm::{Database, QueryBuilder, ResourceSchema, SchemaRegistry};
use std::sync::Arc;

pub fn posts_schema() -> ResourceSchema {
    ResourceSchema::new("Post")
        .field(Field::new("id", FieldType::uuid()).primary().auto())
        .field(
            Field::new("title", FieldType::string().with_length(200))
                .constrain(Constraint::Min(1.0)),
        )
        .field(Field::new("body", FieldType::text().nullable()))
        .field(Field::new("status", FieldType::string()).indexed())
        .field(Field::new("views", FieldType::int()).constrain(Constraint::Min(0.0)))
        .field(Field::new("author_id", FieldType::int().nullable()).indexed())
        .field(Field::new("slug", FieldType::string().nullable()).unique())
        .field(Field::new("created_at", FieldType::timestamp()).auto())
        .field(Field::new("updated_at", FieldType::timestamp()).annotate(Annotation::AutoUpdate))
        .field(Field::new("deleted_at", FieldType::timestamp().nullable()))
        .field(Field::new("version", FieldType::int()))
        .relationship(Relationship::belongs_to("author", "User", "author_id"))
        .relationship(Relationship::has_many("comments", "Comment", "post_id"))
        .scope(Scope::new("published").condition("status", "'published'"))
        .scope(
            Scope::new("popular")
                .arg("min_views", FieldType::int())
                .condition("views", ">= $min_views")
                .order_by("views DESC")
                .limit(10),
        )
        .scope(Scope::new("recent").order_by("created_at DESC").limit(5))
        .scope(
            Scope::new("by_status")
                .arg("statuses", FieldType::array_of(FieldType::string()))
                .condition("status", "IN $statuses"),
        )
        .scope(Scope::new("second_page").limit(20).offset(20))
}

pub fn users_schema() -> ResourceSchema {
    ResourceSchema::new("User")
        .field(Field::new("id", FieldType::int()).primary().auto())
        .field(Field::new("email", FieldType::string()).unique())
        .field(Field::new("name", FieldType::string()))
        .field(Field::new("created_at", FieldType::timestamp()))
        .field(Field::new("updated_at", FieldType::timestamp()))
        .relationship(Relationship::has_many("posts", "Post", "author_id"))
}

pub fn comments_schema() -> ResourceSchema {
    ResourceSchema::new("Comment")
        .field(Field::new("id", FieldType::uuid()).primary().auto())
        .field(Field::new("post_id", FieldType::uuid()).indexed())
        .field(Field::new("body", FieldType::text()))
        .relationship(Relationship::belongs_to("post", "Post", "post_id"))
}

pub fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::from_schemas(vec![
        posts_schema(),
        users_schema(),
        comments_schema(),
    ]))
}

/// Query builder over `posts` backed by `db`
pub fn posts_query(db: Arc<dyn Database>) -> QueryBuilder {
    QueryBuilder::new(Arc::new(posts_schema()), registry(), db)
}
