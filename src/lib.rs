#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Resource ORM Core
//!
//! Runtime query engine and transactional CRUD core for resources declared in a
//! schema definition language.
//!
//! ## Overview
//!
//! A resource declaration (fields, relationships, named scopes) is loaded into a
//! [`ResourceSchema`]. From it the crate builds parameterized SQL through a
//! validating [`QueryBuilder`], compiles and binds named scopes, estimates and
//! analyzes query cost, and runs create/read/update/delete pipelines inside a
//! single database transaction with hooks, validation, optimistic locking and
//! soft delete.
//!
//! ## Module Organization
//!
//! - [`schema`] - Resource, field, relationship and scope descriptors plus the registry
//! - [`query_builder`] - Fluent query construction, joins, pagination and named scopes
//! - [`optimizer`] - Predicate reordering, cost estimation and query analysis
//! - [`operations`] - Transactional CRUD pipelines, hooks and change tracking
//! - [`validation`] - Schema-driven record validation
//! - [`database`] - Database/transaction seam and the PostgreSQL implementation
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resource_orm::{
//!     Field, FieldType, Operations, Operator, OrmConfig, PgDatabase, QueryBuilder, Record,
//!     ResourceSchema, SchemaRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OrmConfig::from_env()?;
//! let db = Arc::new(PgDatabase::connect(&config.database).await?);
//!
//! let posts = Arc::new(
//!     ResourceSchema::new("Post")
//!         .field(Field::new("id", FieldType::uuid()).primary().auto())
//!         .field(Field::new("title", FieldType::string()))
//!         .field(Field::new("status", FieldType::string())),
//! );
//! let registry = Arc::new(SchemaRegistry::from_schemas(vec![posts.as_ref().clone()]));
//!
//! let ops = Operations::new(posts.clone(), db.clone());
//! let created = ops
//!     .create(Record::new().with("title", "Hello").with("status", "published"))
//!     .await?;
//!
//! let mut query = QueryBuilder::new(posts, registry, db);
//! query.where_("status", Operator::Equal, "published")?.order_by_desc("title")?;
//! let published = query.all().await?;
//! println!("created {:?}, {} published", created.get("id"), published.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod identifiers;
pub mod logging;
pub mod operations;
pub mod optimizer;
pub mod query_builder;
pub mod schema;
pub mod validation;
pub mod value;

pub use crate::config::{DatabaseConfig, LogFormat, LoggingConfig, OptimizerConfig, OrmConfig};
pub use database::{Database, PgDatabase, PgTransaction, Transaction, TransactionManager};
pub use error::{FieldError, OrmError, OrmResult};
pub use operations::{
    ChangeTracker, HookExecutor, HookKind, HookRegistry, OperationKind, Operations, Validator,
};
pub use optimizer::{Optimizer, QueryAnalysis, QueryCost, QueryPlan};
pub use query_builder::{
    Condition, Join, JoinType, Operator, Page, Pagination, PredicateGroup, QueryBuilder,
    ScopeRegistry, SortDirection,
};
pub use schema::{
    Annotation, BaseType, Constraint, Field, FieldType, Relationship, RelationshipKind,
    ResourceSchema, SchemaRegistry, Scope,
};
pub use validation::SchemaValidator;
pub use value::{Record, Value};
