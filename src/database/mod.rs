//! # Database Abstraction
//!
//! The seam between the query/CRUD core and a concrete driver. The core only
//! speaks SQL text plus positional [`Value`] arguments and receives [`Record`]s
//! back; it never sees driver types or driver error codes.
//!
//! ## Key Components
//!
//! - [`Database`] - pooled handle used for one-off statements and to begin transactions
//! - [`Transaction`] - a single database transaction
//! - [`TransactionManager`] - optional caller-supplied source of transactions
//! - [`postgres`] - the sqlx/PostgreSQL implementation and the driver error translation
//!
//! Dropping a [`Transaction`] that was neither committed nor rolled back rolls it
//! back, so a cancelled operation future never leaves work half applied.

pub mod postgres;

pub use postgres::{translate_sqlx_error, PgDatabase, PgTransaction};

use crate::error::OrmResult;
use crate::value::{Record, Value};
use async_trait::async_trait;

/// A pooled database handle
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a row-returning statement.
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Record>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64>;

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>>;
}

/// An open transaction. Statements run in the order they are issued.
#[async_trait]
pub trait Transaction: Send {
    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Record>>;

    async fn execute(&mut self, sql: &str, args: &[Value]) -> OrmResult<u64>;

    async fn commit(&mut self) -> OrmResult<()>;

    async fn rollback(&mut self) -> OrmResult<()>;
}

/// Caller-supplied transaction source, preferred over the database handle when
/// attached to an operations engine.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin_tx(&self) -> OrmResult<Box<dyn Transaction>>;
}
