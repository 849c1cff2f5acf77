//! Recording mock database for testing
//!
//! Implements [`Database`] and [`Transaction`] without a server. Every statement is
//! recorded together with whether it ran inside a transaction, and commits and
//! rollbacks are counted. Results come from pluggable responder closures.

use async_trait::async_trait;
use resource_orm::{Database, OrmError, OrmResult, Record, Transaction, Value};
use std::sync::{Arc, Mutex};

pub type QueryResponder = Arc<dyn Fn(&str, &[Value]) -> OrmResult<Vec<Record>> + Send + Sync>;
pub type ExecuteResponder = Arc<dyn Fn(&str, &[Value]) -> OrmResult<u64> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub args: Vec<Value>,
    pub in_transaction: bool,
}

#[derive(Debug, Default)]
pub struct MockDatabaseState {
    pub statements: Vec<RecordedStatement>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    /// Transactions dropped without commit or rollback
    pub dropped: usize,
}

#[derive(Clone)]
pub struct MockDatabase {
    state: Arc<Mutex<MockDatabaseState>>,
    on_query: QueryResponder,
    on_execute: ExecuteResponder,
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDatabase {
    /// Queries return no rows; executes report one affected row.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockDatabaseState::default())),
            on_query: Arc::new(|_, _| Ok(Vec::new())),
            on_execute: Arc::new(|_, _| Ok(1)),
        }
    }

    pub fn with_query_responder<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> OrmResult<Vec<Record>> + Send + Sync + 'static,
    {
        self.on_query = Arc::new(f);
        self
    }

    pub fn with_execute_responder<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> OrmResult<u64> + Send + Sync + 'static,
    {
        self.on_execute = Arc::new(f);
        self
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    /// Recorded statements whose SQL starts with `prefix`
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<RecordedStatement> {
        self.statements()
            .into_iter()
            .filter(|s| s.sql.starts_with(prefix))
            .collect()
    }

    pub fn begins(&self) -> usize {
        self.state.lock().unwrap().begins
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    pub fn dropped(&self) -> usize {
        self.state.lock().unwrap().dropped
    }

    fn record(&self, sql: &str, args: &[Value], in_transaction: bool) {
        self.state.lock().unwrap().statements.push(RecordedStatement {
            sql: sql.to_string(),
            args: args.to_vec(),
            in_transaction,
        });
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Record>> {
        self.record(sql, args, false);
        (self.on_query)(sql, args)
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        self.record(sql, args, false);
        (self.on_execute)(sql, args)
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        self.state.lock().unwrap().begins += 1;
        Ok(Box::new(MockTransaction {
            db: self.clone(),
            finished: false,
        }))
    }
}

pub struct MockTransaction {
    db: MockDatabase,
    finished: bool,
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Record>> {
        self.db.record(sql, args, true);
        (self.db.on_query)(sql, args)
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        self.db.record(sql, args, true);
        (self.db.on_execute)(sql, args)
    }

    async fn commit(&mut self) -> OrmResult<()> {
        if self.finished {
            return Err(OrmError::Database("transaction already finished".to_string()));
        }
        self.finished = true;
        self.db.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        if self.finished {
            return Err(OrmError::Database("transaction already finished".to_string()));
        }
        self.finished = true;
        self.db.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

impl Drop for MockTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Ok(mut state) = self.db.state.lock() {
                state.dropped += 1;
            }
        }
    }
}

/// Build the row an `INSERT ... (cols) VALUES ($1, ...)` statement would store.
///
/// Only understands single-row inserts rendered by the operations engine.
pub fn echo_insert(sql: &str, args: &[Value]) -> Record {
    let columns = sql
        .split_once(" (")
        .and_then(|(_, rest)| rest.split_once(") VALUES"))
        .map(|(cols, _)| cols)
        .unwrap_or_default();
    columns
        .split(", ")
        .map(|c| c.trim_matches('"').to_string())
        .zip(args.iter().cloned())
        .collect()
}
