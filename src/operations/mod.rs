//! # CRUD Operations
//!
//! Transactional create/read/update/delete pipelines for one resource.
//!
//! Every mutation runs inside a single transaction obtained from the attached
//! [`TransactionManager`], or from the database handle when none is attached. The
//! transaction commits only when every step succeeds; any error rolls it back and
//! is returned to the caller. Hook and validator failures are wrapped with the
//! stage that raised them (see [`OrmError::in_stage`]).
//!
//! ## Pipelines
//!
//! - **create**: auto-populate, `before_create`, `before_save`, validate, insert,
//!   `after_create`, `after_save`
//! - **update**: load, version check, merge, track changes, auto-populate,
//!   `before_update`, `before_save`, validate, versioned update, `after_update`,
//!   `after_save`
//! - **delete**: load, `before_delete`, soft or hard delete, `after_delete`
//!
//! Reads exclude soft-deleted rows unless the `*_including_archived` variant is
//! used.

mod auto_fields;
mod batch;
mod change_tracker;
mod create;
mod delete;
pub mod hooks;
mod read;
pub(crate) mod sql;
pub mod traits;
mod update;

pub use auto_fields::{populate_on_create, populate_on_update};
pub use change_tracker::ChangeTracker;
pub use hooks::{HookFn, HookRegistry};
pub use traits::{HookExecutor, HookKind, OperationKind, Validator};

use crate::constants::hooks::VALIDATION;
use crate::database::{Database, Transaction, TransactionManager};
use crate::error::{OrmError, OrmResult};
use crate::logging::log_operation;
use crate::schema::ResourceSchema;
use crate::value::Record;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// CRUD engine bound to one resource schema
#[derive(Clone)]
pub struct Operations {
    schema: Arc<ResourceSchema>,
    db: Arc<dyn Database>,
    validator: Option<Arc<dyn Validator>>,
    hooks: Option<Arc<dyn HookExecutor>>,
    tx_manager: Option<Arc<dyn TransactionManager>>,
}

impl fmt::Debug for Operations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operations")
            .field("resource", &self.schema.name)
            .field("table", &self.schema.table_name)
            .field("validator", &self.validator.is_some())
            .field("hooks", &self.hooks.is_some())
            .field("tx_manager", &self.tx_manager.is_some())
            .finish()
    }
}

impl Operations {
    pub fn new(schema: Arc<ResourceSchema>, db: Arc<dyn Database>) -> Self {
        Self {
            schema,
            db,
            validator: None,
            hooks: None,
            tx_manager: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HookExecutor>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_transaction_manager(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.tx_manager = Some(manager);
        self
    }

    pub fn schema(&self) -> &Arc<ResourceSchema> {
        &self.schema
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        match &self.tx_manager {
            Some(manager) => manager.begin_tx().await,
            None => self.db.begin().await,
        }
    }

    /// Commit on success, roll back on failure. A failed rollback is logged and the
    /// original error is still returned.
    async fn finish<T>(
        &self,
        operation: &str,
        mut tx: Box<dyn Transaction>,
        result: OrmResult<T>,
    ) -> OrmResult<T> {
        match result {
            Ok(value) => {
                if let Err(e) = tx.commit().await {
                    log_operation(operation, &self.schema.name, "commit_failed", Some(&e.to_string()));
                    return Err(e);
                }
                log_operation(operation, &self.schema.name, "committed", None);
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(
                        operation = %operation,
                        resource = %self.schema.name,
                        error = %rollback_error,
                        "Rollback failed"
                    );
                }
                log_operation(operation, &self.schema.name, "rolled_back", Some(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_hook(&self, hook: HookKind, record: &mut Record) -> OrmResult<()> {
        if let Some(hooks) = &self.hooks {
            hooks
                .execute_hooks(&self.schema, hook, record)
                .await
                .map_err(|e| OrmError::in_stage(hook.as_str(), e))?;
        }
        Ok(())
    }

    async fn run_validation(&self, record: &Record, operation: OperationKind) -> OrmResult<()> {
        if let Some(validator) = &self.validator {
            validator
                .validate(&self.schema, record, operation)
                .await
                .map_err(|e| OrmError::in_stage(VALIDATION, e))?;
        }
        Ok(())
    }
}
