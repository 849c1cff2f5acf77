use super::change_tracker::ChangeTracker;
use super::traits::{HookKind, OperationKind};
use super::{auto_fields, sql, Operations};
use crate::constants::columns;
use crate::database::Transaction;
use crate::error::{OrmError, OrmResult};
use crate::logging::log_query;
use crate::value::{Record, Value};
use chrono::Utc;
use tracing::{debug, instrument};

impl Operations {
    /// Apply `changes` to the row with primary key `id` and return the stored row.
    ///
    /// On versioned resources a `version` in `changes` must equal the stored version;
    /// the write itself is guarded on the version that was loaded, so a concurrent
    /// writer surfaces as [`OrmError::OptimisticLockFailed`].
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn update(&self, id: impl Into<Value>, changes: Record) -> OrmResult<Record> {
        let (record, _) = self.update_with_changes(id, changes).await?;
        Ok(record)
    }

    /// Like [`Operations::update`], also returning what changed.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn update_with_changes(
        &self,
        id: impl Into<Value>,
        changes: Record,
    ) -> OrmResult<(Record, ChangeTracker)> {
        let id = id.into();
        let mut tx = self.begin().await?;
        let result = self.update_in_tx(tx.as_mut(), &id, changes).await;
        self.finish("update", tx, result).await
    }

    async fn update_in_tx(
        &self,
        tx: &mut dyn Transaction,
        id: &Value,
        changes: Record,
    ) -> OrmResult<(Record, ChangeTracker)> {
        sql::check_declared(&self.schema, &changes)?;

        let lookup = Record::new().with(self.schema.primary_key_name(), id.clone());
        let load = sql::select(&self.schema, &lookup, false, Some(1))?;
        log_query(&self.schema.name, &load.sql, load.args.len());
        let existing = tx
            .query(&load.sql, &load.args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found(&self.schema.name))?;

        let stored_version = if self.schema.has_version() {
            existing.get(columns::VERSION).and_then(Value::as_i64)
        } else {
            None
        };
        if let (Some(stored), Some(supplied)) = (
            stored_version,
            changes.get(columns::VERSION).filter(|v| !v.is_null()),
        ) {
            let supplied = supplied.as_i64().ok_or_else(|| OrmError::InvalidCondition {
                field: columns::VERSION.to_string(),
                reason: format!("expected an integer, got {}", supplied.type_name()),
            })?;
            if supplied != stored {
                return Err(OrmError::OptimisticLockFailed {
                    resource: self.schema.name.clone(),
                    expected: supplied,
                    actual: stored,
                });
            }
        }

        let mut merged = existing.clone();
        merged.merge(&changes);
        if let Some(stored) = stored_version {
            merged.insert(columns::VERSION, stored);
        }
        let tracker = ChangeTracker::new(existing, merged.clone());

        auto_fields::populate_on_update(&self.schema, &mut merged, Utc::now());
        self.run_hook(HookKind::BeforeUpdate, &mut merged).await?;
        self.run_hook(HookKind::BeforeSave, &mut merged).await?;
        sql::check_declared(&self.schema, &merged)?;
        self.run_validation(&merged, OperationKind::Update).await?;

        // Only columns whose value differs from the loaded row are written.
        let assignments: Record = merged
            .iter()
            .filter(|(field, value)| tracker.previous_value(field) != Some(*value))
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect();
        debug!(columns = assignments.len(), "Writing changed columns");

        let statement = sql::update_by_key(&self.schema, id, &assignments, stored_version);
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        let rows = tx.query(&statement.sql, &statement.args).await?;

        let Some(mut updated) = rows.into_iter().next() else {
            return Err(match stored_version {
                Some(expected) => self.lock_failure(tx, id, expected).await,
                None => OrmError::not_found(&self.schema.name),
            });
        };

        self.run_hook(HookKind::AfterUpdate, &mut updated).await?;
        self.run_hook(HookKind::AfterSave, &mut updated).await?;
        Ok((updated, tracker))
    }

    /// Build the error for a guarded update that matched no row.
    async fn lock_failure(&self, tx: &mut dyn Transaction, id: &Value, expected: i64) -> OrmError {
        let statement = sql::select_version(&self.schema, id);
        let current = match tx.query(&statement.sql, &statement.args).await {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get(columns::VERSION))
                .and_then(Value::as_i64),
            Err(e) => {
                debug!(error = %e, "Could not read current version after conflict");
                None
            }
        };
        match current {
            Some(actual) => OrmError::OptimisticLockFailed {
                resource: self.schema.name.clone(),
                expected,
                actual,
            },
            None => OrmError::not_found(&self.schema.name),
        }
    }
}
