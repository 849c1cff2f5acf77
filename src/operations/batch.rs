use super::traits::OperationKind;
use super::{auto_fields, sql, Operations};
use crate::database::Transaction;
use crate::error::{OrmError, OrmResult};
use crate::logging::log_query;
use crate::value::{Record, Value};
use chrono::Utc;
use tracing::{instrument, warn};

impl Operations {
    /// Create every record in one transaction; the first failure rolls back all of them.
    #[instrument(skip_all, fields(resource = %self.schema.name, count = records.len()))]
    pub async fn create_many(&self, records: Vec<Record>) -> OrmResult<Vec<Record>> {
        let mut tx = self.begin().await?;
        let result = self.create_many_in_tx(tx.as_mut(), records).await;
        self.finish("create_many", tx, result).await
    }

    async fn create_many_in_tx(
        &self,
        tx: &mut dyn Transaction,
        records: Vec<Record>,
    ) -> OrmResult<Vec<Record>> {
        let mut created = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match self.create_in_tx(tx, record).await {
                Ok(row) => created.push(row),
                Err(e) => {
                    warn!(index, error = %e, "Batch create aborted");
                    return Err(e);
                }
            }
        }
        Ok(created)
    }

    /// Insert raw rows in a single statement, bypassing hooks and validation.
    ///
    /// The column list is taken from the first record; fields missing from later
    /// records are written as NULL. Returns the number of inserted rows.
    #[instrument(skip_all, fields(resource = %self.schema.name, count = records.len()))]
    pub async fn bulk_insert(&self, records: Vec<Record>) -> OrmResult<u64> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        sql::check_declared(&self.schema, first)?;
        let columns: Vec<String> = first.fields().map(str::to_string).collect();

        let statement = sql::insert_many(&self.schema, &columns, &records);
        let mut tx = self.begin().await?;
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        let result = tx.execute(&statement.sql, &statement.args).await;
        self.finish("bulk_insert", tx, result).await
    }

    /// Insert `data`, or update the existing row that conflicts on `conflict_fields`.
    ///
    /// Generated fields are populated as for a create and the record is validated;
    /// hooks do not run.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn upsert(&self, mut data: Record, conflict_fields: &[&str]) -> OrmResult<Record> {
        sql::check_declared(&self.schema, &data)?;
        auto_fields::populate_on_create(&self.schema, &mut data, Utc::now());
        self.run_validation(&data, OperationKind::Create).await?;
        let statement = sql::upsert(&self.schema, &data, conflict_fields)?;

        let mut tx = self.begin().await?;
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        let result = tx
            .query(&statement.sql, &statement.args)
            .await
            .and_then(|rows| {
                rows.into_iter().next().ok_or_else(|| {
                    OrmError::Database(format!("upsert into {} returned no row", self.schema.table_name))
                })
            });
        self.finish("upsert", tx, result).await
    }

    /// Apply `changes` to every live row matching `conditions`. Returns the affected count.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn update_many(&self, conditions: &Record, mut changes: Record) -> OrmResult<u64> {
        auto_fields::populate_on_update(&self.schema, &mut changes, Utc::now());
        let statement = sql::update_where(&self.schema, conditions, &changes)?;

        let mut tx = self.begin().await?;
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        let result = tx.execute(&statement.sql, &statement.args).await;
        self.finish("update_many", tx, result).await
    }

    /// Delete every live row matching `conditions`, softly when supported.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn delete_many(&self, conditions: &Record) -> OrmResult<u64> {
        let statement = sql::delete_where(&self.schema, conditions, Value::now())?;

        let mut tx = self.begin().await?;
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        let result = tx.execute(&statement.sql, &statement.args).await;
        self.finish("delete_many", tx, result).await
    }
}
