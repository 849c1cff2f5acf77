use super::traits::{HookKind, OperationKind};
use super::{auto_fields, sql, Operations};
use crate::database::Transaction;
use crate::error::{OrmError, OrmResult};
use crate::logging::log_query;
use crate::value::Record;
use chrono::Utc;
use tracing::instrument;

impl Operations {
    /// Insert one record and return the stored row.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn create(&self, data: Record) -> OrmResult<Record> {
        let mut tx = self.begin().await?;
        let result = self.create_in_tx(tx.as_mut(), data).await;
        self.finish("create", tx, result).await
    }

    pub(super) async fn create_in_tx(
        &self,
        tx: &mut dyn Transaction,
        mut data: Record,
    ) -> OrmResult<Record> {
        sql::check_declared(&self.schema, &data)?;
        auto_fields::populate_on_create(&self.schema, &mut data, Utc::now());

        self.run_hook(HookKind::BeforeCreate, &mut data).await?;
        self.run_hook(HookKind::BeforeSave, &mut data).await?;
        sql::check_declared(&self.schema, &data)?;
        self.run_validation(&data, OperationKind::Create).await?;

        let statement = sql::insert(&self.schema, &data);
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        let mut created = tx
            .query(&statement.sql, &statement.args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::Database(format!("insert into {} returned no row", self.schema.table_name)))?;

        self.run_hook(HookKind::AfterCreate, &mut created).await?;
        self.run_hook(HookKind::AfterSave, &mut created).await?;
        Ok(created)
    }
}
