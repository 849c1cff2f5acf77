use super::sql::{self, Statement};
use super::traits::HookKind;
use super::Operations;
use crate::database::Transaction;
use crate::error::{OrmError, OrmResult};
use crate::logging::log_query;
use crate::value::{Record, Value};
use tracing::instrument;

impl Operations {
    /// Delete the live row with primary key `id`.
    ///
    /// Resources with a `deleted_at` column are soft-deleted; others are removed.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn delete(&self, id: impl Into<Value>) -> OrmResult<()> {
        let id = id.into();
        let soft = self.schema.supports_soft_delete();
        let mut tx = self.begin().await?;
        let result = self.delete_in_tx(tx.as_mut(), &id, soft).await;
        self.finish("delete", tx, result).await
    }

    /// Physically remove the row, archived or not.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn hard_delete(&self, id: impl Into<Value>) -> OrmResult<()> {
        let id = id.into();
        let mut tx = self.begin().await?;
        let result = self.delete_in_tx(tx.as_mut(), &id, false).await;
        self.finish("hard_delete", tx, result).await
    }

    /// Clear `deleted_at` on an archived row and return it.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn restore(&self, id: impl Into<Value>) -> OrmResult<Record> {
        if !self.schema.supports_soft_delete() {
            return Err(OrmError::SoftDeleteUnsupported {
                resource: self.schema.name.clone(),
            });
        }
        let id = id.into();
        let mut tx = self.begin().await?;
        let result = self.restore_in_tx(tx.as_mut(), &id).await;
        self.finish("restore", tx, result).await
    }

    async fn delete_in_tx(&self, tx: &mut dyn Transaction, id: &Value, soft: bool) -> OrmResult<()> {
        let lookup = Record::new().with(self.schema.primary_key_name(), id.clone());
        // A hard delete may target an archived row.
        let load = sql::select(&self.schema, &lookup, !soft, Some(1))?;
        let mut existing = self
            .fetch_one(tx, load)
            .await?
            .ok_or_else(|| OrmError::not_found(&self.schema.name))?;

        self.run_hook(HookKind::BeforeDelete, &mut existing).await?;

        let statement = if soft {
            sql::soft_delete_by_key(&self.schema, id, Value::now())
        } else {
            sql::hard_delete_by_key(&self.schema, id)
        };
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        if tx.execute(&statement.sql, &statement.args).await? == 0 {
            return Err(OrmError::not_found(&self.schema.name));
        }

        self.run_hook(HookKind::AfterDelete, &mut existing).await?;
        Ok(())
    }

    async fn restore_in_tx(&self, tx: &mut dyn Transaction, id: &Value) -> OrmResult<Record> {
        let statement = sql::restore_by_key(&self.schema, id);
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        if tx.execute(&statement.sql, &statement.args).await? == 0 {
            return Err(OrmError::not_found(&self.schema.name));
        }

        let lookup = Record::new().with(self.schema.primary_key_name(), id.clone());
        let reload = sql::select(&self.schema, &lookup, true, Some(1))?;
        self.fetch_one(tx, reload)
            .await?
            .ok_or_else(|| OrmError::not_found(&self.schema.name))
    }

    pub(super) async fn fetch_one(
        &self,
        tx: &mut dyn Transaction,
        statement: Statement,
    ) -> OrmResult<Option<Record>> {
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        Ok(tx.query(&statement.sql, &statement.args).await?.into_iter().next())
    }
}
