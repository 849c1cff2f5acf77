use super::sql::{self, Statement};
use super::Operations;
use crate::error::{OrmError, OrmResult};
use crate::logging::log_query;
use crate::value::{Record, Value};
use tracing::instrument;

impl Operations {
    /// Fetch a live row by primary key.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn find(&self, id: impl Into<Value>) -> OrmResult<Record> {
        self.find_by_key(id.into(), false).await
    }

    /// Fetch a row by primary key, soft-deleted or not.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn find_including_archived(&self, id: impl Into<Value>) -> OrmResult<Record> {
        self.find_by_key(id.into(), true).await
    }

    /// First live row whose `field` equals `value`.
    #[instrument(skip_all, fields(resource = %self.schema.name, field = %field))]
    pub async fn find_by(&self, field: &str, value: impl Into<Value>) -> OrmResult<Record> {
        let conditions = Record::new().with(field, value);
        let statement = sql::select(&self.schema, &conditions, false, Some(1))?;
        self.scan(statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found(&self.schema.name))
    }

    /// Every live row matching the equality map; conditions are ANDed.
    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn find_all(&self, conditions: &Record) -> OrmResult<Vec<Record>> {
        let statement = sql::select(&self.schema, conditions, false, None)?;
        self.scan(statement).await
    }

    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn find_all_including_archived(&self, conditions: &Record) -> OrmResult<Vec<Record>> {
        let statement = sql::select(&self.schema, conditions, true, None)?;
        self.scan(statement).await
    }

    pub async fn count(&self, conditions: &Record) -> OrmResult<i64> {
        let statement = sql::count(&self.schema, conditions)?;
        let rows = self.scan(statement).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    pub async fn exists(&self, conditions: &Record) -> OrmResult<bool> {
        Ok(self.count(conditions).await? > 0)
    }

    async fn find_by_key(&self, id: Value, include_archived: bool) -> OrmResult<Record> {
        let conditions = Record::new().with(self.schema.primary_key_name(), id);
        let statement = sql::select(&self.schema, &conditions, include_archived, Some(1))?;
        self.scan(statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found(&self.schema.name))
    }

    async fn scan(&self, statement: Statement) -> OrmResult<Vec<Record>> {
        log_query(&self.schema.name, &statement.sql, statement.args.len());
        self.db.query(&statement.sql, &statement.args).await
    }
}
