use super::{Database, Transaction};
use crate::config::DatabaseConfig;
use crate::error::{OrmError, OrmResult};
use crate::value::{Record, Value};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::{BigDecimal, Json};
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use std::time::Duration;
use tracing::{debug, info};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";

/// sqlx-backed PostgreSQL database handle
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(translate_sqlx_error)?;

        info!(
            max_connections = config.max_connections,
            "Connected PostgreSQL pool"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Record>> {
        debug!(sql, args = args.len(), "query");
        let rows = bind_all(sqlx::query(sql), args)
            .fetch_all(&self.pool)
            .await
            .map_err(translate_sqlx_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        debug!(sql, args = args.len(), "execute");
        let result = bind_all(sqlx::query(sql), args)
            .execute(&self.pool)
            .await
            .map_err(translate_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.map_err(translate_sqlx_error)?;
        Ok(Box::new(PgTransaction { inner: Some(tx) }))
    }
}

/// An open sqlx transaction. Dropping it without commit rolls back.
pub struct PgTransaction {
    inner: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgTransaction {
    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| OrmError::Database("transaction already finished".to_string()))
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Record>> {
        debug!(sql, args = args.len(), "query in transaction");
        let tx = self.active()?;
        let rows = bind_all(sqlx::query(sql), args)
            .fetch_all(&mut **tx)
            .await
            .map_err(translate_sqlx_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        debug!(sql, args = args.len(), "execute in transaction");
        let tx = self.active()?;
        let result = bind_all(sqlx::query(sql), args)
            .execute(&mut **tx)
            .await
            .map_err(translate_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> OrmResult<()> {
        match self.inner.take() {
            Some(tx) => tx.commit().await.map_err(translate_sqlx_error),
            None => Err(OrmError::Database("transaction already finished".to_string())),
        }
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        match self.inner.take() {
            Some(tx) => tx.rollback().await.map_err(translate_sqlx_error),
            None => Ok(()),
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = bind_value(query, arg);
    }
    query
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Uuid(u) => query.bind(*u),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Json(j) => query.bind(Json(j)),
        Value::Array(items) => bind_array(query, items),
    }
}

/// Homogeneous text/int arrays bind as PostgreSQL arrays; anything else as JSON.
fn bind_array<'q>(
    query: Query<'q, Postgres, PgArguments>,
    items: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    if let Some(texts) = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
    {
        return query.bind(texts);
    }
    if let Some(ints) = items
        .iter()
        .map(|v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
    {
        return query.bind(ints);
    }
    let json = serde_json::to_value(items).unwrap_or(serde_json::Value::Null);
    query.bind(Json(json))
}

fn decode_row(row: &PgRow) -> OrmResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = decode_column(row, idx, column.type_info().name())
            .map_err(translate_sqlx_error)?;
        record.insert(column.name(), value);
    }
    Ok(record)
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.into(),
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(i64::from).into(),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(i64::from).into(),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.into(),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(f64::from).into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.into(),
        "NUMERIC" => row
            .try_get::<Option<BigDecimal>, _>(idx)?
            .map(|d| {
                let text = d.to_string();
                text.parse::<f64>().map_or(Value::Text(text), Value::Float)
            })
            .unwrap_or(Value::Null),
        "UUID" => row.try_get::<Option<uuid::Uuid>, _>(idx)?.into(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)?
            .into(),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)?
            .map(|ts| ts.and_utc())
            .into(),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)?
            .map(|d| Value::Text(d.to_string()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(idx)?
            .map(Value::Json)
            .unwrap_or(Value::Null),
        "TEXT[]" | "VARCHAR[]" => row.try_get::<Option<Vec<String>>, _>(idx)?.into(),
        "INT8[]" => row.try_get::<Option<Vec<i64>>, _>(idx)?.into(),
        "INT4[]" => row
            .try_get::<Option<Vec<i32>>, _>(idx)?
            .map(|v| v.into_iter().map(i64::from).collect::<Vec<_>>())
            .into(),
        _ => row.try_get::<Option<String>, _>(idx)?.into(),
    };
    Ok(value)
}

/// Translate a driver error into the ORM taxonomy by SQLSTATE.
///
/// This is the only place driver error codes are inspected.
pub fn translate_sqlx_error(error: sqlx::Error) -> OrmError {
    match &error {
        sqlx::Error::RowNotFound => OrmError::not_found("row"),
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => OrmError::UniqueViolation { constraint, message },
                Some(FOREIGN_KEY_VIOLATION) => {
                    OrmError::ForeignKeyViolation { constraint, message }
                }
                Some(CHECK_VIOLATION) => OrmError::CheckViolation { constraint, message },
                Some(NOT_NULL_VIOLATION) => OrmError::NotNullViolation {
                    column: db_err
                        .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                        .and_then(|pg| pg.column())
                        .unwrap_or_default()
                        .to_string(),
                    message,
                },
                _ => OrmError::Database(error.to_string()),
            }
        }
        _ => OrmError::Database(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(translate_sqlx_error(sqlx::Error::RowNotFound).is_not_found());
    }

    #[test]
    fn test_other_errors_map_to_database() {
        let err = translate_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, OrmError::Database(_)));
    }
}
