//! Statement assembly for the CRUD pipelines.
//!
//! Every identifier is quoted and every value is bound. Column lists follow the
//! sorted field order of [`Record`] and [`ResourceSchema::column_names`], so a given
//! input always renders the same text.

use crate::constants::columns;
use crate::error::{OrmError, OrmResult};
use crate::identifiers::{quote_identifier, quote_list};
use crate::query_builder::ParamList;
use crate::schema::ResourceSchema;
use crate::value::{Record, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: ParamList) -> Self {
        Self {
            sql,
            args: params.into_args(),
        }
    }
}

/// Reject any key that is not a declared column.
pub(crate) fn check_declared(schema: &ResourceSchema, record: &Record) -> OrmResult<()> {
    record
        .fields()
        .try_for_each(|field| schema.check_filterable(field))
}

pub(crate) fn table(schema: &ResourceSchema) -> String {
    quote_identifier(&schema.table_name)
}

pub(crate) fn returning(schema: &ResourceSchema) -> String {
    quote_list(&schema.column_names())
}

/// Bind `value` for the column `field`.
///
/// Textual uuids and timestamps become typed values first. NULL and date text
/// carry an explicit cast, since PostgreSQL would otherwise infer `text`.
fn bind_column(schema: &ResourceSchema, field: &str, value: &Value, params: &mut ParamList) -> String {
    let Some(field_type) = schema.get_field(field).map(|f| &f.field_type) else {
        return params.push(value.clone());
    };
    let value = field_type.coerce(value.clone());
    match field_type.placeholder_cast(&value) {
        Some(sql_type) => format!("{}::{sql_type}", params.push(value)),
        None => params.push(value),
    }
}

fn bind_key(schema: &ResourceSchema, key: &Value, params: &mut ParamList) -> String {
    bind_column(schema, schema.primary_key_name(), key, params)
}

fn equality(schema: &ResourceSchema, field: &str, value: &Value, params: &mut ParamList) -> String {
    let column = quote_identifier(field);
    match value {
        Value::Null => format!("{column} IS NULL"),
        Value::Array(values) if values.is_empty() => "FALSE".to_string(),
        Value::Array(values) => {
            let placeholders = values
                .iter()
                .map(|v| bind_column(schema, field, v, params))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{column} IN ({placeholders})")
        }
        other => format!("{column} = {}", bind_column(schema, field, other, params)),
    }
}

/// `WHERE` clause for an equality map, optionally excluding soft-deleted rows.
/// Empty when there is nothing to filter on.
fn where_clause(
    schema: &ResourceSchema,
    conditions: &Record,
    exclude_archived: bool,
    params: &mut ParamList,
) -> OrmResult<String> {
    check_declared(schema, conditions)?;
    let mut parts: Vec<String> = conditions
        .iter()
        .map(|(field, value)| equality(schema, field, value, params))
        .collect();
    if exclude_archived && schema.supports_soft_delete() {
        parts.push(format!("{} IS NULL", quote_identifier(columns::DELETED_AT)));
    }
    if parts.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }
}

pub(crate) fn select(
    schema: &ResourceSchema,
    conditions: &Record,
    include_archived: bool,
    limit: Option<u64>,
) -> OrmResult<Statement> {
    let mut params = ParamList::new();
    let mut sql = format!(
        "SELECT {} FROM {}{}",
        returning(schema),
        table(schema),
        where_clause(schema, conditions, !include_archived, &mut params)?
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(Statement::new(sql, params))
}

pub(crate) fn count(schema: &ResourceSchema, conditions: &Record) -> OrmResult<Statement> {
    let mut params = ParamList::new();
    let sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {}{}",
        table(schema),
        where_clause(schema, conditions, true, &mut params)?
    );
    Ok(Statement::new(sql, params))
}

/// `INSERT INTO ... VALUES (...)`, or `DEFAULT VALUES` for an empty record.
fn insert_prefix(schema: &ResourceSchema, record: &Record, params: &mut ParamList) -> String {
    if record.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table(schema));
    }
    let columns: Vec<&str> = record.fields().collect();
    let placeholders = record
        .iter()
        .map(|(field, value)| bind_column(schema, field, value, params))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        table(schema),
        quote_list(&columns)
    )
}

pub(crate) fn insert(schema: &ResourceSchema, record: &Record) -> Statement {
    let mut params = ParamList::new();
    let sql = format!(
        "{} RETURNING {}",
        insert_prefix(schema, record, &mut params),
        returning(schema)
    );
    Statement::new(sql, params)
}

/// Multi-row insert over a fixed column list; values missing from a record bind NULL.
pub(crate) fn insert_many(schema: &ResourceSchema, columns: &[String], records: &[Record]) -> Statement {
    let mut params = ParamList::new();
    let rows = records
        .iter()
        .map(|record| {
            let placeholders = columns
                .iter()
                .map(|column| {
                    let value = record.get(column).unwrap_or(&Value::Null);
                    bind_column(schema, column, value, &mut params)
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES {rows}",
        table(schema),
        quote_list(columns)
    );
    Statement::new(sql, params)
}

/// Insert-or-update keyed on `conflict_fields`.
///
/// The primary key, `created_at` and the conflict columns themselves are never
/// overwritten, and `version` is incremented on the existing row rather than reset.
/// When nothing else is left to update, the first conflict column is reassigned to
/// itself so `RETURNING` still yields the existing row.
pub(crate) fn upsert(
    schema: &ResourceSchema,
    record: &Record,
    conflict_fields: &[&str],
) -> OrmResult<Statement> {
    let Some(first_conflict) = conflict_fields.first() else {
        return Err(OrmError::InvalidCondition {
            field: schema.primary_key_name().to_string(),
            reason: "upsert requires at least one conflict field".to_string(),
        });
    };
    for field in conflict_fields {
        schema.check_filterable(field)?;
    }

    let mut params = ParamList::new();
    let values_sql = insert_prefix(schema, record, &mut params);

    let primary_key = schema.primary_key_name();
    let mut updates: Vec<String> = record
        .fields()
        .filter(|field| {
            *field != primary_key
                && *field != columns::CREATED_AT
                && *field != columns::VERSION
                && !conflict_fields.contains(field)
        })
        .map(|field| {
            let column = quote_identifier(field);
            format!("{column} = EXCLUDED.{column}")
        })
        .collect();
    if schema.has_version() {
        let version = quote_identifier(columns::VERSION);
        updates.push(format!("{version} = {}.{version} + 1", table(schema)));
    }
    if updates.is_empty() {
        let column = quote_identifier(first_conflict);
        updates.push(format!("{column} = EXCLUDED.{column}"));
    }

    let sql = format!(
        "{values_sql} ON CONFLICT ({}) DO UPDATE SET {} RETURNING *",
        quote_list(conflict_fields),
        updates.join(", ")
    );
    Ok(Statement::new(sql, params))
}

/// Update one row by primary key, guarded by `expected_version` when given.
///
/// The primary key and `version` are never assigned from `values`; `version` is
/// incremented in SQL instead. With nothing else to assign, the primary key is
/// set to itself so the statement still returns the row.
pub(crate) fn update_by_key(
    schema: &ResourceSchema,
    key: &Value,
    values: &Record,
    expected_version: Option<i64>,
) -> Statement {
    let mut params = ParamList::new();
    let primary_key = schema.primary_key_name();
    let mut assignments: Vec<String> = values
        .iter()
        .filter(|(field, _)| *field != primary_key && *field != columns::VERSION)
        .map(|(field, value)| {
            format!("{} = {}", quote_identifier(field), bind_column(schema, field, value, &mut params))
        })
        .collect();
    if schema.has_version() {
        let version = quote_identifier(columns::VERSION);
        assignments.push(format!("{version} = {version} + 1"));
    }
    if assignments.is_empty() {
        let column = quote_identifier(primary_key);
        assignments.push(format!("{column} = {column}"));
    }

    let mut sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        table(schema),
        assignments.join(", "),
        quote_identifier(primary_key),
        bind_key(schema, key, &mut params)
    );
    if let Some(version) = expected_version {
        sql.push_str(&format!(
            " AND {} = {}",
            quote_identifier(columns::VERSION),
            params.push(Value::Int(version))
        ));
    }
    sql.push_str(&format!(" RETURNING {}", returning(schema)));
    Statement::new(sql, params)
}

/// Update every live row matching `conditions`.
pub(crate) fn update_where(
    schema: &ResourceSchema,
    conditions: &Record,
    values: &Record,
) -> OrmResult<Statement> {
    check_declared(schema, values)?;
    let mut params = ParamList::new();
    let primary_key = schema.primary_key_name();
    let mut assignments: Vec<String> = values
        .iter()
        .filter(|(field, _)| *field != primary_key && *field != columns::VERSION)
        .map(|(field, value)| {
            format!("{} = {}", quote_identifier(field), bind_column(schema, field, value, &mut params))
        })
        .collect();
    if schema.has_version() {
        let version = quote_identifier(columns::VERSION);
        assignments.push(format!("{version} = {version} + 1"));
    }
    if assignments.is_empty() {
        return Err(OrmError::InvalidCondition {
            field: primary_key.to_string(),
            reason: "no columns to update".to_string(),
        });
    }

    let sql = format!(
        "UPDATE {} SET {}{}",
        table(schema),
        assignments.join(", "),
        where_clause(schema, conditions, true, &mut params)?
    );
    Ok(Statement::new(sql, params))
}

/// Mark one live row deleted.
pub(crate) fn soft_delete_by_key(schema: &ResourceSchema, key: &Value, now: Value) -> Statement {
    let mut params = ParamList::new();
    let deleted_at = quote_identifier(columns::DELETED_AT);
    let sql = format!(
        "UPDATE {} SET {deleted_at} = {} WHERE {} = {} AND {deleted_at} IS NULL",
        table(schema),
        params.push(now),
        quote_identifier(schema.primary_key_name()),
        bind_key(schema, key, &mut params)
    );
    Statement::new(sql, params)
}

pub(crate) fn hard_delete_by_key(schema: &ResourceSchema, key: &Value) -> Statement {
    let mut params = ParamList::new();
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        table(schema),
        quote_identifier(schema.primary_key_name()),
        bind_key(schema, key, &mut params)
    );
    Statement::new(sql, params)
}

/// Clear `deleted_at` on one archived row.
pub(crate) fn restore_by_key(schema: &ResourceSchema, key: &Value) -> Statement {
    let mut params = ParamList::new();
    let deleted_at = quote_identifier(columns::DELETED_AT);
    let sql = format!(
        "UPDATE {} SET {deleted_at} = NULL WHERE {} = {} AND {deleted_at} IS NOT NULL",
        table(schema),
        quote_identifier(schema.primary_key_name()),
        bind_key(schema, key, &mut params)
    );
    Statement::new(sql, params)
}

/// Soft- or hard-delete every live row matching `conditions`.
pub(crate) fn delete_where(
    schema: &ResourceSchema,
    conditions: &Record,
    now: Value,
) -> OrmResult<Statement> {
    let mut params = ParamList::new();
    let sql = if schema.supports_soft_delete() {
        let assignment = format!(
            "{} = {}",
            quote_identifier(columns::DELETED_AT),
            params.push(now)
        );
        format!(
            "UPDATE {} SET {assignment}{}",
            table(schema),
            where_clause(schema, conditions, true, &mut params)?
        )
    } else {
        format!(
            "DELETE FROM {}{}",
            table(schema),
            where_clause(schema, conditions, false, &mut params)?
        )
    };
    Ok(Statement::new(sql, params))
}

/// Current version of a row, read after a guarded update matched nothing.
pub(crate) fn select_version(schema: &ResourceSchema, key: &Value) -> Statement {
    let mut params = ParamList::new();
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        quote_identifier(columns::VERSION),
        table(schema),
        quote_identifier(schema.primary_key_name()),
        bind_key(schema, key, &mut params)
    );
    Statement::new(sql, params)
}
