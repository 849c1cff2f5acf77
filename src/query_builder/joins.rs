use crate::error::{OrmError, OrmResult};
use crate::identifiers::is_bare_identifier;
use crate::schema::SchemaRegistry;
use regex::Regex;
use std::sync::OnceLock;

/// Represents different types of SQL JOINs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

const DOTTED: &str = r"[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*";
const COMPARISON: &str = r"(?:=|!=|<>|<=|>=|<|>)";

static ON_CONDITION: OnceLock<Regex> = OnceLock::new();
static DOTTED_TOKEN: OnceLock<Regex> = OnceLock::new();

fn on_condition_regex() -> &'static Regex {
    ON_CONDITION.get_or_init(|| {
        let comparison = format!(r"{DOTTED}\s*{COMPARISON}\s*{DOTTED}");
        Regex::new(&format!(
            r"(?i)^\s*{comparison}(?:\s+AND\s+{comparison})*\s*$"
        ))
        .expect("join condition pattern is valid")
    })
}

fn dotted_token_regex() -> &'static Regex {
    DOTTED_TOKEN.get_or_init(|| {
        Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)")
            .expect("dotted token pattern is valid")
    })
}

/// A validated JOIN clause.
///
/// Construction rejects anything but a bare table identifier and an ON condition
/// built from `table.column` comparisons chained with AND, so caller-supplied join
/// text cannot smuggle literals like `1=1` or extra statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub on_condition: String,
}

impl Join {
    pub fn new(join_type: JoinType, table: &str, on_condition: &str) -> OrmResult<Self> {
        if !is_bare_identifier(table) {
            return Err(OrmError::UnsafeJoin {
                reason: format!("join target {table:?} is not a bare identifier"),
            });
        }
        if !on_condition_regex().is_match(on_condition) {
            return Err(OrmError::UnsafeJoin {
                reason: format!(
                    "join condition {on_condition:?} must compare table.column operands only"
                ),
            });
        }
        Ok(Self {
            join_type,
            table: table.to_string(),
            on_condition: on_condition.trim().to_string(),
        })
    }

    /// Create an INNER JOIN
    pub fn inner(table: &str, on_condition: &str) -> OrmResult<Self> {
        Self::new(JoinType::Inner, table, on_condition)
    }

    /// Create a LEFT JOIN
    pub fn left(table: &str, on_condition: &str) -> OrmResult<Self> {
        Self::new(JoinType::Left, table, on_condition)
    }

    /// Create a RIGHT JOIN
    pub fn right(table: &str, on_condition: &str) -> OrmResult<Self> {
        Self::new(JoinType::Right, table, on_condition)
    }

    /// `(table, column)` pairs referenced by the ON condition.
    pub fn column_references(&self) -> Vec<(&str, &str)> {
        dotted_token_regex()
            .captures_iter(&self.on_condition)
            .filter_map(|caps| {
                let table = caps.get(1)?.as_str();
                let column = caps.get(2)?.as_str();
                Some((table, column))
            })
            .collect()
    }

    /// Columns of tables known to the registry must be declared fields.
    pub fn check_columns(&self, registry: &SchemaRegistry) -> OrmResult<()> {
        for (table, column) in self.column_references() {
            if let Some(schema) = registry.by_table(table) {
                if !schema.has_field(column) {
                    return Err(OrmError::FieldNotFound {
                        resource: schema.name.clone(),
                        field: column.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        format!(
            "{} {} ON {}",
            self.join_type.to_sql(),
            self.table,
            self.on_condition
        )
    }
}
