//! # Scope Compiler, Registry and Chain
//!
//! A scope is a named, parameterized query fragment declared on a resource. It is
//! compiled once into a [`CompiledScope`] (conditions stay templated on their
//! `$name` argument references), bound per call into a [`BoundScope`], and applied
//! to a [`QueryBuilder`] either alone or as part of a [`ScopeChain`].
//!
//! ## Condition mini-language
//!
//! Each condition expression is an optional operator followed by an operand:
//!
//! | Expression                 | Meaning                          |
//! |----------------------------|----------------------------------|
//! | `= $status`, `$status`     | equality against an argument     |
//! | `> 100`, `<= 2.5`          | range comparison with a literal  |
//! | `IN ('a', 'b')`, `IN $ids` | list membership                  |
//! | `BETWEEN $from AND $to`    | inclusive range                  |
//! | `LIKE 'post-%'`            | pattern match (`ILIKE` too)      |
//! | `IS NULL`, `IS NOT NULL`   | null checks                      |
//!
//! Literals are `'quoted'` strings, integers, floats, `true`/`false`, `null`, or a
//! bare word taken as a string. `NOT LIKE` is not supported.

use super::builder::{OrderBy, QueryBuilder, SortDirection};
use super::conditions::{Condition, Operator};
use crate::error::{OrmError, OrmResult};
use crate::schema::{BaseType, ResourceSchema, Scope, ScopeArg};
use crate::value::Value;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Operator prefixes, longest first so `IS NOT NULL` wins over `IS NULL` and
/// `>=` over `>`.
const OPERATOR_PREFIXES: &[(&str, Option<Operator>)] = &[
    ("IS NOT NULL", Some(Operator::IsNotNull)),
    ("IS NULL", Some(Operator::IsNull)),
    ("NOT LIKE", None),
    ("NOT IN", Some(Operator::NotIn)),
    ("BETWEEN", Some(Operator::Between)),
    ("ILIKE", Some(Operator::ILike)),
    ("LIKE", Some(Operator::Like)),
    ("IN", Some(Operator::In)),
    (">=", Some(Operator::GreaterThanOrEqual)),
    ("<=", Some(Operator::LessThanOrEqual)),
    ("!=", Some(Operator::NotEqual)),
    ("<>", Some(Operator::NotEqual)),
    ("=", Some(Operator::Equal)),
    (">", Some(Operator::GreaterThan)),
    ("<", Some(Operator::LessThan)),
];

/// Either a `$name` argument reference or a literal
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Arg(String),
    Literal(Value),
}

/// A parsed condition whose operands may still reference arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionTemplate {
    pub field: String,
    pub operator: Operator,
    pub operands: Vec<Operand>,
}

/// Literal LIMIT/OFFSET count or an argument supplying it
#[derive(Debug, Clone, PartialEq)]
pub enum CountSource {
    Literal(u64),
    Arg(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScope {
    pub name: String,
    pub resource: String,
    pub args: Vec<ScopeArg>,
    pub conditions: Vec<ConditionTemplate>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<CountSource>,
    pub offset: Option<CountSource>,
}

/// A scope with its arguments bound and conditions materialized
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundScope {
    pub name: String,
    pub args: BTreeMap<String, Value>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Compile the scope called `name` declared on `schema`.
pub fn compile_named_scope(schema: &ResourceSchema, name: &str) -> OrmResult<CompiledScope> {
    let scope = schema
        .get_scope(name)
        .ok_or_else(|| OrmError::ScopeNotFound {
            resource: schema.name.clone(),
            scope: name.to_string(),
        })?;
    compile_scope(schema, scope)
}

/// Parse a scope's conditions, ordering and paging against the schema.
pub fn compile_scope(schema: &ResourceSchema, scope: &Scope) -> OrmResult<CompiledScope> {
    let invalid = |reason: String| OrmError::InvalidScopeExpression {
        scope: scope.name.clone(),
        reason,
    };

    let mut conditions = Vec::with_capacity(scope.conditions.len());
    for (field, expression) in &scope.conditions {
        schema.check_filterable(field)?;
        let (operator, operands) = parse_expression(expression).map_err(&invalid)?;
        for operand in &operands {
            if let Operand::Arg(arg) = operand {
                if !scope.args.iter().any(|a| &a.name == arg) {
                    return Err(invalid(format!("${arg} is not a declared argument")));
                }
            }
        }
        conditions.push(ConditionTemplate {
            field: field.clone(),
            operator,
            operands,
        });
    }

    let mut order_by = Vec::new();
    if let Some(order) = &scope.order_by {
        for term in order.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let mut parts = term.split_whitespace();
            let field = parts.next().unwrap_or_default();
            let direction = match parts.next() {
                None => SortDirection::Asc,
                Some(dir) => SortDirection::parse(dir)
                    .ok_or_else(|| invalid(format!("unknown sort direction {dir:?}")))?,
            };
            if parts.next().is_some() {
                return Err(invalid(format!("malformed order term {term:?}")));
            }
            schema.check_filterable(field)?;
            order_by.push(OrderBy::new(field, direction));
        }
    }

    let limit = parse_count(scope, scope.limit.as_deref()).map_err(&invalid)?;
    let offset = parse_count(scope, scope.offset.as_deref()).map_err(&invalid)?;

    debug!(scope = %scope.name, resource = %schema.name, "Compiled scope");
    Ok(CompiledScope {
        name: scope.name.clone(),
        resource: schema.name.clone(),
        args: scope.args.clone(),
        conditions,
        order_by,
        limit,
        offset,
    })
}

fn parse_count(scope: &Scope, text: Option<&str>) -> Result<Option<CountSource>, String> {
    let Some(text) = text.map(str::trim) else {
        return Ok(None);
    };
    if let Some(arg) = text.strip_prefix('$') {
        let declared = scope
            .args
            .iter()
            .find(|a| a.name == arg)
            .ok_or_else(|| format!("${arg} is not a declared argument"))?;
        if declared.arg_type.base() != Some(BaseType::Int) {
            return Err(format!("${arg} must be an int to be used as a count"));
        }
        return Ok(Some(CountSource::Arg(arg.to_string())));
    }
    text.parse::<u64>()
        .map(|n| Some(CountSource::Literal(n)))
        .map_err(|_| format!("{text:?} is not a valid count"))
}

/// Split an expression into its operator and operands.
fn parse_expression(expression: &str) -> Result<(Operator, Vec<Operand>), String> {
    let trimmed = expression.trim();
    let upper = trimmed.to_ascii_uppercase();

    for (prefix, operator) in OPERATOR_PREFIXES {
        if !upper.starts_with(prefix) {
            continue;
        }
        let rest = &trimmed[prefix.len()..];
        // word operators must end at a word boundary
        if prefix.chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
            && rest.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            continue;
        }
        let Some(operator) = *operator else {
            return Err(format!("operator {prefix} is not supported"));
        };
        let rest = rest.trim();
        let operands = match operator {
            Operator::IsNull | Operator::IsNotNull => {
                if !rest.is_empty() {
                    return Err(format!("unexpected operand after {prefix}: {rest:?}"));
                }
                Vec::new()
            }
            Operator::In | Operator::NotIn => parse_list(rest)?,
            Operator::Between => {
                let upper_rest = rest.to_ascii_uppercase();
                let split = upper_rest
                    .find(" AND ")
                    .ok_or_else(|| "BETWEEN requires `low AND high`".to_string())?;
                vec![
                    parse_operand(&rest[..split])?,
                    parse_operand(&rest[split + " AND ".len()..])?,
                ]
            }
            _ => vec![parse_operand(rest)?],
        };
        return Ok((operator, operands));
    }

    Ok((Operator::Equal, vec![parse_operand(trimmed)?]))
}

fn parse_list(text: &str) -> Result<Vec<Operand>, String> {
    if text.starts_with('$') {
        return Ok(vec![parse_operand(text)?]);
    }
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| format!("list {text:?} must be parenthesized"))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner.split(',').map(parse_operand).collect()
}

fn parse_operand(text: &str) -> Result<Operand, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("missing operand".to_string());
    }
    if let Some(arg) = text.strip_prefix('$') {
        if arg.is_empty() || !arg.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(format!("invalid argument reference {text:?}"));
        }
        return Ok(Operand::Arg(arg.to_string()));
    }
    if let Some(quoted) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Operand::Literal(Value::Text(quoted.replace("''", "'"))));
    }
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Operand::Literal(Value::Int(i)));
    }
    if let Ok(f) = text.parse::<f64>() {
        return Ok(Operand::Literal(Value::Float(f)));
    }
    let literal = match text.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::Text(text.to_string()),
    };
    Ok(Operand::Literal(literal))
}

impl CompiledScope {
    /// Type-check positional arguments and materialize the scope.
    pub fn bind(&self, args: Vec<Value>) -> OrmResult<BoundScope> {
        if args.len() != self.args.len() {
            return Err(OrmError::ScopeArgumentCount {
                scope: self.name.clone(),
                expected: self.args.len(),
                actual: args.len(),
            });
        }

        let mut bound_args = BTreeMap::new();
        for (declared, value) in self.args.iter().zip(args) {
            if !declared.arg_type.accepts(&value) {
                return Err(OrmError::ScopeArgumentType {
                    scope: self.name.clone(),
                    argument: declared.name.clone(),
                    expected: declared.arg_type.describe(),
                    actual: value.type_name().to_string(),
                });
            }
            bound_args.insert(declared.name.clone(), value);
        }

        let resolve = |operand: &Operand| -> Value {
            match operand {
                Operand::Arg(name) => bound_args.get(name).cloned().unwrap_or(Value::Null),
                Operand::Literal(value) => value.clone(),
            }
        };

        let conditions = self
            .conditions
            .iter()
            .map(|template| {
                let value = match template.operator {
                    Operator::IsNull | Operator::IsNotNull => Value::Null,
                    Operator::In | Operator::NotIn => match template.operands.as_slice() {
                        [single @ Operand::Arg(_)] => match resolve(single) {
                            list @ Value::Array(_) => list,
                            scalar => Value::Array(vec![scalar]),
                        },
                        operands => Value::Array(operands.iter().map(resolve).collect()),
                    },
                    Operator::Between => Value::Array(template.operands.iter().map(resolve).collect()),
                    _ => template
                        .operands
                        .first()
                        .map(resolve)
                        .unwrap_or(Value::Null),
                };
                Condition::new(template.field.clone(), template.operator, value)
            })
            .collect();

        let count = |source: &Option<CountSource>| -> OrmResult<Option<u64>> {
            match source {
                None => Ok(None),
                Some(CountSource::Literal(n)) => Ok(Some(*n)),
                Some(CountSource::Arg(name)) => {
                    let value = bound_args.get(name).cloned().unwrap_or(Value::Null);
                    match value.as_i64().map(u64::try_from) {
                        Some(Ok(n)) => Ok(Some(n)),
                        _ => Err(OrmError::ScopeArgumentType {
                            scope: self.name.clone(),
                            argument: name.clone(),
                            expected: "non-negative int".to_string(),
                            actual: value.to_string(),
                        }),
                    }
                }
            }
        };
        let limit = count(&self.limit)?;
        let offset = count(&self.offset)?;

        Ok(BoundScope {
            name: self.name.clone(),
            args: bound_args,
            conditions,
            order_by: self.order_by.clone(),
            limit,
            offset,
        })
    }
}

/// Ordered list of bound scopes applied together.
///
/// Conditions and ordering concatenate in scope order, the smallest limit wins and
/// offsets add up.
#[derive(Debug, Clone, Default)]
pub struct ScopeChain {
    scopes: Vec<BoundScope>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, scope: BoundScope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn push(&mut self, scope: BoundScope) {
        self.scopes.push(scope);
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Collapse the chain into one equivalent scope.
    pub fn merge(&self) -> BoundScope {
        let mut merged = BoundScope::default();
        let mut names = Vec::with_capacity(self.scopes.len());

        for scope in &self.scopes {
            names.push(scope.name.as_str());
            merged
                .args
                .extend(scope.args.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged.conditions.extend(scope.conditions.iter().cloned());
            merged.order_by.extend(scope.order_by.iter().cloned());
            merged.limit = match (merged.limit, scope.limit) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            merged.offset = match (merged.offset, scope.offset) {
                (Some(a), Some(b)) => Some(a.saturating_add(b)),
                (a, b) => a.or(b),
            };
        }

        merged.name = names.join("+");
        merged
    }

    /// Merge the chain into `builder`; nothing changes if any part is invalid.
    pub fn apply(&self, builder: &mut QueryBuilder) -> OrmResult<()> {
        if self.scopes.is_empty() {
            return Ok(());
        }
        builder.merge_scope(&self.merge())
    }
}

/// Shared cache of compiled scopes keyed by resource and scope name.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    compiled: DashMap<(String, String), Arc<CompiledScope>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled scope for `name`, compiling and caching it on first use.
    pub fn get(&self, schema: &ResourceSchema, name: &str) -> OrmResult<Arc<CompiledScope>> {
        let key = (schema.name.clone(), name.to_string());
        if let Some(compiled) = self.compiled.get(&key) {
            return Ok(compiled.clone());
        }
        let compiled = Arc::new(compile_named_scope(schema, name)?);
        self.compiled.insert(key, compiled.clone());
        Ok(compiled)
    }

    pub fn bind(
        &self,
        schema: &ResourceSchema,
        name: &str,
        args: Vec<Value>,
    ) -> OrmResult<BoundScope> {
        self.get(schema, name)?.bind(args)
    }

    /// Compile every scope of `schema` up front; returns how many were compiled.
    pub fn compile_all(&self, schema: &ResourceSchema) -> OrmResult<usize> {
        for name in schema.scopes.keys() {
            self.get(schema, name)?;
        }
        Ok(schema.scopes.len())
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn clear(&self) {
        self.compiled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operators() {
        assert_eq!(
            parse_expression("= $status").unwrap(),
            (Operator::Equal, vec![Operand::Arg("status".into())])
        );
        assert_eq!(
            parse_expression("> 100").unwrap(),
            (Operator::GreaterThan, vec![Operand::Literal(Value::Int(100))])
        );
        assert_eq!(
            parse_expression(">= 2.5").unwrap(),
            (Operator::GreaterThanOrEqual, vec![Operand::Literal(Value::Float(2.5))])
        );
        assert_eq!(parse_expression("IS NOT NULL").unwrap(), (Operator::IsNotNull, vec![]));
        assert_eq!(parse_expression("is null").unwrap(), (Operator::IsNull, vec![]));
    }

    #[test]
    fn test_parse_bare_value_is_equality() {
        assert_eq!(
            parse_expression("published").unwrap(),
            (Operator::Equal, vec![Operand::Literal(Value::from("published"))])
        );
        assert_eq!(
            parse_expression("'it''s'").unwrap(),
            (Operator::Equal, vec![Operand::Literal(Value::from("it's"))])
        );
    }

    #[test]
    fn test_word_operator_needs_boundary() {
        // "Indiana" starts with IN but is a bare value
        assert_eq!(
            parse_expression("Indiana").unwrap(),
            (Operator::Equal, vec![Operand::Literal(Value::from("Indiana"))])
        );
    }

    #[test]
    fn test_parse_lists_and_ranges() {
        let (op, operands) = parse_expression("IN ('a', 'b', 3)").unwrap();
        assert_eq!(op, Operator::In);
        assert_eq!(operands.len(), 3);

        let (op, operands) = parse_expression("BETWEEN $from and $to").unwrap();
        assert_eq!(op, Operator::Between);
        assert_eq!(
            operands,
            vec![Operand::Arg("from".into()), Operand::Arg("to".into())]
        );
    }

    #[test]
    fn test_chained_offsets_saturate() {
        let paged = |name: &str, offset| BoundScope {
            name: name.to_string(),
            offset: Some(offset),
            ..BoundScope::default()
        };
        let merged = ScopeChain::new()
            .with(paged("deep", u64::MAX - 1))
            .with(paged("skip", 10))
            .merge();
        assert_eq!(merged.offset, Some(u64::MAX));
        assert_eq!(merged.name, "deep+skip");
    }

    #[test]
    fn test_not_like_is_rejected() {
        assert!(parse_expression("NOT LIKE '%x'").is_err());
        assert!(parse_expression("IS NULL 3").is_err());
        assert!(parse_expression("BETWEEN 1").is_err());
    }
}
