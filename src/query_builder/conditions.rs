use crate::error::{OrmError, OrmResult};
use crate::schema::field::BaseType;
use crate::schema::ResourceSchema;
use crate::value::Value;
use std::fmt;

/// Comparison operators supported in WHERE and HAVING predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    Like,
    ILike,
    IsNull,
    IsNotNull,
    Between,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Between => "BETWEEN",
        }
    }

    /// Operators that never bind a value.
    pub fn is_null_check(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Operators taking a list of values.
    pub fn is_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanOrEqual
                | Operator::LessThan
                | Operator::LessThanOrEqual
        )
    }

    /// Whether a B-tree index on the column can serve this operator.
    pub fn supports_index(&self) -> bool {
        matches!(
            self,
            Operator::Equal | Operator::In | Operator::Between | Operator::IsNull
        ) || self.is_range()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Positional argument accumulator; hands out `$1..$n` in push order.
#[derive(Debug, Clone, Default)]
pub struct ParamList {
    args: Vec<Value>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument and return its placeholder.
    pub fn push(&mut self, value: Value) -> String {
        self.args.push(value);
        format!("${}", self.args.len())
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

/// A single filter: field, operator, value, and whether it joins its predecessor
/// with OR instead of AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    operator: Operator,
    value: Value,
    or: bool,
    cast: Option<&'static str>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            or: false,
            cast: None,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equal, value)
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, Operator::In, Value::Array(values))
    }

    pub fn not_in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, Operator::NotIn, Value::Array(values))
    }

    pub fn between(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::new(
            field,
            Operator::Between,
            Value::Array(vec![low.into(), high.into()]),
        )
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, Value::Null)
    }

    /// The same condition, joined to its predecessor with OR.
    pub fn or(mut self) -> Self {
        self.or = true;
        self
    }

    /// Convert the bound value to the column's representation, so a textual
    /// uuid or timestamp binds as the typed value. Placeholders for date columns
    /// are cast. Pattern and null checks are left alone, as are unknown columns.
    pub fn coerce_for(mut self, schema: &ResourceSchema) -> Self {
        if matches!(self.operator, Operator::Like | Operator::ILike) || self.operator.is_null_check() {
            return self;
        }
        let Some(field_type) = schema.get_field(&self.field).map(|f| &f.field_type) else {
            return self;
        };
        let value = std::mem::replace(&mut self.value, Value::Null);
        self.value = field_type.coerce(value);
        if field_type.base() == Some(BaseType::Date) {
            self.cast = Some(BaseType::Date.sql_type());
        }
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_or(&self) -> bool {
        self.or
    }

    fn bind(&self, value: &Value, params: &mut ParamList) -> String {
        let placeholder = params.push(value.clone());
        match self.cast {
            Some(sql_type) => format!("{placeholder}::{sql_type}"),
            None => placeholder,
        }
    }

    /// Number of values an IN/NOT IN list carries; zero for other operators.
    pub fn list_len(&self) -> usize {
        if self.operator.is_list() {
            self.value.as_array().map_or(0, <[Value]>::len)
        } else {
            0
        }
    }

    /// Check the value shape against the operator.
    pub fn validate(&self) -> OrmResult<()> {
        let invalid = |reason: String| OrmError::InvalidCondition {
            field: self.field.clone(),
            reason,
        };
        match self.operator {
            Operator::Between => match self.value.as_array() {
                Some(values) if values.len() == 2 => Ok(()),
                Some(values) => Err(invalid(format!(
                    "BETWEEN requires exactly 2 values, got {}",
                    values.len()
                ))),
                None => Err(invalid("BETWEEN requires a two-element list".to_string())),
            },
            Operator::In | Operator::NotIn => {
                if self.value.as_array().is_some() {
                    Ok(())
                } else {
                    Err(invalid(format!(
                        "{} requires a list of values, got {}",
                        self.operator,
                        self.value.type_name()
                    )))
                }
            }
            _ => Ok(()),
        }
    }

    /// Render as a parameterized fragment, appending bound values to `params`.
    ///
    /// An empty IN list renders `FALSE` and an empty NOT IN list renders `TRUE`,
    /// neither consuming a placeholder.
    pub fn to_sql(&self, params: &mut ParamList) -> OrmResult<String> {
        self.validate()?;
        let field = &self.field;
        let sql = match self.operator {
            Operator::IsNull | Operator::IsNotNull => format!("{field} {}", self.operator),
            Operator::In | Operator::NotIn => {
                let values = self.value.as_array().unwrap_or_default();
                if values.is_empty() {
                    let literal = if self.operator == Operator::In {
                        "FALSE"
                    } else {
                        "TRUE"
                    };
                    literal.to_string()
                } else {
                    let placeholders = values
                        .iter()
                        .map(|v| self.bind(v, params))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{field} {} ({placeholders})", self.operator)
                }
            }
            Operator::Between => {
                let values = self.value.as_array().unwrap_or_default();
                let low = self.bind(&values[0], params);
                let high = self.bind(&values[1], params);
                format!("{field} BETWEEN {low} AND {high}")
            }
            _ => {
                let placeholder = self.bind(&self.value, params);
                format!("{field} {} {placeholder}", self.operator)
            }
        };
        Ok(sql)
    }
}

/// A node of the predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition(Condition),
    Group(PredicateGroup),
}

impl Predicate {
    pub fn is_or(&self) -> bool {
        match self {
            Predicate::Condition(c) => c.is_or(),
            Predicate::Group(g) => g.is_or(),
        }
    }

    pub fn coerce_for(self, schema: &ResourceSchema) -> Self {
        match self {
            Predicate::Condition(c) => Predicate::Condition(c.coerce_for(schema)),
            Predicate::Group(g) => Predicate::Group(g.coerce_for(schema)),
        }
    }

    pub fn to_sql(&self, params: &mut ParamList) -> OrmResult<String> {
        match self {
            Predicate::Condition(c) => c.to_sql(params),
            Predicate::Group(g) => Ok(format!("({})", g.to_sql(params)?)),
        }
    }

    pub fn validate(&self) -> OrmResult<()> {
        match self {
            Predicate::Condition(c) => c.validate(),
            Predicate::Group(g) => g.validate(),
        }
    }

    /// Every field referenced by this node, depth-first.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Predicate::Condition(c) => vec![c.field()],
            Predicate::Group(g) => g.fields(),
        }
    }
}

impl From<Condition> for Predicate {
    fn from(condition: Condition) -> Self {
        Predicate::Condition(condition)
    }
}

impl From<PredicateGroup> for Predicate {
    fn from(group: PredicateGroup) -> Self {
        Predicate::Group(group)
    }
}

/// Ordered list of conditions and nested groups.
///
/// The group's own `or` flag says how it attaches to its preceding sibling; inside
/// the group, each element attaches with its own flag and the first element's flag
/// is ignored.
///
/// ```rust,ignore
/// // status = $1 AND (views > $2 OR featured = $3)
/// let group = PredicateGroup::new()
///     .and(Condition::new("views", Operator::GreaterThan, 100))
///     .or(Condition::eq("featured", true));
/// builder.where_("status", Operator::Equal, "published")?.where_group(group)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateGroup {
    predicates: Vec<Predicate>,
    or: bool,
}

impl PredicateGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        let mut condition = condition;
        condition.or = false;
        self.predicates.push(Predicate::Condition(condition));
        self
    }

    pub fn or(mut self, condition: Condition) -> Self {
        self.predicates.push(Predicate::Condition(condition.or()));
        self
    }

    pub fn and_group(mut self, mut group: PredicateGroup) -> Self {
        group.or = false;
        self.predicates.push(Predicate::Group(group));
        self
    }

    pub fn or_group(mut self, mut group: PredicateGroup) -> Self {
        group.or = true;
        self.predicates.push(Predicate::Group(group));
        self
    }

    pub(crate) fn joined_with_or(mut self, or: bool) -> Self {
        self.or = or;
        self
    }

    pub fn is_or(&self) -> bool {
        self.or
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.predicates.iter().flat_map(Predicate::fields).collect()
    }

    /// [`Condition::coerce_for`] applied to every nested condition.
    pub fn coerce_for(self, schema: &ResourceSchema) -> Self {
        Self {
            predicates: self
                .predicates
                .into_iter()
                .map(|p| p.coerce_for(schema))
                .collect(),
            or: self.or,
        }
    }

    /// Groups must be non-empty and every condition well-formed.
    pub fn validate(&self) -> OrmResult<()> {
        if self.predicates.is_empty() {
            return Err(OrmError::InvalidCondition {
                field: "(group)".to_string(),
                reason: "predicate group is empty".to_string(),
            });
        }
        self.predicates.iter().try_for_each(Predicate::validate)
    }

    pub fn to_sql(&self, params: &mut ParamList) -> OrmResult<String> {
        render_predicates(&self.predicates, params)
    }
}

/// Join sibling predicates with each element's own combinator.
pub fn render_predicates(predicates: &[Predicate], params: &mut ParamList) -> OrmResult<String> {
    let mut sql = String::new();
    for (index, predicate) in predicates.iter().enumerate() {
        if index > 0 {
            sql.push_str(if predicate.is_or() { " OR " } else { " AND " });
        }
        sql.push_str(&predicate.to_sql(params)?);
    }
    Ok(sql)
}
