//! Field descriptors: types, constraints and annotations.

use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primitive column types understood by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    String,
    Text,
    Int,
    Float,
    Decimal,
    Bool,
    Uuid,
    Timestamp,
    Date,
    Json,
}

impl BaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::Text => "text",
            BaseType::Int => "int",
            BaseType::Float => "float",
            BaseType::Decimal => "decimal",
            BaseType::Bool => "bool",
            BaseType::Uuid => "uuid",
            BaseType::Timestamp => "timestamp",
            BaseType::Date => "date",
            BaseType::Json => "json",
        }
    }

    /// Whether a value of this runtime shape can be stored in the column.
    ///
    /// Integers are accepted where floats are expected. Uuid and temporal columns
    /// also accept their textual forms when those parse; see [`BaseType::coerce`].
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (BaseType::String | BaseType::Text, Value::Text(_) | Value::Uuid(_) | Value::Timestamp(_)) => true,
            (BaseType::Int, Value::Int(_)) => true,
            (BaseType::Float | BaseType::Decimal, Value::Float(_) | Value::Int(_)) => true,
            (BaseType::Bool, Value::Bool(_)) => true,
            (BaseType::Uuid, Value::Uuid(_)) => true,
            (BaseType::Uuid, Value::Text(s)) => Uuid::parse_str(s).is_ok(),
            (BaseType::Timestamp | BaseType::Date, Value::Timestamp(_)) => true,
            (BaseType::Timestamp, Value::Text(s)) => parse_timestamp(s).is_some(),
            (BaseType::Date, Value::Text(s)) => NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok(),
            (BaseType::Json, _) => true,
            _ => false,
        }
    }

    /// Convert a textual uuid or timestamp into its typed value, and back to text
    /// for text columns. Anything else, including text that does not parse, is
    /// returned unchanged.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (BaseType::String | BaseType::Text, Value::Uuid(uuid)) => Value::Text(uuid.to_string()),
            (BaseType::String | BaseType::Text, Value::Timestamp(ts)) => {
                Value::Text(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            (BaseType::Uuid, Value::Text(s)) => match Uuid::parse_str(&s) {
                Ok(uuid) => Value::Uuid(uuid),
                Err(_) => Value::Text(s),
            },
            (BaseType::Timestamp, Value::Text(s)) => match parse_timestamp(&s) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(s),
            },
            (_, value) => value,
        }
    }

    /// PostgreSQL type used to cast placeholders bound to this column
    pub fn sql_type(&self) -> &'static str {
        match self {
            BaseType::String | BaseType::Text => "text",
            BaseType::Int => "bigint",
            BaseType::Float => "double precision",
            BaseType::Decimal => "numeric",
            BaseType::Bool => "boolean",
            BaseType::Uuid => "uuid",
            BaseType::Timestamp => "timestamptz",
            BaseType::Date => "date",
            BaseType::Json => "jsonb",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, BaseType::Timestamp | BaseType::Date)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Int | BaseType::Float | BaseType::Decimal)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, BaseType::String | BaseType::Text)
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS[.f]` read as UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|ts| ts.and_utc())
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Primitive(BaseType),
    Array(Box<FieldType>),
    Map {
        key: Box<FieldType>,
        value: Box<FieldType>,
    },
    Enum(Vec<String>),
    Struct(Vec<Field>),
}

/// A full type descriptor: kind plus nullability and size modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    pub kind: TypeKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
}

impl FieldType {
    pub fn primitive(base: BaseType) -> Self {
        Self {
            kind: TypeKind::Primitive(base),
            nullable: false,
            length: None,
            precision: None,
            scale: None,
        }
    }

    pub fn string() -> Self {
        Self::primitive(BaseType::String)
    }

    pub fn text() -> Self {
        Self::primitive(BaseType::Text)
    }

    pub fn int() -> Self {
        Self::primitive(BaseType::Int)
    }

    pub fn float() -> Self {
        Self::primitive(BaseType::Float)
    }

    pub fn bool() -> Self {
        Self::primitive(BaseType::Bool)
    }

    pub fn uuid() -> Self {
        Self::primitive(BaseType::Uuid)
    }

    pub fn timestamp() -> Self {
        Self::primitive(BaseType::Timestamp)
    }

    pub fn json() -> Self {
        Self::primitive(BaseType::Json)
    }

    pub fn array_of(element: FieldType) -> Self {
        Self {
            kind: TypeKind::Array(Box::new(element)),
            ..Self::json()
        }
    }

    pub fn enumeration<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind: TypeKind::Enum(values.into_iter().map(Into::into).collect()),
            ..Self::string()
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn base(&self) -> Option<BaseType> {
        match &self.kind {
            TypeKind::Primitive(base) => Some(*base),
            _ => None,
        }
    }

    /// Human-readable name used in binding and validation errors.
    pub fn describe(&self) -> String {
        let inner = match &self.kind {
            TypeKind::Primitive(base) => base.as_str().to_string(),
            TypeKind::Array(element) => format!("array<{}>", element.describe()),
            TypeKind::Map { key, value } => {
                format!("map<{}, {}>", key.describe(), value.describe())
            }
            TypeKind::Enum(values) => format!("enum({})", values.join("|")),
            TypeKind::Struct(_) => "struct".to_string(),
        };
        if self.nullable {
            format!("{inner}?")
        } else {
            inner
        }
    }

    /// Convert `value` to the representation bound for this column. List values
    /// are converted element-wise so IN filters get the same treatment.
    pub fn coerce(&self, value: Value) -> Value {
        match (&self.kind, value) {
            (TypeKind::Primitive(base), Value::Array(items)) => {
                Value::Array(items.into_iter().map(|item| base.coerce(item)).collect())
            }
            (TypeKind::Primitive(base), value) => base.coerce(value),
            (_, value) => value,
        }
    }

    /// PostgreSQL type of the column
    pub fn sql_type(&self) -> &'static str {
        match &self.kind {
            TypeKind::Primitive(base) => base.sql_type(),
            TypeKind::Enum(_) => "text",
            TypeKind::Array(_) | TypeKind::Map { .. } | TypeKind::Struct(_) => "jsonb",
        }
    }

    /// Cast a placeholder needs when carrying `value` into this column.
    ///
    /// An untyped NULL or date text would otherwise be inferred as `text`.
    pub fn placeholder_cast(&self, value: &Value) -> Option<&'static str> {
        match value {
            Value::Null => Some(self.sql_type()),
            Value::Text(_) if self.base() == Some(BaseType::Date) => Some("date"),
            _ => None,
        }
    }

    /// Type check a runtime value against this descriptor, honouring nullability.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable;
        }
        match &self.kind {
            TypeKind::Primitive(base) => base.accepts(value),
            TypeKind::Array(element) => match value {
                Value::Array(items) => items.iter().all(|item| element.accepts(item)),
                Value::Json(serde_json::Value::Array(_)) => true,
                _ => false,
            },
            TypeKind::Map { .. } | TypeKind::Struct(_) => {
                matches!(value, Value::Json(serde_json::Value::Object(_)))
            }
            TypeKind::Enum(values) => value
                .as_str()
                .is_some_and(|s| values.iter().any(|v| v == s)),
        }
    }
}

/// Value constraints declared on a field.
///
/// `Min`/`Max` bound numeric values, or the character length of textual values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Min(f64),
    Max(f64),
    Pattern(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    Primary,
    Auto,
    AutoUpdate,
    Unique,
    Index,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            constraints: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
        self
    }

    pub fn primary(self) -> Self {
        self.annotate(Annotation::Primary)
    }

    pub fn auto(self) -> Self {
        self.annotate(Annotation::Auto)
    }

    pub fn auto_update(self) -> Self {
        self.annotate(Annotation::AutoUpdate)
    }

    pub fn unique(self) -> Self {
        self.annotate(Annotation::Unique)
    }

    pub fn indexed(self) -> Self {
        self.annotate(Annotation::Index)
    }

    pub fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn has_annotation(&self, annotation: Annotation) -> bool {
        self.annotations.contains(&annotation)
    }

    pub fn is_primary(&self) -> bool {
        self.has_annotation(Annotation::Primary)
    }

    pub fn is_auto(&self) -> bool {
        self.has_annotation(Annotation::Auto)
    }

    pub fn is_nullable(&self) -> bool {
        self.field_type.nullable
    }

    /// Primary keys, unique and indexed columns can be served by an index.
    pub fn is_indexed(&self) -> bool {
        self.is_primary()
            || self.has_annotation(Annotation::Unique)
            || self.has_annotation(Annotation::Index)
    }

    pub fn base_type(&self) -> Option<BaseType> {
        self.field_type.base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_types_accept_null() {
        assert!(FieldType::string().nullable().accepts(&Value::Null));
        assert!(!FieldType::string().accepts(&Value::Null));
    }

    #[test]
    fn test_float_accepts_int() {
        assert!(FieldType::float().accepts(&Value::Int(3)));
        assert!(!FieldType::int().accepts(&Value::Float(3.5)));
    }

    #[test]
    fn test_enum_membership() {
        let status = FieldType::enumeration(["draft", "published"]);
        assert!(status.accepts(&Value::from("draft")));
        assert!(!status.accepts(&Value::from("archived")));
        assert_eq!(status.describe(), "enum(draft|published)");
    }

    #[test]
    fn test_array_elements_are_checked() {
        let tags = FieldType::array_of(FieldType::string());
        assert!(tags.accepts(&Value::from(vec!["a", "b"])));
        assert!(!tags.accepts(&Value::from(vec![1, 2])));
    }

    #[test]
    fn test_textual_uuid_and_timestamp_are_coerced() {
        let id = Uuid::new_v4();
        assert_eq!(
            FieldType::uuid().coerce(Value::Text(id.to_string())),
            Value::Uuid(id)
        );
        assert_eq!(
            FieldType::uuid().coerce(Value::from("not-a-uuid")),
            Value::from("not-a-uuid")
        );

        let coerced = FieldType::timestamp().coerce(Value::from("2024-03-01T12:30:00+02:00"));
        let expected = DateTime::parse_from_rfc3339("2024-03-01T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(coerced, Value::Timestamp(expected));
        assert_eq!(
            FieldType::timestamp().coerce(Value::from("2024-03-01 10:30:00")),
            Value::Timestamp(expected)
        );
    }

    #[test]
    fn test_text_columns_take_typed_strings_back_as_text() {
        let id = Uuid::new_v4();
        assert!(FieldType::string().accepts(&Value::Uuid(id)));
        assert_eq!(FieldType::string().coerce(Value::Uuid(id)), Value::Text(id.to_string()));
        let ts = DateTime::parse_from_rfc3339("2024-03-01T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            FieldType::text().coerce(Value::Timestamp(ts)),
            Value::from("2024-03-01T10:30:00Z")
        );
    }

    #[test]
    fn test_in_lists_are_coerced_element_wise() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let list = Value::Array(vec![Value::Text(a.to_string()), Value::Uuid(b)]);
        assert_eq!(
            FieldType::uuid().coerce(list),
            Value::Array(vec![Value::Uuid(a), Value::Uuid(b)])
        );
    }

    #[test]
    fn test_temporal_text_must_parse() {
        assert!(FieldType::timestamp().accepts(&Value::from("2024-03-01T10:30:00Z")));
        assert!(!FieldType::timestamp().accepts(&Value::from("yesterday")));
        let date = FieldType::primitive(BaseType::Date);
        assert!(date.accepts(&Value::from("2024-03-01")));
        assert!(!date.accepts(&Value::from("03/01/2024")));
    }

    #[test]
    fn test_null_placeholders_are_cast_to_the_column_type() {
        let deleted_at = FieldType::timestamp().nullable();
        assert_eq!(deleted_at.placeholder_cast(&Value::Null), Some("timestamptz"));
        assert_eq!(deleted_at.placeholder_cast(&Value::Timestamp(Utc::now())), None);
        assert_eq!(FieldType::int().placeholder_cast(&Value::Null), Some("bigint"));
        assert_eq!(
            FieldType::array_of(FieldType::string()).placeholder_cast(&Value::Null),
            Some("jsonb")
        );
        let date = FieldType::primitive(BaseType::Date);
        assert_eq!(date.placeholder_cast(&Value::from("2024-03-01")), Some("date"));
        assert_eq!(FieldType::string().placeholder_cast(&Value::from("x")), None);
    }

    #[test]
    fn test_annotations_are_not_duplicated() {
        let field = Field::new("id", FieldType::uuid()).primary().primary().auto();
        assert_eq!(field.annotations, vec![Annotation::Primary, Annotation::Auto]);
        assert!(field.is_indexed());
    }
}
