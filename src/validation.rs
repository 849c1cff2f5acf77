//! Record validation against the declared schema
//!
//! [`SchemaValidator`] checks presence, type, length and the `min`/`max`/`pattern`
//! constraints of every declared field and reports all failures at once.

use crate::error::{FieldError, OrmError, OrmResult};
use crate::operations::{OperationKind, Validator};
use crate::schema::field::{Constraint, Field};
use crate::schema::ResourceSchema;
use crate::value::{Record, Value};
use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;

/// Validator driven purely by field declarations.
///
/// Compiled patterns are cached per pattern string.
#[derive(Debug, Default)]
pub struct SchemaValidator {
    patterns: DashMap<String, Regex>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous form of [`Validator::validate`].
    pub fn check(
        &self,
        schema: &ResourceSchema,
        record: &Record,
        operation: OperationKind,
    ) -> OrmResult<()> {
        if operation == OperationKind::Delete {
            return Ok(());
        }

        let mut errors = Vec::new();
        for field in schema.fields.values() {
            match record.get(&field.name) {
                None | Some(Value::Null) => {
                    if let Some(message) = missing_message(field, record, operation) {
                        errors.push(FieldError::new(&field.name, message));
                    }
                }
                Some(value) => self.check_value(field, value, &mut errors),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(OrmError::validation(errors))
        }
    }

    fn check_value(&self, field: &Field, value: &Value, errors: &mut Vec<FieldError>) {
        if !field.field_type.accepts(value) {
            errors.push(FieldError::new(
                &field.name,
                format!(
                    "expected {}, got {}",
                    field.field_type.describe(),
                    value.type_name()
                ),
            ));
            return;
        }

        let text_len = value.as_str().map(|s| s.chars().count());
        if let (Some(max_len), Some(len)) = (field.field_type.length, text_len) {
            if len > max_len as usize {
                errors.push(FieldError::new(
                    &field.name,
                    format!("must be at most {max_len} characters"),
                ));
            }
        }

        // Numeric bounds apply to numbers, and to character length for text.
        let measure = text_len.map(|len| len as f64).or_else(|| value.as_f64());
        for constraint in &field.constraints {
            match constraint {
                Constraint::Min(min) => {
                    if measure.is_some_and(|m| m < *min) {
                        errors.push(FieldError::new(&field.name, bound_message("at least", *min, text_len)));
                    }
                }
                Constraint::Max(max) => {
                    if measure.is_some_and(|m| m > *max) {
                        errors.push(FieldError::new(&field.name, bound_message("at most", *max, text_len)));
                    }
                }
                Constraint::Pattern(pattern) => {
                    let Some(text) = value.as_str() else { continue };
                    match self.matches(pattern, text) {
                        Ok(true) => {}
                        Ok(false) => errors.push(FieldError::new(
                            &field.name,
                            format!("must match pattern {pattern}"),
                        )),
                        Err(e) => errors.push(FieldError::new(
                            &field.name,
                            format!("has an invalid pattern {pattern}: {e}"),
                        )),
                    }
                }
            }
        }
    }

    fn matches(&self, pattern: &str, text: &str) -> Result<bool, regex::Error> {
        if let Some(regex) = self.patterns.get(pattern) {
            return Ok(regex.is_match(text));
        }
        let regex = Regex::new(pattern)?;
        let matched = regex.is_match(text);
        self.patterns.insert(pattern.to_string(), regex);
        Ok(matched)
    }
}

#[async_trait]
impl Validator for SchemaValidator {
    async fn validate(
        &self,
        schema: &ResourceSchema,
        record: &Record,
        operation: OperationKind,
    ) -> OrmResult<()> {
        self.check(schema, record, operation)
    }
}

/// Message for an absent or NULL value, if that is an error.
///
/// Generated fields may be absent on create; an update only rejects an explicit
/// NULL since the stored row supplies everything else.
fn missing_message(field: &Field, record: &Record, operation: OperationKind) -> Option<&'static str> {
    if field.is_nullable() {
        return None;
    }
    match operation {
        OperationKind::Create if field.is_auto() => None,
        OperationKind::Create => Some("is required"),
        _ if record.contains(&field.name) => Some("cannot be null"),
        _ => None,
    }
}

fn bound_message(relation: &str, bound: f64, text_len: Option<usize>) -> String {
    match text_len {
        Some(_) => format!("must be {relation} {bound} characters"),
        None => format!("must be {relation} {bound}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldType;

    fn posts() -> ResourceSchema {
        ResourceSchema::new("Post")
            .field(Field::new("id", FieldType::int()).primary().auto())
            .field(
                Field::new("title", FieldType::string().with_length(20))
                    .constrain(Constraint::Min(3.0)),
            )
            .field(
                Field::new("views", FieldType::int())
                    .constrain(Constraint::Min(0.0))
                    .constrain(Constraint::Max(1_000_000.0)),
            )
            .field(
                Field::new("slug", FieldType::string().nullable())
                    .constrain(Constraint::Pattern("^[a-z0-9-]+$".to_string())),
            )
    }

    fn messages(err: OrmError) -> Vec<String> {
        match err {
            OrmError::ValidationFailed { errors } => errors.iter().map(ToString::to_string).collect(),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let record = Record::new()
            .with("title", "Hello")
            .with("views", 10)
            .with("slug", "hello-world");
        assert!(SchemaValidator::new()
            .check(&posts(), &record, OperationKind::Create)
            .is_ok());
    }

    #[test]
    fn test_reports_every_failure_in_field_order() {
        let record = Record::new()
            .with("title", "Hi")
            .with("views", -1)
            .with("slug", "Not A Slug");
        let err = SchemaValidator::new()
            .check(&posts(), &record, OperationKind::Create)
            .unwrap_err();
        assert_eq!(
            messages(err),
            vec![
                "slug: must match pattern ^[a-z0-9-]+$",
                "title: must be at least 3 characters",
                "views: must be at least 0",
            ]
        );
    }

    #[test]
    fn test_required_on_create_only() {
        let validator = SchemaValidator::new();
        let record = Record::new().with("views", 1);
        let err = validator.check(&posts(), &record, OperationKind::Create).unwrap_err();
        assert_eq!(messages(err), vec!["title: is required"]);

        assert!(validator.check(&posts(), &record, OperationKind::Update).is_ok());

        let nulled = Record::new().with("title", Value::Null);
        let err = validator.check(&posts(), &nulled, OperationKind::Update).unwrap_err();
        assert_eq!(messages(err), vec!["title: cannot be null"]);
    }

    #[test]
    fn test_type_and_length() {
        let record = Record::new()
            .with("title", "a title that is far too long to fit")
            .with("views", "many");
        let err = SchemaValidator::new()
            .check(&posts(), &record, OperationKind::Create)
            .unwrap_err();
        let messages = messages(err);
        assert_eq!(messages[0], "title: must be at most 20 characters");
        assert!(messages[1].starts_with("views: expected int"));
    }
}
