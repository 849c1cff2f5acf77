//! Values the engine fills in on behalf of the caller.

use crate::constants::columns;
use crate::schema::field::{Annotation, BaseType};
use crate::schema::ResourceSchema;
use crate::value::{Record, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Populate generated fields for an insert.
///
/// A caller-supplied primary key is never replaced. Integer keys are left to the
/// database sequence.
pub fn populate_on_create(schema: &ResourceSchema, record: &mut Record, now: DateTime<Utc>) {
    if let Some(pk) = schema.primary_key() {
        if pk.is_auto() && !record.has_value(&pk.name) {
            match pk.base_type() {
                Some(BaseType::Uuid) => {
                    record.insert(pk.name.clone(), Uuid::new_v4());
                }
                Some(BaseType::String | BaseType::Text) => {
                    record.insert(pk.name.clone(), Uuid::new_v4().to_string());
                }
                _ => {}
            }
        }
    }

    for column in [columns::CREATED_AT, columns::UPDATED_AT] {
        if schema.has_field(column) && !record.has_value(column) {
            record.insert(column, now);
        }
    }

    for field in schema.fields.values() {
        let temporal = field.base_type().is_some_and(|t| t.is_temporal());
        if temporal && !field.is_primary() && field.is_auto() && !record.has_value(&field.name) {
            record.insert(field.name.clone(), now);
        }
    }

    if schema.has_version() && !record.has_value(columns::VERSION) {
        record.insert(columns::VERSION, 1_i64);
    }
}

/// Refresh timestamps for an update. `updated_at` is always overwritten.
pub fn populate_on_update(schema: &ResourceSchema, record: &mut Record, now: DateTime<Utc>) {
    if schema.has_field(columns::UPDATED_AT) {
        record.insert(columns::UPDATED_AT, now);
    }
    for field in schema.fields.values() {
        let temporal = field.base_type().is_some_and(|t| t.is_temporal());
        if temporal && field.has_annotation(Annotation::AutoUpdate) {
            record.insert(field.name.clone(), Value::Timestamp(now));
        }
    }
}
