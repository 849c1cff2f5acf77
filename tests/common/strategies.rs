//! Proptest strategies shared by property-based tests

use proptest::prelude::*;
use resource_orm::Value;

/// Column names declared on the `posts` fixture
pub const POST_COLUMNS: &[&str] = &["status", "views", "title", "slug", "author_id", "body"];

pub fn post_column_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(POST_COLUMNS)
}

/// Scalar values that can be bound as a single argument
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{0,12}".prop_map(Value::Text),
    ]
}

/// Lists for IN / NOT IN, including the empty list
pub fn value_list_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(scalar_value_strategy(), 0..6)
}

/// Arbitrary identifiers, including embedded double quotes
pub fn raw_identifier_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z_\"][a-zA-Z0-9_\" ]{0,20}"
}
