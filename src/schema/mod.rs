//! # Resource Schema Model
//!
//! Immutable description of a resource as produced by the external schema
//! compiler: fields, relationships, scopes and opaque constraint blocks. The query
//! builder and the operations engine only ever read it.
//!
//! Schemas can be assembled in code through the builder methods on
//! [`ResourceSchema`], or deserialized from the compiler's JSON output. Map keys
//! provide the names of fields, relationships and scopes, so the `name` members may
//! be omitted in JSON.
//!
//! ```rust,ignore
//! let posts = ResourceSchema::new("Post")
//!     .field(Field::new("id", FieldType::uuid()).primary().auto())
//!     .field(Field::new("title", FieldType::string()).constrain(Constraint::Min(1.0)))
//!     .field(Field::new("deleted_at", FieldType::timestamp().nullable()));
//! assert_eq!(posts.table_name, "posts");
//! assert!(posts.supports_soft_delete());
//! ```

pub mod field;
pub mod registry;
pub mod relationship;

pub use field::{Annotation, BaseType, Constraint, Field, FieldType, TypeKind};
pub use registry::SchemaRegistry;
pub use relationship::{CascadeAction, Relationship, RelationshipKind};

use crate::constants::columns;
use crate::error::{OrmError, OrmResult};
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed, positional scope argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeArg {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: FieldType,
}

/// A named, reusable query fragment declared on a resource.
///
/// `conditions` maps a field to a mini-language expression such as `"= $status"`
/// or `"> 100"`. `limit` and `offset` hold either a literal count or a `$name`
/// argument reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub args: Vec<ScopeArg>,
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, name: impl Into<String>, arg_type: FieldType) -> Self {
        self.args.push(ScopeArg {
            name: name.into(),
            arg_type,
        });
        self
    }

    pub fn condition(mut self, field: impl Into<String>, expression: impl Into<String>) -> Self {
        self.conditions.insert(field.into(), expression.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: impl ToString) -> Self {
        self.limit = Some(limit.to_string());
        self
    }

    pub fn offset(mut self, offset: impl ToString) -> Self {
        self.offset = Some(offset.to_string());
        self
    }
}

/// A named constraint or invariant block, carried as an opaque expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpression {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ResourceSchemaDef")]
pub struct ResourceSchema {
    pub name: String,
    pub table_name: String,
    pub fields: BTreeMap<String, Field>,
    pub relationships: BTreeMap<String, Relationship>,
    pub scopes: BTreeMap<String, Scope>,
    pub constraints: Vec<NamedExpression>,
    pub invariants: Vec<NamedExpression>,
}

#[derive(Deserialize)]
struct ResourceSchemaDef {
    name: String,
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, Field>,
    #[serde(default)]
    relationships: BTreeMap<String, Relationship>,
    #[serde(default)]
    scopes: BTreeMap<String, Scope>,
    #[serde(default)]
    constraints: Vec<NamedExpression>,
    #[serde(default)]
    invariants: Vec<NamedExpression>,
}

impl From<ResourceSchemaDef> for ResourceSchema {
    fn from(def: ResourceSchemaDef) -> Self {
        fn named<T>(map: BTreeMap<String, T>, set: impl Fn(&mut T, &str)) -> BTreeMap<String, T> {
            map.into_iter()
                .map(|(key, mut item)| {
                    set(&mut item, &key);
                    (key, item)
                })
                .collect()
        }

        let table_name = def
            .table_name
            .unwrap_or_else(|| default_table_name(&def.name));
        Self {
            name: def.name,
            table_name,
            fields: named(def.fields, |f, k| f.name = k.to_string()),
            relationships: named(def.relationships, |r, k| r.name = k.to_string()),
            scopes: named(def.scopes, |s, k| s.name = k.to_string()),
            constraints: def.constraints,
            invariants: def.invariants,
        }
    }
}

/// Pluralized snake-case table name for a resource name, e.g. `BlogPost` → `blog_posts`.
pub fn default_table_name(resource_name: &str) -> String {
    let snake = resource_name.to_snake_case();
    match snake.rsplit_once('_') {
        Some((prefix, last)) => format!("{prefix}_{}", pluralizer::pluralize(last, 2, false)),
        None => pluralizer::pluralize(&snake, 2, false),
    }
}

impl ResourceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table_name: default_table_name(&name),
            name,
            fields: BTreeMap::new(),
            relationships: BTreeMap::new(),
            scopes: BTreeMap::new(),
            constraints: Vec::new(),
            invariants: Vec::new(),
        }
    }

    pub fn with_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scopes.insert(scope.name.clone(), scope);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get_relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn get_scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.get(name)
    }

    /// The field annotated `primary`, falling back to a field named `id`.
    pub fn primary_key(&self) -> Option<&Field> {
        self.fields
            .values()
            .find(|f| f.is_primary())
            .or_else(|| self.fields.get("id"))
    }

    pub fn primary_key_name(&self) -> &str {
        self.primary_key().map_or("id", |f| f.name.as_str())
    }

    /// Every declared column, sorted alphabetically.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn supports_soft_delete(&self) -> bool {
        self.has_field(columns::DELETED_AT)
    }

    pub fn has_version(&self) -> bool {
        self.has_field(columns::VERSION)
    }

    /// Check that `name` is a declared column usable in a filter.
    ///
    /// Relationship accessors are rejected with a dedicated error; a belongs-to
    /// foreign key passes because it is itself a declared field.
    pub fn check_filterable(&self, name: &str) -> OrmResult<()> {
        if self.has_field(name) {
            return Ok(());
        }
        if self.relationships.contains_key(name) {
            return Err(OrmError::RelationshipField {
                resource: self.name.clone(),
                field: name.to_string(),
            });
        }
        Err(OrmError::FieldNotFound {
            resource: self.name.clone(),
            field: name.to_string(),
        })
    }

    pub fn is_filterable(&self, name: &str) -> bool {
        self.check_filterable(name).is_ok()
    }
}
