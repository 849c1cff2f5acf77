//! Error types for the resource ORM core.
//!
//! Driver errors are translated into [`OrmError`] exactly once, inside
//! [`crate::database::postgres`]. Everything above the data-access boundary only
//! ever sees this taxonomy.

use thiserror::Error;

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("optimistic lock failed for {resource}: expected version {expected}, found {actual}")]
    OptimisticLockFailed {
        resource: String,
        expected: i64,
        actual: i64,
    },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String, message: String },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String, message: String },

    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String, message: String },

    #[error("not null constraint violated on column {column}")]
    NotNullViolation { column: String, message: String },

    #[error("validation failed: {}", join_field_errors(.errors))]
    ValidationFailed { errors: Vec<FieldError> },

    #[error("field {field} does not exist on resource {resource}")]
    FieldNotFound { resource: String, field: String },

    #[error("{field} is a relationship on resource {resource}, not a column")]
    RelationshipField { resource: String, field: String },

    #[error("relationship {name} does not exist on resource {resource}")]
    RelationshipNotFound { resource: String, name: String },

    #[error("unsafe join: {reason}")]
    UnsafeJoin { reason: String },

    #[error("invalid condition on {field}: {reason}")]
    InvalidCondition { field: String, reason: String },

    #[error("scope {scope} does not exist on resource {resource}")]
    ScopeNotFound { resource: String, scope: String },

    #[error("scope {scope} expects {expected} argument(s), got {actual}")]
    ScopeArgumentCount {
        scope: String,
        expected: usize,
        actual: usize,
    },

    #[error("scope {scope} argument {argument} expects {expected}, got {actual}")]
    ScopeArgumentType {
        scope: String,
        argument: String,
        expected: String,
        actual: String,
    },

    #[error("scope {scope} has an invalid expression: {reason}")]
    InvalidScopeExpression { scope: String, reason: String },

    #[error("resource {resource} does not support soft delete")]
    SoftDeleteUnsupported { resource: String },

    #[error("{stage} hook failed: {source}")]
    HookFailed {
        stage: String,
        #[source]
        source: Box<OrmError>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrmError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        OrmError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        OrmError::ValidationFailed { errors }
    }

    /// Wrap an error with the lifecycle stage that produced it.
    pub fn in_stage(stage: impl Into<String>, source: OrmError) -> Self {
        OrmError::HookFailed {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error beneath any stage wrappers.
    pub fn root_cause(&self) -> &OrmError {
        match self {
            OrmError::HookFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrmError::NotFound { .. })
    }

    pub fn is_optimistic_lock_failure(&self) -> bool {
        matches!(self, OrmError::OptimisticLockFailed { .. })
    }

    /// True for errors raised while constructing a query, before any I/O.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            OrmError::FieldNotFound { .. }
                | OrmError::RelationshipField { .. }
                | OrmError::RelationshipNotFound { .. }
                | OrmError::UnsafeJoin { .. }
                | OrmError::InvalidCondition { .. }
                | OrmError::ScopeNotFound { .. }
                | OrmError::ScopeArgumentCount { .. }
                | OrmError::ScopeArgumentType { .. }
                | OrmError::InvalidScopeExpression { .. }
        )
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(error: serde_json::Error) -> Self {
        OrmError::Serialization(error.to_string())
    }
}

impl From<config::ConfigError> for OrmError {
    fn from(error: config::ConfigError) -> Self {
        OrmError::Configuration(error.to_string())
    }
}

pub type OrmResult<T> = std::result::Result<T, OrmError>;
