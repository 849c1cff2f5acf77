use crate::constants::hooks;
use crate::error::OrmResult;
use crate::schema::ResourceSchema;
use crate::value::Record;
use async_trait::async_trait;
use std::fmt;

/// The mutation a validator is asked to check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Named lifecycle points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeSave,
    AfterSave,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeCreate => hooks::BEFORE_CREATE,
            HookKind::AfterCreate => hooks::AFTER_CREATE,
            HookKind::BeforeUpdate => hooks::BEFORE_UPDATE,
            HookKind::AfterUpdate => hooks::AFTER_UPDATE,
            HookKind::BeforeDelete => hooks::BEFORE_DELETE,
            HookKind::AfterDelete => hooks::AFTER_DELETE,
            HookKind::BeforeSave => hooks::BEFORE_SAVE,
            HookKind::AfterSave => hooks::AFTER_SAVE,
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks a fully auto-populated record before it is written.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        schema: &ResourceSchema,
        record: &Record,
        operation: OperationKind,
    ) -> OrmResult<()>;
}

/// Runs the hooks registered for a lifecycle point. Hooks may modify the record.
#[async_trait]
pub trait HookExecutor: Send + Sync {
    async fn execute_hooks(
        &self,
        schema: &ResourceSchema,
        hook: HookKind,
        record: &mut Record,
    ) -> OrmResult<()>;
}
