use super::traits::{HookExecutor, HookKind};
use crate::error::OrmResult;
use crate::schema::ResourceSchema;
use crate::value::Record;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type HookFn = Arc<dyn Fn(&ResourceSchema, &mut Record) -> OrmResult<()> + Send + Sync>;

/// In-process hook executor.
///
/// Hooks registered for every resource run before resource-specific ones; within
/// each group hooks run in registration order and the first error stops the chain.
#[derive(Default)]
pub struct HookRegistry {
    global: RwLock<HashMap<HookKind, Vec<HookFn>>>,
    per_resource: RwLock<HashMap<(String, HookKind), Vec<HookFn>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for one resource.
    pub fn register<F>(&self, resource: &str, hook: HookKind, f: F)
    where
        F: Fn(&ResourceSchema, &mut Record) -> OrmResult<()> + Send + Sync + 'static,
    {
        self.per_resource
            .write()
            .entry((resource.to_string(), hook))
            .or_default()
            .push(Arc::new(f));
    }

    /// Register a hook that runs for every resource.
    pub fn register_global<F>(&self, hook: HookKind, f: F)
    where
        F: Fn(&ResourceSchema, &mut Record) -> OrmResult<()> + Send + Sync + 'static,
    {
        self.global.write().entry(hook).or_default().push(Arc::new(f));
    }

    pub fn hook_count(&self, resource: &str, hook: HookKind) -> usize {
        let global = self.global.read().get(&hook).map_or(0, Vec::len);
        let scoped = self
            .per_resource
            .read()
            .get(&(resource.to_string(), hook))
            .map_or(0, Vec::len);
        global + scoped
    }

    fn hooks_for(&self, resource: &str, hook: HookKind) -> Vec<HookFn> {
        let mut hooks = self.global.read().get(&hook).cloned().unwrap_or_default();
        if let Some(scoped) = self.per_resource.read().get(&(resource.to_string(), hook)) {
            hooks.extend(scoped.iter().cloned());
        }
        hooks
    }
}

#[async_trait]
impl HookExecutor for HookRegistry {
    async fn execute_hooks(
        &self,
        schema: &ResourceSchema,
        hook: HookKind,
        record: &mut Record,
    ) -> OrmResult<()> {
        for f in self.hooks_for(&schema.name, hook) {
            f(schema, record)?;
        }
        Ok(())
    }
}
