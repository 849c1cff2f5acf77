use super::ResourceSchema;
use std::collections::HashMap;
use std::sync::Arc;

/// Cross-resource lookup by resource name and by table name.
///
/// Built once from the compiler output and shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    by_name: HashMap<String, Arc<ResourceSchema>>,
    by_table: HashMap<String, Arc<ResourceSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schemas(schemas: impl IntoIterator<Item = ResourceSchema>) -> Self {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema);
        }
        registry
    }

    /// Register a schema, replacing any previous schema with the same name.
    pub fn register(&mut self, schema: ResourceSchema) -> Arc<ResourceSchema> {
        let schema = Arc::new(schema);
        if let Some(previous) = self.by_name.insert(schema.name.clone(), schema.clone()) {
            self.by_table.remove(&previous.table_name);
        }
        self.by_table
            .insert(schema.table_name.clone(), schema.clone());
        schema
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceSchema>> {
        self.by_name.get(name).cloned()
    }

    pub fn by_table(&self, table: &str) -> Option<Arc<ResourceSchema>> {
        self.by_table.get(table).cloned()
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.by_table.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Arc<ResourceSchema>> {
        self.by_name.values()
    }
}
