use crate::error::OrmResult;
use crate::schema::ResourceSchema;
use crate::value::Record;
use async_trait::async_trait;

/// External collaborator that populates related records after a query ran.
///
/// The builder calls it from `all()` when includes were requested; without an
/// attached loader, includes are recorded but nothing is loaded.
#[async_trait]
pub trait RelationshipLoader: Send + Sync {
    async fn eager_load(
        &self,
        records: &mut Vec<Record>,
        schema: &ResourceSchema,
        includes: &[String],
    ) -> OrmResult<()>;
}
