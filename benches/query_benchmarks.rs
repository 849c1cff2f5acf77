use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use resource_orm::schema::{Field, FieldType, Scope};
use resource_orm::{
    Database, Operator, Optimizer, OrmError, OrmResult, QueryBuilder, Record, ResourceSchema,
    SchemaRegistry, Transaction, Value,
};
use std::sync::Arc;

/// Rendering never touches the database.
struct NoDatabase;

#[async_trait]
impl Database for NoDatabase {
    async fn query(&self, _sql: &str, _args: &[Value]) -> OrmResult<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn execute(&self, _sql: &str, _args: &[Value]) -> OrmResult<u64> {
        Ok(0)
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        Err(OrmError::Database("benchmarks do not open transactions".to_string()))
    }
}

fn posts_query() -> QueryBuilder {
    let schema = ResourceSchema::new("Post")
        .field(Field::new("id", FieldType::uuid()).primary().auto())
        .field(Field::new("title", FieldType::string()))
        .field(Field::new("status", FieldType::string()).indexed())
        .field(Field::new("views", FieldType::int()))
        .field(Field::new("created_at", FieldType::timestamp()))
        .scope(
            Scope::new("popular")
                .arg("min_views", FieldType::int())
                .condition("views", ">= $min_views")
                .order_by("views DESC")
                .limit(10),
        );
    let registry = Arc::new(SchemaRegistry::from_schemas(vec![schema.clone()]));
    QueryBuilder::new(Arc::new(schema), registry, Arc::new(NoDatabase))
}

fn benchmark_render_filtered_query(c: &mut Criterion) {
    let mut query = posts_query();
    query
        .where_("status", Operator::Equal, "published")
        .unwrap()
        .where_("views", Operator::GreaterThan, 100)
        .unwrap()
        .where_in("title", vec!["a".into(), "b".into(), "c".into()])
        .unwrap()
        .order_by_desc("created_at")
        .unwrap()
        .paginate(2, 25);

    c.bench_function("render_filtered_query", |b| {
        b.iter(|| black_box(&query).to_sql())
    });
}

fn benchmark_apply_scope(c: &mut Criterion) {
    let base = posts_query();
    c.bench_function("apply_scope", |b| {
        b.iter(|| {
            let mut query = base.clone();
            let rendered = query
                .scope("popular", vec![Value::Int(black_box(500))])
                .and_then(|q| q.to_sql());
            rendered
        })
    });
}

fn benchmark_optimize(c: &mut Criterion) {
    let mut query = posts_query();
    query
        .where_like("title", "%rust%")
        .unwrap()
        .where_("views", Operator::GreaterThan, 10)
        .unwrap()
        .where_("status", Operator::Equal, "published")
        .unwrap();
    let optimizer = Optimizer::default();

    c.bench_function("optimize_and_analyze", |b| {
        b.iter(|| {
            let plan = optimizer.explain(black_box(&query));
            let analysis = optimizer.analyze(black_box(&query));
            (plan, analysis)
        })
    });
}

criterion_group!(
    benches,
    benchmark_render_filtered_query,
    benchmark_apply_scope,
    benchmark_optimize
);
criterion_main!(benches);
