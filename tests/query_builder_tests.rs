//! Query Builder Tests
//!
//! SQL rendering, build-time validation and execution against the recording mock.

mod common;
mod mocks;

use common::posts_query;
use mocks::mock_database::MockDatabase;
use resource_orm::query_builder::RelationshipLoader;
use resource_orm::{
    Condition, Join, Operator, OrmError, OrmResult, PredicateGroup, Record, ResourceSchema,
    SortDirection, Value,
};
use std::sync::{Arc, Mutex};

#[test]
fn posts_scenario_renders_expected_sql_and_args() {
    let db = Arc::new(MockDatabase::new());
    let mut query = posts_query(db);
    query
        .where_("status", Operator::Equal, "published")
        .unwrap()
        .where_("views", Operator::GreaterThan, 100)
        .unwrap()
        .order_by_desc("created_at")
        .unwrap()
        .limit(10);

    let (sql, args) = query.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM posts WHERE status = $1 AND views > $2 ORDER BY created_at DESC LIMIT $3"
    );
    assert_eq!(
        args,
        vec![Value::from("published"), Value::Int(100), Value::Int(10)]
    );
}

#[test]
fn rendering_twice_gives_identical_output() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    query
        .where_in("status", vec!["draft".into(), "published".into()])
        .unwrap()
        .where_between("views", 10, 20)
        .unwrap()
        .paginate(3, 25);

    let first = query.to_sql().unwrap();
    let second = query.to_sql().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.0,
        "SELECT * FROM posts WHERE status IN ($1, $2) AND views BETWEEN $3 AND $4 LIMIT $5 OFFSET $6"
    );
    assert_eq!(first.1[4], Value::Int(25));
    assert_eq!(first.1[5], Value::Int(50));
}

#[test]
fn unknown_field_is_rejected_without_mutation() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    query.where_("status", Operator::Equal, "draft").unwrap();
    let before = query.to_sql().unwrap();

    let err = query
        .where_("no_such_field", Operator::Equal, 1)
        .unwrap_err();
    assert!(matches!(err, OrmError::FieldNotFound { ref field, .. } if field == "no_such_field"));
    assert!(err.is_construction_error());
    assert_eq!(query.to_sql().unwrap(), before);
}

#[test]
fn relationship_name_is_not_a_filterable_field() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    let err = query.where_("author", Operator::Equal, 1).unwrap_err();
    assert!(matches!(err, OrmError::RelationshipField { .. }));

    // the foreign key itself is a declared column
    assert!(query.where_("author_id", Operator::Equal, 1).is_ok());
}

#[test]
fn empty_in_lists_render_constants_without_params() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    query
        .where_in("status", Vec::new())
        .unwrap()
        .where_not_in("slug", Vec::new())
        .unwrap();

    let (sql, args) = query.to_sql().unwrap();
    assert_eq!(sql, "SELECT * FROM posts WHERE FALSE AND TRUE");
    assert!(args.is_empty());
}

#[test]
fn between_requires_two_values() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    let bad = Condition::new("views", Operator::Between, Value::Array(vec![Value::Int(1)]));
    assert!(matches!(
        query.where_condition(bad),
        Err(OrmError::InvalidCondition { .. })
    ));
    assert!(query.conditions().is_empty());
}

#[test]
fn groups_render_in_parentheses_with_their_own_combinator() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    let group = PredicateGroup::new()
        .and(Condition::eq("status", "draft"))
        .or(Condition::is_null("slug"));
    query
        .where_("views", Operator::GreaterThanOrEqual, 5)
        .unwrap()
        .or_where_group(group)
        .unwrap();

    let (sql, args) = query.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM posts WHERE views >= $1 OR (status = $2 OR slug IS NULL)"
    );
    assert_eq!(args.len(), 2);
}

#[test]
fn joins_are_checked_for_safety_and_columns() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    query
        .inner_join("users", "users.id = posts.author_id")
        .unwrap();

    assert!(matches!(
        query.left_join("users", "1=1"),
        Err(OrmError::UnsafeJoin { .. })
    ));
    assert!(matches!(
        query.left_join("users; DROP TABLE posts", "users.id = posts.author_id"),
        Err(OrmError::UnsafeJoin { .. })
    ));
    assert!(matches!(
        query.left_join("users", "users.missing = posts.author_id"),
        Err(OrmError::FieldNotFound { .. })
    ));
    assert_eq!(query.joins().len(), 1);

    let (sql, _) = query.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM posts INNER JOIN users ON users.id = posts.author_id"
    );
}

#[test]
fn join_value_can_be_built_separately() {
    let join = Join::left("comments", "comments.post_id = posts.id").unwrap();
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    query.join(join).unwrap();
    assert!(query.to_sql().unwrap().0.contains("LEFT JOIN comments ON"));
}

#[test]
fn having_allows_aggregate_expressions() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    query
        .group_by(&["status"])
        .unwrap()
        .having("COUNT(*)", Operator::GreaterThan, 5)
        .unwrap();

    let (sql, args) = query.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM posts GROUP BY status HAVING COUNT(*) > $1"
    );
    assert_eq!(args, vec![Value::Int(5)]);

    assert!(query.having("nope", Operator::Equal, 1).is_err());
}

#[test]
fn include_validates_relationship_names() {
    let mut query = posts_query(Arc::new(MockDatabase::new()));
    query.include("comments").unwrap().include("comments").unwrap();
    assert_eq!(query.includes(), &["comments".to_string()]);
    assert!(matches!(
        query.include("tags"),
        Err(OrmError::RelationshipNotFound { .. })
    ));
}

#[test]
fn clones_branch_independently() {
    let mut base = posts_query(Arc::new(MockDatabase::new()));
    base.where_("status", Operator::Equal, "published").unwrap();

    let mut branch = base.clone();
    branch.order_by("views", SortDirection::Desc).unwrap().limit(3);

    assert_eq!(
        base.to_sql().unwrap().0,
        "SELECT * FROM posts WHERE status = $1"
    );
    assert_eq!(
        branch.to_sql().unwrap().0,
        "SELECT * FROM posts WHERE status = $1 ORDER BY views DESC LIMIT $2"
    );
}

#[tokio::test]
async fn aggregates_drop_ordering_and_paging() {
    let db = Arc::new(MockDatabase::new().with_query_responder(|sql, _| {
        let value = if sql.starts_with("SELECT COUNT(*)") {
            Value::Int(42)
        } else {
            Value::Float(12.5)
        };
        Ok(vec![Record::new().with("agg", value)])
    }));
    let mut query = posts_query(db.clone());
    query
        .where_("status", Operator::Equal, "published")
        .unwrap()
        .order_by_desc("views")
        .unwrap()
        .limit(5);

    assert_eq!(query.count().await.unwrap(), 42);
    assert!(query.exists().await.unwrap());
    assert_eq!(query.avg("views").await.unwrap(), Some(12.5));
    assert!(query.sum("nope").await.is_err());

    let log = db.sql_log();
    assert_eq!(log[0], "SELECT COUNT(*) FROM posts WHERE status = $1");
    assert_eq!(log[2], "SELECT AVG(views) FROM posts WHERE status = $1");
    assert_eq!(log.len(), 3);
}

#[tokio::test]
async fn fetch_page_reports_totals() {
    let db = Arc::new(MockDatabase::new().with_query_responder(|sql, _| {
        if sql.starts_with("SELECT COUNT(*)") {
            Ok(vec![Record::new().with("count", 45)])
        } else {
            Ok(vec![Record::new().with("title", "a"); 20])
        }
    }));
    let query = posts_query(db.clone());

    let page = query.fetch_page(2, 20).await.unwrap();
    assert_eq!(page.total_count, 45);
    assert_eq!(page.records.len(), 20);
    assert_eq!(page.current_page(), 2);
    assert_eq!(page.total_pages(), 3);
    assert!(page.has_next_page());
    assert!(page.has_previous_page());

    let statements = db.statements();
    assert_eq!(
        statements[1].sql,
        "SELECT * FROM posts LIMIT $1 OFFSET $2"
    );
    assert_eq!(statements[1].args, vec![Value::Int(20), Value::Int(20)]);
}

struct RecordingLoader {
    calls: Mutex<Vec<Vec<String>>>,
}

#[async_trait::async_trait]
impl RelationshipLoader for RecordingLoader {
    async fn eager_load(
        &self,
        records: &mut Vec<Record>,
        _schema: &ResourceSchema,
        includes: &[String],
    ) -> OrmResult<()> {
        self.calls.lock().unwrap().push(includes.to_vec());
        for record in records.iter_mut() {
            record.insert("comments", Value::Array(Vec::new()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn all_invokes_loader_only_for_includes() {
    let db = Arc::new(
        MockDatabase::new()
            .with_query_responder(|_, _| Ok(vec![Record::new().with("title", "Hello")])),
    );
    let loader = Arc::new(RecordingLoader {
        calls: Mutex::new(Vec::new()),
    });

    let plain = posts_query(db.clone()).with_loader(loader.clone());
    plain.all().await.unwrap();
    assert!(loader.calls.lock().unwrap().is_empty());

    let mut eager = plain.clone();
    eager.include("comments").unwrap();
    let records = eager.all().await.unwrap();
    assert_eq!(loader.calls.lock().unwrap().len(), 1);
    assert!(records[0].contains("comments"));

    let first = eager.first().await.unwrap();
    assert!(first.is_some());
    assert!(db.sql_log().last().unwrap().ends_with("LIMIT $1"));
}
