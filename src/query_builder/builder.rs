use super::conditions::{render_predicates, Condition, Operator, ParamList, Predicate, PredicateGroup};
use super::joins::Join;
use super::loader::RelationshipLoader;
use super::pagination::{Page, Pagination};
use super::scopes::{BoundScope, ScopeChain, ScopeRegistry};
use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::logging::log_query;
use crate::schema::{ResourceSchema, SchemaRegistry};
use crate::value::{Record, Value};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::instrument;

static AGGREGATE_CALL: OnceLock<Regex> = OnceLock::new();

fn aggregate_regex() -> &'static Regex {
    AGGREGATE_CALL.get_or_init(|| {
        Regex::new(r"(?i)^(count|sum|avg|min|max)\((\*|[A-Za-z_][A-Za-z0-9_]*)\)$")
            .expect("aggregate pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(direction: &str) -> Option<Self> {
        match direction.to_ascii_uppercase().as_str() {
            "ASC" => Some(SortDirection::Asc),
            "DESC" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{} {}", self.field, self.direction.as_sql())
    }
}

/// Schema-aware SELECT builder.
///
/// Every method that references a field checks it against the bound schema and
/// returns an error before touching the builder, so a failed call leaves the
/// builder exactly as it was. Rendering is idempotent: placeholders are numbered
/// from `$1` on every call to [`QueryBuilder::to_sql`].
///
/// ```rust,ignore
/// let mut query = QueryBuilder::new(posts, registry, db);
/// query
///     .where_("status", Operator::Equal, "published")?
///     .where_("views", Operator::GreaterThan, 100)?
///     .order_by_desc("created_at")?
///     .limit(10);
/// let (sql, args) = query.to_sql()?;
/// // SELECT * FROM posts WHERE status = $1 AND views > $2 ORDER BY created_at DESC LIMIT $3
/// ```
#[derive(Clone)]
pub struct QueryBuilder {
    schema: Arc<ResourceSchema>,
    registry: Arc<SchemaRegistry>,
    db: Arc<dyn Database>,
    loader: Option<Arc<dyn RelationshipLoader>>,
    scope_registry: Option<Arc<ScopeRegistry>>,
    conditions: Vec<Predicate>,
    joins: Vec<Join>,
    group_by: Vec<String>,
    having: Vec<Condition>,
    order_by: Vec<OrderBy>,
    pagination: Pagination,
    includes: Vec<String>,
    applied_scopes: Vec<String>,
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("resource", &self.schema.name)
            .field("conditions", &self.conditions)
            .field("joins", &self.joins)
            .field("group_by", &self.group_by)
            .field("having", &self.having)
            .field("order_by", &self.order_by)
            .field("pagination", &self.pagination)
            .field("includes", &self.includes)
            .field("applied_scopes", &self.applied_scopes)
            .finish()
    }
}

impl QueryBuilder {
    pub fn new(
        schema: Arc<ResourceSchema>,
        registry: Arc<SchemaRegistry>,
        db: Arc<dyn Database>,
    ) -> Self {
        Self {
            schema,
            registry,
            db,
            loader: None,
            scope_registry: None,
            conditions: Vec::new(),
            joins: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            pagination: Pagination::default(),
            includes: Vec::new(),
            applied_scopes: Vec::new(),
        }
    }

    /// Attach the loader invoked by [`QueryBuilder::all`] for requested includes.
    pub fn with_loader(mut self, loader: Arc<dyn RelationshipLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Resolve scopes through a shared compiled-scope cache.
    pub fn with_scope_registry(mut self, scopes: Arc<ScopeRegistry>) -> Self {
        self.scope_registry = Some(scopes);
        self
    }

    // ----- filters -----

    /// Add a condition after checking its field and value shape.
    pub fn where_condition(&mut self, condition: Condition) -> OrmResult<&mut Self> {
        self.schema.check_filterable(condition.field())?;
        condition.validate()?;
        self.conditions
            .push(Predicate::Condition(condition.coerce_for(&self.schema)));
        Ok(self)
    }

    pub fn where_(
        &mut self,
        field: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> OrmResult<&mut Self> {
        self.where_condition(Condition::new(field, operator, value))
    }

    pub fn or_where(
        &mut self,
        field: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> OrmResult<&mut Self> {
        self.where_condition(Condition::new(field, operator, value).or())
    }

    pub fn where_in(&mut self, field: &str, values: Vec<Value>) -> OrmResult<&mut Self> {
        self.where_condition(Condition::in_list(field, values))
    }

    pub fn where_not_in(&mut self, field: &str, values: Vec<Value>) -> OrmResult<&mut Self> {
        self.where_condition(Condition::not_in_list(field, values))
    }

    pub fn where_null(&mut self, field: &str) -> OrmResult<&mut Self> {
        self.where_condition(Condition::is_null(field))
    }

    pub fn where_not_null(&mut self, field: &str) -> OrmResult<&mut Self> {
        self.where_condition(Condition::is_not_null(field))
    }

    pub fn where_between(
        &mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> OrmResult<&mut Self> {
        self.where_condition(Condition::between(field, low, high))
    }

    pub fn where_like(&mut self, field: &str, pattern: &str) -> OrmResult<&mut Self> {
        self.where_condition(Condition::new(field, Operator::Like, pattern))
    }

    pub fn where_ilike(&mut self, field: &str, pattern: &str) -> OrmResult<&mut Self> {
        self.where_condition(Condition::new(field, Operator::ILike, pattern))
    }

    pub fn where_group(&mut self, group: PredicateGroup) -> OrmResult<&mut Self> {
        self.push_group(group, false)
    }

    pub fn or_where_group(&mut self, group: PredicateGroup) -> OrmResult<&mut Self> {
        self.push_group(group, true)
    }

    fn push_group(&mut self, group: PredicateGroup, or: bool) -> OrmResult<&mut Self> {
        group.validate()?;
        for field in group.fields() {
            self.schema.check_filterable(field)?;
        }
        let group = group.coerce_for(&self.schema).joined_with_or(or);
        self.conditions.push(Predicate::Group(group));
        Ok(self)
    }

    // ----- joins -----

    pub fn join(&mut self, join: Join) -> OrmResult<&mut Self> {
        join.check_columns(&self.registry)?;
        self.joins.push(join);
        Ok(self)
    }

    pub fn inner_join(&mut self, table: &str, on_condition: &str) -> OrmResult<&mut Self> {
        self.join(Join::inner(table, on_condition)?)
    }

    pub fn left_join(&mut self, table: &str, on_condition: &str) -> OrmResult<&mut Self> {
        self.join(Join::left(table, on_condition)?)
    }

    pub fn right_join(&mut self, table: &str, on_condition: &str) -> OrmResult<&mut Self> {
        self.join(Join::right(table, on_condition)?)
    }

    // ----- grouping and ordering -----

    pub fn group_by(&mut self, fields: &[&str]) -> OrmResult<&mut Self> {
        for field in fields {
            self.schema.check_filterable(field)?;
        }
        self.group_by.extend(fields.iter().map(|f| f.to_string()));
        Ok(self)
    }

    /// Add a HAVING predicate on a column or on a single aggregate call such as
    /// `COUNT(*)` or `SUM(views)`. The aggregated column must be declared.
    pub fn having(
        &mut self,
        expression: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> OrmResult<&mut Self> {
        if let Some(call) = aggregate_regex().captures(expression) {
            match &call[2] {
                "*" if call[1].eq_ignore_ascii_case("count") => {}
                "*" => {
                    return Err(OrmError::InvalidCondition {
                        field: expression.to_string(),
                        reason: "only COUNT accepts *".to_string(),
                    })
                }
                column => self.schema.check_filterable(column)?,
            }
        } else if expression.contains('(') {
            return Err(OrmError::InvalidCondition {
                field: expression.to_string(),
                reason: "expected a column or an aggregate call like COUNT(*)".to_string(),
            });
        } else {
            self.schema.check_filterable(expression)?;
        }
        let condition = Condition::new(expression, operator, value);
        condition.validate()?;
        self.having.push(condition);
        Ok(self)
    }

    pub fn order_by(&mut self, field: &str, direction: SortDirection) -> OrmResult<&mut Self> {
        self.schema.check_filterable(field)?;
        self.order_by.push(OrderBy::new(field, direction));
        Ok(self)
    }

    pub fn order_by_asc(&mut self, field: &str) -> OrmResult<&mut Self> {
        self.order_by(field, SortDirection::Asc)
    }

    pub fn order_by_desc(&mut self, field: &str) -> OrmResult<&mut Self> {
        self.order_by(field, SortDirection::Desc)
    }

    // ----- paging -----

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.pagination.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.pagination.offset = Some(offset);
        self
    }

    /// Set LIMIT/OFFSET for a 1-indexed page.
    pub fn paginate(&mut self, page: u64, per_page: u64) -> &mut Self {
        self.pagination = Pagination::new(page, per_page);
        self
    }

    // ----- eager loading and scopes -----

    pub fn include(&mut self, relationship: &str) -> OrmResult<&mut Self> {
        if self.schema.get_relationship(relationship).is_none() {
            return Err(OrmError::RelationshipNotFound {
                resource: self.schema.name.clone(),
                name: relationship.to_string(),
            });
        }
        if !self.includes.iter().any(|i| i == relationship) {
            self.includes.push(relationship.to_string());
        }
        Ok(self)
    }

    /// Bind and apply a named scope declared on the resource.
    pub fn scope(&mut self, name: &str, args: Vec<Value>) -> OrmResult<&mut Self> {
        let bound = match &self.scope_registry {
            Some(scopes) => scopes.bind(&self.schema, name, args)?,
            None => super::scopes::compile_named_scope(&self.schema, name)?.bind(args)?,
        };
        ScopeChain::new().with(bound).apply(self)?;
        Ok(self)
    }

    /// Merge a bound scope into this builder.
    ///
    /// Conditions and ordering append; the limit becomes the smaller of the
    /// current and the scope's limit; offsets add up. Everything is checked before
    /// the builder changes.
    pub(crate) fn merge_scope(&mut self, scope: &BoundScope) -> OrmResult<()> {
        for condition in &scope.conditions {
            self.schema.check_filterable(condition.field())?;
            condition.validate()?;
        }
        for order in &scope.order_by {
            self.schema.check_filterable(&order.field)?;
        }

        self.conditions.extend(
            scope
                .conditions
                .iter()
                .map(|c| Predicate::Condition(c.clone().coerce_for(&self.schema))),
        );
        self.order_by.extend(scope.order_by.iter().cloned());
        self.pagination.limit = match (self.pagination.limit, scope.limit) {
            (Some(current), Some(limit)) => Some(current.min(limit)),
            (current, limit) => current.or(limit),
        };
        self.pagination.offset = match (self.pagination.offset, scope.offset) {
            (Some(current), Some(offset)) => Some(current.saturating_add(offset)),
            (current, offset) => current.or(offset),
        };
        self.applied_scopes
            .extend(scope.name.split('+').map(str::to_string));
        Ok(())
    }

    // ----- accessors -----

    pub fn schema(&self) -> &Arc<ResourceSchema> {
        &self.schema
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn conditions(&self) -> &[Predicate] {
        &self.conditions
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn group_by_fields(&self) -> &[String] {
        &self.group_by
    }

    pub fn having_conditions(&self) -> &[Condition] {
        &self.having
    }

    pub fn order_by_terms(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn applied_scopes(&self) -> &[String] {
        &self.applied_scopes
    }

    pub(crate) fn conditions_mut(&mut self) -> &mut Vec<Predicate> {
        &mut self.conditions
    }

    pub(crate) fn joins_mut(&mut self) -> &mut Vec<Join> {
        &mut self.joins
    }

    // ----- rendering -----

    /// Render the statement and its positional arguments.
    pub fn to_sql(&self) -> OrmResult<(String, Vec<Value>)> {
        let mut params = ParamList::new();
        let mut sql = format!("SELECT * FROM {}", self.schema.table_name);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_predicates(&self.conditions, &mut params)?);
        }

        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }

        if !self.having.is_empty() {
            let having = self
                .having
                .iter()
                .map(|c| c.to_sql(&mut params))
                .collect::<OrmResult<Vec<_>>>()?;
            sql.push_str(&format!(" HAVING {}", having.join(" AND ")));
        }

        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(OrderBy::to_sql)
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {order}"));
        }

        sql.push_str(&self.pagination.to_sql(&mut params));

        Ok((sql, params.into_args()))
    }

    /// A copy without ordering, paging or includes, for aggregate statements.
    fn for_aggregate(&self) -> Self {
        let mut query = self.clone();
        query.order_by.clear();
        query.pagination = Pagination::default();
        query.includes.clear();
        query
    }

    fn aggregate_sql(&self, select: &str) -> OrmResult<(String, Vec<Value>)> {
        let (sql, args) = self.for_aggregate().to_sql()?;
        Ok((sql.replacen("SELECT *", &format!("SELECT {select}"), 1), args))
    }

    // ----- execution -----

    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn all(&self) -> OrmResult<Vec<Record>> {
        let (sql, args) = self.to_sql()?;
        log_query(&self.schema.name, &sql, args.len());
        let mut records = self.db.query(&sql, &args).await?;

        if !self.includes.is_empty() {
            if let Some(loader) = &self.loader {
                loader
                    .eager_load(&mut records, &self.schema, &self.includes)
                    .await?;
            }
        }
        Ok(records)
    }

    pub async fn first(&self) -> OrmResult<Option<Record>> {
        let mut query = self.clone();
        query.pagination.limit = Some(1);
        Ok(query.all().await?.into_iter().next())
    }

    #[instrument(skip_all, fields(resource = %self.schema.name))]
    pub async fn count(&self) -> OrmResult<i64> {
        let (sql, args) = self.aggregate_sql("COUNT(*)")?;
        log_query(&self.schema.name, &sql, args.len());
        let rows = self.db.query(&sql, &args).await?;
        Ok(first_scalar(&rows).and_then(|v| v.as_i64()).unwrap_or(0))
    }

    pub async fn exists(&self) -> OrmResult<bool> {
        Ok(self.count().await? > 0)
    }

    pub async fn sum(&self, field: &str) -> OrmResult<Option<f64>> {
        Ok(self.aggregate("SUM", field).await?.as_f64())
    }

    pub async fn avg(&self, field: &str) -> OrmResult<Option<f64>> {
        Ok(self.aggregate("AVG", field).await?.as_f64())
    }

    pub async fn min(&self, field: &str) -> OrmResult<Value> {
        self.aggregate("MIN", field).await
    }

    pub async fn max(&self, field: &str) -> OrmResult<Value> {
        self.aggregate("MAX", field).await
    }

    async fn aggregate(&self, function: &str, field: &str) -> OrmResult<Value> {
        self.schema.check_filterable(field)?;
        let (sql, args) = self.aggregate_sql(&format!("{function}({field})"))?;
        log_query(&self.schema.name, &sql, args.len());
        let rows = self.db.query(&sql, &args).await?;
        Ok(first_scalar(&rows).cloned().unwrap_or(Value::Null))
    }

    /// Fetch one page together with the total row count.
    pub async fn fetch_page(&self, page: u64, per_page: u64) -> OrmResult<Page> {
        let total_count = u64::try_from(self.count().await?).unwrap_or(0);
        let mut query = self.clone();
        query.paginate(page, per_page);
        let records = query.all().await?;
        Ok(Page {
            records,
            total_count,
            pagination: query.pagination,
        })
    }
}

/// First column of the first row of a single-value result.
fn first_scalar(rows: &[Record]) -> Option<&Value> {
    rows.first()
        .and_then(|row| row.iter().next().map(|(_, value)| value))
}
