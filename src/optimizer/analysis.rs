use super::cost::QueryCost;
use crate::constants::MAX_COMPLEXITY;
use crate::error::OrmResult;
use crate::query_builder::{Condition, Operator, Predicate, QueryBuilder};
use crate::schema::ResourceSchema;

const CONDITION_WEIGHT: u32 = 5;
const JOIN_WEIGHT: u32 = 15;
const GROUP_BY_WEIGHT: u32 = 10;
const HAVING_WEIGHT: u32 = 8;
const ORDER_BY_WEIGHT: u32 = 3;
const EAGER_LOAD_WEIGHT: u32 = 12;

const HIGH_COMPLEXITY: u32 = 70;
const SIMPLIFY_THRESHOLD: u32 = 50;

/// Structural report on a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnalysis {
    pub parameter_count: usize,
    pub condition_count: usize,
    pub join_count: usize,
    pub uses_index: bool,
    pub potential_n_plus_one: bool,
    /// 0-100
    pub complexity: u32,
    pub cost: QueryCost,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl QueryAnalysis {
    pub fn analyze(builder: &QueryBuilder, cost: QueryCost) -> OrmResult<Self> {
        let (_, args) = builder.to_sql()?;
        let schema = builder.schema();

        let conditions = flatten(builder.conditions());
        let uses_index = conditions.iter().any(|c| can_use_index(schema, c));
        let potential_n_plus_one =
            !schema.relationships.is_empty() && builder.includes().is_empty();
        let unbounded = builder.pagination().limit.is_none();

        let complexity = complexity_score(builder, conditions.len());

        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        if conditions.is_empty() && unbounded {
            warnings.push(format!(
                "query reads every row of {} without a limit",
                schema.table_name
            ));
        }
        if potential_n_plus_one {
            warnings.push(
                "relationships are declared but none are eager-loaded; iterating related \
                 records may issue one query per row (N+1)"
                    .to_string(),
            );
        }
        for condition in &conditions {
            if is_leading_wildcard(condition) {
                warnings.push(format!(
                    "pattern on {} starts with a wildcard and cannot use an index",
                    condition.field()
                ));
            }
        }
        if complexity > HIGH_COMPLEXITY {
            warnings.push(format!("query complexity is high ({complexity}/100)"));
        }

        if !conditions.is_empty() && !uses_index {
            let mut fields: Vec<&str> = conditions.iter().map(|c| c.field()).collect();
            fields.sort_unstable();
            fields.dedup();
            recommendations.push(format!(
                "add an index on a filtered column ({})",
                fields.join(", ")
            ));
        }
        if potential_n_plus_one {
            let names: Vec<&str> = schema.relationships.keys().map(String::as_str).collect();
            recommendations.push(format!(
                "eager-load relationships with include(): {}",
                names.join(", ")
            ));
        }
        if unbounded {
            recommendations.push("paginate results with limit() or paginate()".to_string());
        }
        if complexity > SIMPLIFY_THRESHOLD {
            recommendations.push("simplify the query or split it into smaller queries".to_string());
        }

        Ok(Self {
            parameter_count: args.len(),
            condition_count: conditions.len(),
            join_count: builder.joins().len(),
            uses_index,
            potential_n_plus_one,
            complexity,
            cost,
            warnings,
            recommendations,
        })
    }
}

/// Every condition in the predicate tree, depth-first.
fn flatten(predicates: &[Predicate]) -> Vec<&Condition> {
    let mut out = Vec::new();
    for predicate in predicates {
        match predicate {
            Predicate::Condition(condition) => out.push(condition),
            Predicate::Group(group) => out.extend(flatten(group.predicates())),
        }
    }
    out
}

fn can_use_index(schema: &ResourceSchema, condition: &Condition) -> bool {
    condition.operator().supports_index()
        && schema
            .get_field(condition.field())
            .is_some_and(|f| f.is_indexed())
}

fn is_leading_wildcard(condition: &Condition) -> bool {
    matches!(condition.operator(), Operator::Like | Operator::ILike)
        && condition
            .value()
            .as_str()
            .is_some_and(|p| p.starts_with('%'))
}

fn complexity_score(builder: &QueryBuilder, condition_count: usize) -> u32 {
    let weighted = |n: usize, weight: u32| u32::try_from(n).unwrap_or(u32::MAX).saturating_mul(weight);
    let score = weighted(condition_count, CONDITION_WEIGHT)
        .saturating_add(weighted(builder.joins().len(), JOIN_WEIGHT))
        .saturating_add(weighted(builder.group_by_fields().len(), GROUP_BY_WEIGHT))
        .saturating_add(weighted(builder.having_conditions().len(), HAVING_WEIGHT))
        .saturating_add(weighted(builder.order_by_terms().len(), ORDER_BY_WEIGHT))
        .saturating_add(weighted(builder.includes().len(), EAGER_LOAD_WEIGHT));
    score.min(MAX_COMPLEXITY)
}
