//! # Query Optimizer
//!
//! Pure rewrite passes over a cloned [`QueryBuilder`], a heuristic cost model and
//! a query analyzer. The caller's builder is never modified.
//!
//! Passes run in a fixed order:
//!
//! 1. drop joins whose target table is already joined
//! 2. predicate push-down (extension point, currently no rewrite)
//! 3. stable reorder of WHERE predicates by selectivity, most selective first
//! 4. eager-load ordering (extension point, currently no rewrite)
//!
//! Predicate reordering only happens when every top-level predicate is AND-joined;
//! moving terms across an OR would change the result set.

pub mod analysis;
pub mod cost;

pub use analysis::QueryAnalysis;
pub use cost::QueryCost;

use crate::config::OptimizerConfig;
use crate::constants::selectivity;
use crate::error::OrmResult;
use crate::query_builder::{Operator, Predicate, QueryBuilder};
use crate::value::Value;
use std::collections::HashSet;
use tracing::debug;

/// Optimized statement plus the reasoning behind it
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub sql: String,
    pub args: Vec<Value>,
    pub cost: QueryCost,
    pub optimizations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Return an optimized copy of `builder`.
    pub fn optimize(&self, builder: &QueryBuilder) -> QueryBuilder {
        self.optimize_with_report(builder).0
    }

    /// Optimized copy plus a description of every pass that changed something.
    pub fn optimize_with_report(&self, builder: &QueryBuilder) -> (QueryBuilder, Vec<String>) {
        let mut optimized = builder.clone();
        let mut applied = Vec::new();

        if let Some(note) = dedupe_joins(&mut optimized) {
            applied.push(note);
        }
        if let Some(note) = push_down_predicates(&mut optimized) {
            applied.push(note);
        }
        if self.config.reorder_predicates {
            if let Some(note) = self.reorder_predicates(&mut optimized) {
                applied.push(note);
            }
        }
        if let Some(note) = order_eager_loads(&mut optimized) {
            applied.push(note);
        }

        debug!(
            resource = %builder.schema().name,
            passes = applied.len(),
            "Optimized query"
        );
        (optimized, applied)
    }

    /// Selectivity score of a predicate; lower is more selective.
    pub fn selectivity(&self, predicate: &Predicate) -> u8 {
        let condition = match predicate {
            Predicate::Group(_) => return selectivity::GROUP,
            Predicate::Condition(condition) => condition,
        };
        match condition.operator() {
            Operator::Equal => selectivity::EQUAL,
            Operator::In if condition.list_len() <= self.config.small_in_threshold => {
                selectivity::SMALL_IN
            }
            Operator::In => selectivity::LARGE_IN,
            Operator::IsNull | Operator::IsNotNull => selectivity::NULL_CHECK,
            Operator::Between => selectivity::BETWEEN,
            Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::LessThan
            | Operator::LessThanOrEqual => selectivity::RANGE,
            Operator::Like | Operator::ILike => selectivity::PATTERN,
            Operator::NotEqual | Operator::NotIn => selectivity::NEGATION,
        }
    }

    fn reorder_predicates(&self, builder: &mut QueryBuilder) -> Option<String> {
        let predicates = builder.conditions_mut();
        if predicates.len() < 2 || predicates.iter().any(Predicate::is_or) {
            return None;
        }

        let before: Vec<u8> = predicates.iter().map(|p| self.selectivity(p)).collect();
        predicates.sort_by_key(|p| self.selectivity(p));
        let after: Vec<u8> = predicates.iter().map(|p| self.selectivity(p)).collect();

        (before != after).then(|| {
            format!(
                "reordered {} predicates by selectivity",
                predicates.len()
            )
        })
    }

    /// Heuristic cost of running `builder` as written.
    pub fn estimate_cost(&self, builder: &QueryBuilder) -> QueryCost {
        QueryCost::estimate(builder, &self.config)
    }

    /// Optimize, render and cost `builder`.
    pub fn explain(&self, builder: &QueryBuilder) -> OrmResult<QueryPlan> {
        let (optimized, optimizations) = self.optimize_with_report(builder);
        let (sql, args) = optimized.to_sql()?;
        Ok(QueryPlan {
            sql,
            args,
            cost: self.estimate_cost(&optimized),
            optimizations,
        })
    }

    /// Structural analysis with warnings and recommendations.
    pub fn analyze(&self, builder: &QueryBuilder) -> OrmResult<QueryAnalysis> {
        QueryAnalysis::analyze(builder, self.estimate_cost(builder))
    }
}

fn dedupe_joins(builder: &mut QueryBuilder) -> Option<String> {
    let joins = builder.joins_mut();
    let before = joins.len();
    let mut seen = HashSet::new();
    joins.retain(|join| seen.insert(join.table.clone()));
    let removed = before - joins.len();
    (removed > 0).then(|| format!("removed {removed} duplicate join(s)"))
}

/// Extension point: a single-table SELECT has nowhere to push predicates to.
fn push_down_predicates(_builder: &mut QueryBuilder) -> Option<String> {
    None
}

/// Extension point: includes are loaded in declaration order.
fn order_eager_loads(_builder: &mut QueryBuilder) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::{Condition, PredicateGroup};

    #[test]
    fn test_selectivity_table() {
        let optimizer = Optimizer::default();
        let score = |c: Condition| optimizer.selectivity(&Predicate::Condition(c));

        assert_eq!(score(Condition::eq("a", 1)), 1);
        assert_eq!(score(Condition::in_list("a", vec![1.into(), 2.into()])), 2);
        assert_eq!(score(Condition::is_null("a")), 3);
        assert_eq!(
            score(Condition::in_list("a", vec![1.into(), 2.into(), 3.into(), 4.into()])),
            4
        );
        assert_eq!(score(Condition::between("a", 1, 2)), 5);
        assert_eq!(score(Condition::new("a", Operator::LessThan, 1)), 6);
        assert_eq!(score(Condition::new("a", Operator::ILike, "%x")), 8);
        assert_eq!(score(Condition::new("a", Operator::NotEqual, 1)), 10);
        assert_eq!(
            optimizer.selectivity(&Predicate::Group(
                PredicateGroup::new().and(Condition::eq("a", 1))
            )),
            7
        );
    }
}
