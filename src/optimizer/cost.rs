use crate::config::OptimizerConfig;
use crate::query_builder::{Operator, Predicate, QueryBuilder};

const TABLE_SCAN_WEIGHT: f64 = 1.0;
const INDEX_SCAN_WEIGHT: f64 = 0.1;
const JOIN_WEIGHT: f64 = 2.0;
const SORT_WEIGHT: f64 = 1.5;
const AGGREGATION_WEIGHT: f64 = 1.2;

/// Heuristic cost estimate
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCost {
    pub estimated_rows: f64,
    pub table_scans: u32,
    pub index_scans: u32,
    pub joins: u32,
    pub sorts: u32,
    pub aggregations: u32,
    pub total_cost: f64,
}

impl QueryCost {
    /// One table scan over the baseline row count; every top-level equality or
    /// IN condition credits an index scan and divides the row estimate by the
    /// reduction factor.
    pub fn estimate(builder: &QueryBuilder, config: &OptimizerConfig) -> Self {
        let mut estimated_rows = config.baseline_rows;
        let mut index_scans = 0u32;

        for predicate in builder.conditions() {
            if let Predicate::Condition(condition) = predicate {
                if matches!(condition.operator(), Operator::Equal | Operator::In) {
                    index_scans += 1;
                    estimated_rows /= config.reduction_factor;
                }
            }
        }
        let estimated_rows = estimated_rows.max(1.0);

        let table_scans = 1;
        let joins = count(builder.joins().len());
        let sorts = count(builder.order_by_terms().len());
        let aggregations =
            count(builder.group_by_fields().len() + builder.having_conditions().len());

        let weighted = f64::from(table_scans) * TABLE_SCAN_WEIGHT
            + f64::from(index_scans) * INDEX_SCAN_WEIGHT
            + f64::from(joins) * JOIN_WEIGHT
            + f64::from(sorts) * SORT_WEIGHT
            + f64::from(aggregations) * AGGREGATION_WEIGHT;

        Self {
            estimated_rows,
            table_scans,
            index_scans,
            joins,
            sorts,
            aggregations,
            total_cost: weighted * estimated_rows,
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
