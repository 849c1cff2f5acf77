mod common;
mod mocks;

use common::posts_query;
use common::strategies::*;
use mocks::mock_database::MockDatabase;
use proptest::prelude::*;
use regex::Regex;
use resource_orm::identifiers::{is_bare_identifier, quote_identifier};
use resource_orm::{Operator, Optimizer, Value};
use std::sync::Arc;

fn placeholders(sql: &str) -> Vec<usize> {
    let pattern = Regex::new(r"\$(\d+)").unwrap();
    pattern
        .captures_iter(sql)
        .map(|c| c[1].parse().unwrap())
        .collect()
}

proptest! {
    /// Property: placeholders are numbered 1..=n in order and match the argument list
    #[test]
    fn placeholders_match_arguments(
        filters in prop::collection::vec((post_column_strategy(), scalar_value_strategy()), 0..8),
        lists in prop::collection::vec((post_column_strategy(), value_list_strategy()), 0..4),
        limit in prop::option::of(1u64..500),
    ) {
        let mut query = posts_query(Arc::new(MockDatabase::new()));
        for (field, value) in filters {
            query.where_(field, Operator::Equal, value).unwrap();
        }
        for (field, values) in lists {
            query.where_in(field, values).unwrap();
        }
        if let Some(limit) = limit {
            query.limit(limit);
        }

        let (sql, args) = query.to_sql().unwrap();
        let numbers = placeholders(&sql);
        prop_assert_eq!(numbers.len(), args.len());
        prop_assert_eq!(numbers, (1..=args.len()).collect::<Vec<_>>());
    }

    /// Property: rendering never changes the builder, so it is repeatable
    #[test]
    fn rendering_is_idempotent(
        filters in prop::collection::vec((post_column_strategy(), scalar_value_strategy()), 0..6),
    ) {
        let mut query = posts_query(Arc::new(MockDatabase::new()));
        for (field, value) in filters {
            query.where_(field, Operator::NotEqual, value).unwrap();
        }
        prop_assert_eq!(query.to_sql().unwrap(), query.to_sql().unwrap());
    }

    /// Property: optimization reorders predicates but keeps every argument
    #[test]
    fn optimizer_preserves_argument_multiset(
        filters in prop::collection::vec((post_column_strategy(), scalar_value_strategy()), 1..8),
    ) {
        let mut query = posts_query(Arc::new(MockDatabase::new()));
        for (field, value) in filters {
            query.where_(field, Operator::GreaterThan, value).unwrap();
        }
        let (_, original) = query.to_sql().unwrap();
        let (sql, optimized) = Optimizer::default().optimize(&query).to_sql().unwrap();

        let sorted = |mut values: Vec<Value>| {
            values.sort_by_key(|v| format!("{v:?}"));
            values
        };
        prop_assert_eq!(sorted(original), sorted(optimized.clone()));
        prop_assert_eq!(placeholders(&sql).len(), optimized.len());
    }

    /// Property: empty IN lists render as constants and bind nothing
    #[test]
    fn empty_in_lists_bind_no_arguments(field in post_column_strategy(), negated in any::<bool>()) {
        let mut query = posts_query(Arc::new(MockDatabase::new()));
        if negated {
            query.where_not_in(field, Vec::new()).unwrap();
        } else {
            query.where_in(field, Vec::new()).unwrap();
        }
        let (sql, args) = query.to_sql().unwrap();
        prop_assert!(args.is_empty());
        let expected = if negated { "WHERE TRUE" } else { "WHERE FALSE" };
        prop_assert!(sql.ends_with(expected), "{} should end with {}", sql, expected);
    }

    /// Property: quoting wraps the name and doubles every embedded quote
    #[test]
    fn quoted_identifiers_round_trip(name in raw_identifier_strategy()) {
        let quoted = quote_identifier(&name);
        prop_assert!(quoted.starts_with('"') && quoted.ends_with('"'));
        let inner = &quoted[1..quoted.len() - 1];
        prop_assert_eq!(inner.replace("\"\"", "\""), name.clone());
        prop_assert_eq!(inner.matches('"').count(), 2 * name.matches('"').count());
    }

    /// Property: names containing quotes or spaces are never bare identifiers
    #[test]
    fn unsafe_names_are_not_bare(name in raw_identifier_strategy()) {
        if name.contains('"') || name.contains(' ') {
            prop_assert!(!is_bare_identifier(&name));
        }
    }
}
