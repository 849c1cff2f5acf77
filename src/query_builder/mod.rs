//! # Query Builder System
//!
//! Schema-validated, parameterized SELECT construction for a single resource.
//!
//! ## Key Components
//!
//! - [`builder`] - the [`QueryBuilder`] and its execution methods
//! - [`conditions`] - operators, conditions and nestable predicate groups
//! - [`joins`] - validated INNER/LEFT/RIGHT joins
//! - [`pagination`] - LIMIT/OFFSET state and page results
//! - [`scopes`] - scope compilation, binding, chaining and the shared scope cache
//! - [`loader`] - the eager-loading collaborator contract
//!
//! ## Safety
//!
//! Values are never interpolated: every value becomes a `$n` placeholder with a
//! matching entry in the argument list. Field names are checked against the
//! resource schema and join text is restricted to `table.column` comparisons, so a
//! builder that exists can always be rendered into a well-formed statement.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use resource_orm::query_builder::{Operator, PredicateGroup, Condition, QueryBuilder};
//!
//! let mut query = QueryBuilder::new(posts, registry, db);
//! query
//!     .where_("status", Operator::Equal, "published")?
//!     .where_group(
//!         PredicateGroup::new()
//!             .and(Condition::new("views", Operator::GreaterThan, 100))
//!             .or(Condition::eq("featured", true)),
//!     )?
//!     .scope("recent", vec![])?;
//! let rows = query.all().await?;
//! ```

pub mod builder;
pub mod conditions;
pub mod joins;
pub mod loader;
pub mod pagination;
pub mod scopes;

pub use builder::{OrderBy, QueryBuilder, SortDirection};
pub use conditions::{Condition, Operator, ParamList, Predicate, PredicateGroup};
pub use joins::{Join, JoinType};
pub use loader::RelationshipLoader;
pub use pagination::{Page, Pagination};
pub use scopes::{
    compile_named_scope, compile_scope, BoundScope, CompiledScope, ScopeChain, ScopeRegistry,
};
