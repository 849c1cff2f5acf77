//! # ORM Constants
//!
//! Reserved column names, lifecycle hook names and the selectivity table used by
//! the optimizer. Conventional columns are recognised by name: a resource that
//! declares `deleted_at` supports soft delete, one that declares `version` is
//! optimistically locked.

/// Conventional column names with special meaning to the CRUD pipelines
pub mod columns {
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const DELETED_AT: &str = "deleted_at";
    pub const VERSION: &str = "version";
}

/// Lifecycle hook names, also used as the stage label on wrapped errors
pub mod hooks {
    pub const BEFORE_CREATE: &str = "before_create";
    pub const AFTER_CREATE: &str = "after_create";
    pub const BEFORE_UPDATE: &str = "before_update";
    pub const AFTER_UPDATE: &str = "after_update";
    pub const BEFORE_DELETE: &str = "before_delete";
    pub const AFTER_DELETE: &str = "after_delete";
    pub const BEFORE_SAVE: &str = "before_save";
    pub const AFTER_SAVE: &str = "after_save";

    /// Stage label used when the validator rejects a record
    pub const VALIDATION: &str = "validation";
}

/// Selectivity scores; lower sorts first when reordering WHERE predicates
pub mod selectivity {
    pub const EQUAL: u8 = 1;
    pub const SMALL_IN: u8 = 2;
    pub const NULL_CHECK: u8 = 3;
    pub const LARGE_IN: u8 = 4;
    pub const BETWEEN: u8 = 5;
    pub const RANGE: u8 = 6;
    pub const GROUP: u8 = 7;
    pub const PATTERN: u8 = 8;
    pub const NEGATION: u8 = 10;
}

/// Default row count assumed for a table scan when estimating cost
pub const DEFAULT_BASELINE_ROWS: f64 = 1000.0;

/// Row reduction credited per indexable equality/IN condition
pub const DEFAULT_REDUCTION_FACTOR: f64 = 10.0;

/// IN-lists at or below this length are treated as "small"
pub const DEFAULT_SMALL_IN_THRESHOLD: usize = 3;

/// Complexity scores are capped at this value
pub const MAX_COMPLEXITY: u32 = 100;
