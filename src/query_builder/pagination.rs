use super::conditions::ParamList;
use crate::value::{Record, Value};

/// LIMIT/OFFSET state of a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Pagination {
    /// Create pagination with page number (1-indexed) and per-page count
    pub fn new(page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        Self {
            limit: Some(per_page),
            offset: Some((page - 1) * per_page),
        }
    }

    /// Create pagination with only limit
    pub fn limit_only(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }

    /// Render ` LIMIT $n OFFSET $m`, binding both counts as arguments.
    pub fn to_sql(&self, params: &mut ParamList) -> String {
        let mut sql = String::new();

        if let Some(limit) = self.limit {
            let placeholder = params.push(Value::Int(count_to_i64(limit)));
            sql.push_str(&format!(" LIMIT {placeholder}"));
        }

        if let Some(offset) = self.offset {
            let placeholder = params.push(Value::Int(count_to_i64(offset)));
            sql.push_str(&format!(" OFFSET {placeholder}"));
        }

        sql
    }

    /// Calculate total pages given a total count
    pub fn total_pages(&self, total_count: u64) -> u64 {
        match self.limit {
            Some(limit) if limit > 0 => total_count.div_ceil(limit),
            _ => 1,
        }
    }

    /// Get current page number (1-indexed)
    pub fn current_page(&self) -> u64 {
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if limit > 0 => (offset / limit) + 1,
            _ => 1,
        }
    }

    /// Check if there's a next page
    pub fn has_next_page(&self, total_count: u64) -> bool {
        match self.limit {
            Some(limit) => self.offset.unwrap_or(0) + limit < total_count,
            None => false,
        }
    }

    /// Check if there's a previous page
    pub fn has_previous_page(&self) -> bool {
        self.offset.is_some_and(|offset| offset > 0)
    }
}

fn count_to_i64(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// One page of results plus the totals needed to navigate
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub total_count: u64,
    pub pagination: Pagination,
}

impl Page {
    pub fn current_page(&self) -> u64 {
        self.pagination.current_page()
    }

    pub fn total_pages(&self) -> u64 {
        self.pagination.total_pages(self.total_count)
    }

    pub fn has_next_page(&self) -> bool {
        self.pagination.has_next_page(self.total_count)
    }

    pub fn has_previous_page(&self) -> bool {
        self.pagination.has_previous_page()
    }
}
