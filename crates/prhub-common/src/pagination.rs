//! `skip`/`limit` pagination shared by every list endpoint.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 50;

/// Pagination parameters (from query string).
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
        }
    }

    /// SQL offset, never negative.
    pub fn offset(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// SQL limit, clamped to `1..=max`.
    pub fn limit(&self, max: i64) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, max.max(1))
    }
}

/// Paginated collection response.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Count of all rows matching the filter, ignoring skip/limit
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, skip: i64, limit: i64) -> Self {
        Self {
            items,
            total,
            skip,
            limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_bounds() {
        let p = PageParams::default();
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(100), DEFAULT_LIMIT);

        let p = PageParams::new(-10, 0);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(100), 1);

        let p = PageParams::new(20, 5000);
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(100), 100);
    }

    #[test]
    fn map_keeps_counts() {
        let page = Page::new(vec![1, 2, 3], 42, 3, 3).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20, 30]);
        assert_eq!(page.total, 42);
        assert_eq!(page.skip, 3);
    }
}
