//! Page envelopes returned by paginated reads.

use serde::Serialize;

/// Length-aware page: knows the total row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let last_page = if per_page == 0 {
            1
        } else {
            total.div_ceil(per_page).max(1)
        };
        Self {
            items,
            page,
            per_page,
            total,
            last_page,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.page < self.last_page
    }
}

/// Page that only knows whether another page follows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplePage<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub has_more: bool,
}
