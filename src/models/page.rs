//! The fetch-consistent snapshot of records shown in the directory.

use serde::Serialize;

use super::employee::EmployeeRecord;
use super::filter::{total_pages, DEFAULT_PAGE_SIZE};

/// Rows plus total count from one successful fetch.
///
/// Recomputed wholesale on each applied response, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListViewModel {
    pub rows: Vec<EmployeeRecord>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ListViewModel {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListViewModel {
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pagination label, e.g. "Page 2 of 5 (Total: 43)".
    pub fn summary(&self) -> String {
        format!(
            "Page {} of {} (Total: {})",
            self.page,
            self.total_pages().max(1),
            self.total_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_no_results() {
        let model = ListViewModel::default();
        assert_eq!(model.total_pages(), 0);
        assert_eq!(model.summary(), "Page 1 of 1 (Total: 0)");
    }

    #[test]
    fn test_summary_counts_pages() {
        let model = ListViewModel {
            total_count: 43,
            page: 2,
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(model.summary(), "Page 2 of 5 (Total: 43)");
    }
}
