//! Filter and pagination state.
//!
//! Changing search text, department or status resets the page to 1.
//! Changing the page size keeps the page; the next fetch clamps it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{total_pages, EmployeeStatus, FilterCriteria, SortField, SortOrder};

#[derive(Debug, Clone, Default)]
pub struct FilterState {
    criteria: FilterCriteria,
    /// Known after the first successful fetch
    total_pages: Option<u32>,
}

impl FilterState {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            total_pages: None,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Immutable copy handed to a fetch.
    pub fn snapshot(&self) -> FilterCriteria {
        self.criteria.clone()
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Returns whether the criteria changed.
    pub fn set_search(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.criteria.search_text == text {
            return false;
        }
        self.criteria.search_text = text;
        self.criteria.page = 1;
        true
    }

    pub fn set_department(&mut self, department: impl Into<String>) -> bool {
        let department = department.into();
        if self.criteria.department == department {
            return false;
        }
        self.criteria.department = department;
        self.criteria.page = 1;
        true
    }

    pub fn set_status(&mut self, status: Option<EmployeeStatus>) -> bool {
        if self.criteria.status == status {
            return false;
        }
        self.criteria.status = status;
        self.criteria.page = 1;
        true
    }

    /// Move to `page`; rejected outside `[1, totalPages]` once that is known.
    pub fn set_page(&mut self, page: u32) -> DirectoryResult<bool> {
        let upper = self.total_pages.map(|t| t.max(1));
        let in_range = page >= 1 && upper.map_or(true, |upper| page <= upper);
        if !in_range {
            return Err(DirectoryError::PageOutOfRange {
                page,
                total_pages: upper.unwrap_or(0),
            });
        }
        if self.criteria.page == page {
            return Ok(false);
        }
        self.criteria.page = page;
        Ok(true)
    }

    /// Change the page size. The page is left alone.
    pub fn set_page_size(&mut self, page_size: u32) -> DirectoryResult<bool> {
        if page_size == 0 {
            return Err(DirectoryError::InvalidDraft(
                "Page size must be at least 1".to_string(),
            ));
        }
        if self.criteria.page_size == page_size {
            return Ok(false);
        }
        self.criteria.page_size = page_size;
        Ok(true)
    }

    pub fn set_sort(&mut self, field: SortField, order: SortOrder) -> bool {
        if self.criteria.sort_by == field && self.criteria.sort_order == order {
            return false;
        }
        self.criteria.sort_by = field;
        self.criteria.sort_order = order;
        true
    }

    pub fn reset_page(&mut self) -> bool {
        let changed = self.criteria.page != 1;
        self.criteria.page = 1;
        changed
    }

    pub fn next_page(&mut self) -> bool {
        let next = self.criteria.page.saturating_add(1);
        self.set_page(next).unwrap_or(false)
    }

    pub fn prev_page(&mut self) -> bool {
        if self.criteria.page <= 1 {
            return false;
        }
        let prev = self.criteria.page - 1;
        self.set_page(prev).unwrap_or(false)
    }

    /// Record the total from an applied fetch made with `page_size`.
    ///
    /// Returns the new page when the current one had to be clamped.
    pub fn observe_total(&mut self, total_count: u64, page_size: u32) -> Option<u32> {
        let pages = total_pages(total_count, page_size);
        self.total_pages = Some(pages);
        let upper = pages.max(1);
        if self.criteria.page > upper {
            self.criteria.page = upper;
            Some(upper)
        } else {
            None
        }
    }
}

/// Collapses a burst of search keystrokes into one fetch.
#[derive(Debug)]
pub struct SearchDebounce {
    delay: Duration,
    generation: AtomicU64,
}

impl SearchDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the delay; true when no later keystroke arrived meanwhile.
    pub async fn settle(&self) -> bool {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.generation.load(Ordering::SeqCst) == ticket
    }
}
