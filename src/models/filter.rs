//! Filter criteria and the query parameters derived from them.

use serde::{Deserialize, Serialize};

use super::employee::EmployeeStatus;

/// Default number of rows per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Record fields the store can sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    EmpCode,
    Email,
    Department,
    Role,
    Salary,
    JoinDate,
    Status,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::EmpCode => "emp_code",
            SortField::Email => "email",
            SortField::Department => "department",
            SortField::Role => "role",
            SortField::Salary => "salary",
            SortField::JoinDate => "join_date",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// User-controlled parameters that define which records are fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub search_text: String,
    pub department: String,
    /// `None` means all statuses
    pub status: Option<EmployeeStatus>,
    /// 1-indexed
    pub page: u32,
    pub page_size: u32,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            department: String::new(),
            status: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl FilterCriteria {
    /// Query parameters for the count endpoint (no pagination or sort).
    pub fn count_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.search_text.is_empty() {
            params.push(("search", self.search_text.clone()));
        }
        if !self.department.is_empty() {
            params.push(("department", self.department.clone()));
        }
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        params
    }

    /// Query parameters for the list endpoint.
    pub fn list_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("limit", self.page_size.to_string()),
        ];
        params.extend(self.count_params());
        params.push(("sort_by", self.sort_by.as_str().to_string()));
        params.push(("sort_order", self.sort_order.as_str().to_string()));
        params
    }
}

/// Number of pages for a total; zero when there are no results.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    u32::try_from(total_count.div_ceil(page_size as u64)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_params_omit_empty_filters() {
        let criteria = FilterCriteria::default();
        assert!(criteria.count_params().is_empty());

        let criteria = FilterCriteria {
            search_text: "ash".to_string(),
            status: Some(EmployeeStatus::Inactive),
            ..Default::default()
        };
        assert_eq!(
            criteria.count_params(),
            vec![("search", "ash".to_string()), ("status", "inactive".to_string())]
        );
    }

    #[test]
    fn test_list_params_include_paging_and_sort() {
        let criteria = FilterCriteria {
            page: 3,
            page_size: 20,
            department: "Sales".to_string(),
            sort_by: SortField::JoinDate,
            sort_order: SortOrder::Desc,
            ..Default::default()
        };
        let params = criteria.list_params();
        assert!(params.contains(&("page", "3".to_string())));
        assert!(params.contains(&("limit", "20".to_string())));
        assert!(params.contains(&("department", "Sales".to_string())));
        assert!(params.contains(&("sort_by", "join_date".to_string())));
        assert!(params.contains(&("sort_order", "desc".to_string())));
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_total_pages_saturates() {
        assert_eq!(total_pages(u64::MAX, 1), u32::MAX);
        assert_eq!(total_pages(u64::from(u32::MAX) + 1, 1), u32::MAX);
        assert_eq!(total_pages(u64::from(u32::MAX), 1), u32::MAX);
    }
}
