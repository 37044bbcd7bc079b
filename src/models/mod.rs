//! Data models shared by the record store client and the directory controller.

pub mod employee;
pub mod filter;
pub mod page;
pub mod user;

pub use employee::{EmployeePayload, EmployeeRecord, EmployeeStatus, FormDraft};
pub use filter::{total_pages, FilterCriteria, SortField, SortOrder, DEFAULT_PAGE_SIZE};
pub use page::ListViewModel;
pub use user::{CurrentUser, UploadFile, UploadReceipt};
