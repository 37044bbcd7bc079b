//! Record store boundary.
//!
//! The directory controller only talks to the store through
//! [`RecordRepository`]; every call takes the caller's [`Session`] explicitly.

mod http;
mod memory;

pub use http::HttpRepository;
pub use memory::MemoryRepository;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{
    CurrentUser, EmployeePayload, EmployeeRecord, FilterCriteria, UploadFile, UploadReceipt,
};

pub const AUTH_ME_PATH: &str = "/api/auth/me";
pub const COUNT_PATH: &str = "/api/employees/count";
pub const LIST_PATH: &str = "/api/employees/list";
pub const ADD_PATH: &str = "/api/employees/add";
pub const DEPARTMENTS_PATH: &str = "/api/departments";
pub const UPLOAD_PATH: &str = "/api/upload";

pub fn employee_path(id: &str) -> String {
    employees_subpath(&[id])
}

pub fn restore_path(id: &str) -> String {
    employees_subpath(&[id, "restore"])
}

/// `/api/employees/` followed by `segments`, each percent-encoded as one path segment.
fn employees_subpath(segments: &[&str]) -> String {
    let mut url = match Url::parse("http://store.invalid/api/employees") {
        Ok(url) => url,
        Err(_) => return format!("/api/employees/{}", segments.join("/")),
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.extend(segments);
    }
    url.path().to_string()
}

/// Credential context passed into every store call.
#[derive(Clone, Default)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// The bearer token, or `MissingCredential` when none is held.
    pub fn bearer(&self) -> DirectoryResult<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .ok_or(DirectoryError::MissingCredential)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Service origin used to absolutize relative locators (e.g. upload URLs)
    fn origin(&self) -> &str;

    async fn current_user(&self, session: &Session) -> DirectoryResult<CurrentUser>;

    /// Count of records matching the filter fields (pagination ignored)
    async fn count(&self, session: &Session, criteria: &FilterCriteria) -> DirectoryResult<u64>;

    /// One page of records matching the criteria
    async fn list(
        &self,
        session: &Session,
        criteria: &FilterCriteria,
    ) -> DirectoryResult<Vec<EmployeeRecord>>;

    async fn get(&self, session: &Session, id: &str) -> DirectoryResult<EmployeeRecord>;

    async fn departments(&self, session: &Session) -> DirectoryResult<Vec<String>>;

    async fn add(
        &self,
        session: &Session,
        payload: &EmployeePayload<'_>,
    ) -> DirectoryResult<EmployeeRecord>;

    async fn update(
        &self,
        session: &Session,
        id: &str,
        payload: &EmployeePayload<'_>,
    ) -> DirectoryResult<EmployeeRecord>;

    /// Mark the record inactive. The store keeps the record.
    async fn soft_delete(&self, session: &Session, id: &str) -> DirectoryResult<()>;

    async fn restore(&self, session: &Session, id: &str) -> DirectoryResult<()>;

    async fn upload(&self, session: &Session, file: UploadFile) -> DirectoryResult<UploadReceipt>;
}
