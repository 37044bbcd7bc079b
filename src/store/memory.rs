//! In-process record store with the remote store's semantics.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;
use tracing::debug;

use super::{employee_path, restore_path, RecordRepository, Session, ADD_PATH, UPLOAD_PATH};
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{
    CurrentUser, EmployeePayload, EmployeeRecord, EmployeeStatus, FilterCriteria, SortField,
    SortOrder, UploadFile, UploadReceipt,
};

#[derive(Debug, Default)]
struct MemoryState {
    employees: Vec<EmployeeRecord>,
    uploads: Vec<String>,
}

/// Record store held in memory.
#[derive(Debug)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
    origin: String,
    /// When set, only this bearer token is accepted
    accepted_token: Option<String>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new("http://localhost:8000")
    }
}

impl MemoryRepository {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            origin: origin.into(),
            accepted_token: None,
        }
    }

    /// Reject every bearer token except `token`.
    pub fn with_accepted_token(mut self, token: impl Into<String>) -> Self {
        self.accepted_token = Some(token.into());
        self
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn records(&self) -> Vec<EmployeeRecord> {
        self.state.read().employees.clone()
    }

    /// Names of the files received by `upload`.
    pub fn uploads(&self) -> Vec<String> {
        self.state.read().uploads.clone()
    }

    fn authorize(&self, session: &Session) -> DirectoryResult<()> {
        let token = session.bearer()?;
        match &self.accepted_token {
            Some(accepted) if accepted != token => Err(DirectoryError::AuthExpired),
            _ => Ok(()),
        }
    }

    fn matching(&self, criteria: &FilterCriteria) -> Vec<EmployeeRecord> {
        let search = criteria.search_text.to_lowercase();
        self.state
            .read()
            .employees
            .iter()
            .filter(|e| {
                search.is_empty()
                    || e.name.to_lowercase().contains(&search)
                    || e.email.to_lowercase().contains(&search)
                    || e.emp_code.to_lowercase().contains(&search)
            })
            .filter(|e| criteria.department.is_empty() || e.department == criteria.department)
            .filter(|e| criteria.status.map_or(true, |s| e.status == s))
            .cloned()
            .collect()
    }

    fn not_found(id: &str) -> DirectoryError {
        DirectoryError::Validation {
            status: 404,
            endpoint: employee_path(id),
            detail: Some("Employee not found".to_string()),
        }
    }

    fn set_status(&self, id: &str, status: EmployeeStatus) -> DirectoryResult<()> {
        let mut state = self.state.write();
        let record = state
            .employees
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        record.status = status;
        record.updated_at = Some(Utc::now().to_rfc3339());
        Ok(())
    }
}

fn compare(a: &EmployeeRecord, b: &EmployeeRecord, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::EmpCode => a.emp_code.cmp(&b.emp_code),
        SortField::Email => a.email.cmp(&b.email),
        SortField::Department => a.department.cmp(&b.department),
        SortField::Role => a.role.cmp(&b.role),
        SortField::Salary => a.salary.partial_cmp(&b.salary).unwrap_or(Ordering::Equal),
        SortField::JoinDate => a.join_date.cmp(&b.join_date),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}

#[async_trait]
impl RecordRepository for MemoryRepository {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn current_user(&self, session: &Session) -> DirectoryResult<CurrentUser> {
        self.authorize(session)?;
        Ok(CurrentUser {
            id: "local-admin".to_string(),
            username: "admin".to_string(),
            role: "Admin".to_string(),
            status: Some("active".to_string()),
            last_login: None,
        })
    }

    async fn count(&self, session: &Session, criteria: &FilterCriteria) -> DirectoryResult<u64> {
        self.authorize(session)?;
        Ok(self.matching(criteria).len() as u64)
    }

    async fn list(
        &self,
        session: &Session,
        criteria: &FilterCriteria,
    ) -> DirectoryResult<Vec<EmployeeRecord>> {
        self.authorize(session)?;
        let mut rows = self.matching(criteria);
        rows.sort_by(|a, b| {
            let ordering = compare(a, b, criteria.sort_by);
            match criteria.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        let skip = (criteria.page.max(1) as usize - 1) * criteria.page_size as usize;
        Ok(rows
            .into_iter()
            .skip(skip)
            .take(criteria.page_size as usize)
            .collect())
    }

    async fn get(&self, session: &Session, id: &str) -> DirectoryResult<EmployeeRecord> {
        self.authorize(session)?;
        self.state
            .read()
            .employees
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn departments(&self, session: &Session) -> DirectoryResult<Vec<String>> {
        self.authorize(session)?;
        let mut departments: Vec<String> = self
            .state
            .read()
            .employees
            .iter()
            .map(|e| e.department.clone())
            .collect();
        departments.sort();
        departments.dedup();
        Ok(departments)
    }

    async fn add(
        &self,
        session: &Session,
        payload: &EmployeePayload<'_>,
    ) -> DirectoryResult<EmployeeRecord> {
        self.authorize(session)?;
        let mut state = self.state.write();
        if state.employees.iter().any(|e| e.email == payload.email) {
            return Err(DirectoryError::Validation {
                status: 400,
                endpoint: ADD_PATH.to_string(),
                detail: Some("Email already exists".to_string()),
            });
        }

        let now = Utc::now().to_rfc3339();
        let record = EmployeeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            emp_code: format!("EMP{:05}", state.employees.len() + 1),
            name: payload.name.to_string(),
            email: payload.email.to_string(),
            department: payload.department.to_string(),
            role: payload.role.to_string(),
            salary: payload.salary,
            join_date: payload.join_date,
            phone: payload.phone.to_string(),
            address: Some(payload.address.to_string()),
            photo: payload.photo.map(str::to_string),
            status: EmployeeStatus::Active,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        debug!(id = %record.id, emp_code = %record.emp_code, "Stored new employee");
        state.employees.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        session: &Session,
        id: &str,
        payload: &EmployeePayload<'_>,
    ) -> DirectoryResult<EmployeeRecord> {
        self.authorize(session)?;
        let mut state = self.state.write();
        let record = state
            .employees
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Self::not_found(id))?;

        record.name = payload.name.to_string();
        record.email = payload.email.to_string();
        record.department = payload.department.to_string();
        record.role = payload.role.to_string();
        record.salary = payload.salary;
        record.join_date = payload.join_date;
        record.phone = payload.phone.to_string();
        record.address = Some(payload.address.to_string());
        // absent photo leaves the stored one untouched
        if let Some(photo) = payload.photo {
            record.photo = Some(photo.to_string());
        }
        record.updated_at = Some(Utc::now().to_rfc3339());
        Ok(record.clone())
    }

    async fn soft_delete(&self, session: &Session, id: &str) -> DirectoryResult<()> {
        self.authorize(session)?;
        self.set_status(id, EmployeeStatus::Inactive)
    }

    async fn restore(&self, session: &Session, id: &str) -> DirectoryResult<()> {
        self.authorize(session)?;
        self.set_status(id, EmployeeStatus::Active).map_err(|e| match e {
            DirectoryError::Validation { status, detail, .. } => DirectoryError::Validation {
                status,
                endpoint: restore_path(id),
                detail,
            },
            other => other,
        })
    }

    async fn upload(&self, session: &Session, file: UploadFile) -> DirectoryResult<UploadReceipt> {
        self.authorize(session)?;
        if file.bytes.is_empty() {
            return Err(DirectoryError::Validation {
                status: 400,
                endpoint: UPLOAD_PATH.to_string(),
                detail: Some("Empty file".to_string()),
            });
        }
        let ext = file.file_name.rsplit('.').next().unwrap_or("bin");
        let filename = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        self.state.write().uploads.push(file.file_name);
        Ok(UploadReceipt {
            url: Some(format!("/api/uploads/{}", filename)),
            filename: Some(filename),
        })
    }
}
