//! Add, update, soft-delete and restore.
//!
//! Each mutation is one store round trip followed by a full list refresh on
//! success. Rows are never patched locally, and a failed mutation leaves the
//! open form exactly as it was with only the inline error set.

use std::sync::atomic::Ordering;
use tracing::{info, warn};

use super::{Confirm, Directory};
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{EmployeePayload, EmployeeRecord, FormDraft};
use crate::store::RecordRepository;

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this employee?";
pub const RESTORE_PROMPT: &str = "Activate this employee again?";

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Add,
    /// Editing the record with this id
    Edit { id: String, name: String },
}

/// An open add or edit form and its draft.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenForm {
    /// Distinct for every form opened by the same directory
    pub id: u64,
    pub kind: FormKind,
    pub draft: FormDraft,
}

impl<R: RecordRepository> Directory<R> {
    pub fn open_add_form(&self) {
        *self.form.lock() = Some(OpenForm {
            id: self.next_form_id(),
            kind: FormKind::Add,
            draft: FormDraft::default(),
        });
        self.upload.reset();
    }

    pub fn open_edit_form(&self, record: &EmployeeRecord) {
        *self.form.lock() = Some(OpenForm {
            id: self.next_form_id(),
            kind: FormKind::Edit {
                id: record.id.clone(),
                name: record.name.clone(),
            },
            draft: FormDraft::from_record(record),
        });
        self.upload.reset();
    }

    /// Discard the open form and its draft.
    pub fn cancel_form(&self) {
        *self.form.lock() = None;
        self.upload.reset();
    }

    pub fn form(&self) -> Option<OpenForm> {
        self.form.lock().clone()
    }

    /// Apply `edit` to the open draft.
    pub fn edit_draft(&self, edit: impl FnOnce(&mut FormDraft)) -> DirectoryResult<()> {
        let mut form = self.form.lock();
        let open = form.as_mut().ok_or(DirectoryError::NoOpenForm)?;
        edit(&mut open.draft);
        Ok(())
    }

    /// Copy of the open draft when the open form is the kind being submitted.
    fn draft_for_submit(&self, adding: bool) -> DirectoryResult<(Option<String>, FormDraft)> {
        let form = self.form.lock();
        match form.as_ref() {
            Some(OpenForm {
                kind: FormKind::Add,
                draft,
                ..
            }) if adding => Ok((None, draft.clone())),
            Some(OpenForm {
                kind: FormKind::Edit { id, .. },
                draft,
                ..
            }) if !adding => Ok((Some(id.clone()), draft.clone())),
            _ => Err(DirectoryError::NoOpenForm),
        }
    }

    fn check_draft(&self, draft: &FormDraft) -> DirectoryResult<()> {
        if let Err(message) = draft.check() {
            self.set_error(message.clone());
            return Err(DirectoryError::InvalidDraft(message));
        }
        Ok(())
    }

    /// Submit the add form.
    ///
    /// On success the form closes, the page resets to 1 and the list refreshes.
    pub async fn add(&self) -> DirectoryResult<EmployeeRecord> {
        let (_, draft) = self.draft_for_submit(true)?;
        self.check_draft(&draft)?;
        let payload = EmployeePayload::from_draft(&draft)
            .ok_or_else(|| DirectoryError::InvalidDraft("Missing required fields".to_string()))?;

        match self.repo.add(&self.session, &payload).await {
            Ok(record) => {
                info!(id = %record.id, emp_code = %record.emp_code, "Employee added");
                self.close_form_if(|kind| *kind == FormKind::Add);
                self.filter.lock().reset_page();
                self.clear_error();
                self.refresh_after_mutation().await;
                Ok(record)
            }
            Err(err) => {
                warn!(error = %err, "Add employee failed");
                self.set_error(err.describe_or("Failed to add employee"));
                Err(err)
            }
        }
    }

    /// Submit the edit form for the record being edited. The page is kept.
    pub async fn update(&self) -> DirectoryResult<EmployeeRecord> {
        let (id, draft) = self.draft_for_submit(false)?;
        let id = id.ok_or(DirectoryError::NoOpenForm)?;
        self.check_draft(&draft)?;
        let payload = EmployeePayload::from_draft(&draft)
            .ok_or_else(|| DirectoryError::InvalidDraft("Missing required fields".to_string()))?;

        match self.repo.update(&self.session, &id, &payload).await {
            Ok(record) => {
                info!(id = %record.id, "Employee updated");
                self.close_form_if(|kind| matches!(kind, FormKind::Edit { id: open, .. } if *open == id));
                self.clear_error();
                self.refresh_after_mutation().await;
                Ok(record)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "Update employee failed");
                self.set_error(err.describe_or("Failed to update employee"));
                Err(err)
            }
        }
    }

    /// Mark a record inactive after the operator confirms.
    ///
    /// Returns `Ok(false)` when the operator declined.
    pub async fn soft_delete(&self, id: &str, confirm: &dyn Confirm) -> DirectoryResult<bool> {
        if !confirm.confirm(DELETE_PROMPT) {
            return Ok(false);
        }
        match self.repo.soft_delete(&self.session, id).await {
            Ok(()) => {
                info!(id, "Employee deactivated");
                self.clear_error();
                self.refresh_after_mutation().await;
                Ok(true)
            }
            Err(err) => {
                warn!(id, error = %err, "Delete employee failed");
                self.set_error(err.describe_or("Failed to delete employee"));
                Err(err)
            }
        }
    }

    /// Return a record to active after the operator confirms.
    pub async fn restore(&self, id: &str, confirm: &dyn Confirm) -> DirectoryResult<bool> {
        if !confirm.confirm(RESTORE_PROMPT) {
            return Ok(false);
        }
        match self.repo.restore(&self.session, id).await {
            Ok(()) => {
                info!(id, "Employee activated");
                self.clear_error();
                self.refresh_after_mutation().await;
                Ok(true)
            }
            Err(err) => {
                warn!(id, error = %err, "Restore employee failed");
                self.set_error(err.describe_or("Failed to activate employee"));
                Err(err)
            }
        }
    }

    fn next_form_id(&self) -> u64 {
        self.form_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn close_form_if(&self, matches_kind: impl FnOnce(&FormKind) -> bool) {
        let mut form = self.form.lock();
        if form.as_ref().is_some_and(|open| matches_kind(&open.kind)) {
            *form = None;
        }
    }

    /// The mutation already succeeded; a failed refresh only sets the message.
    async fn refresh_after_mutation(&self) {
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "Refresh after mutation failed");
        }
    }
}
