//! Employee directory controller.
//!
//! [`Directory`] ties the filter state, the list synchronizer, the CRUD
//! operations, the upload coordinator and the export engine together behind
//! one object that a front end drives and renders from.

pub mod crud;
pub mod export;
pub mod filter;
pub mod sync;
pub mod upload;

pub use crud::{FormKind, OpenForm, DELETE_PROMPT, RESTORE_PROMPT};
pub use export::{ExportArtifact, ExportEngine, ExportFormat, PrintSurface, PrintWindow};
pub use filter::{FilterState, SearchDebounce};
pub use sync::{FetchOutcome, ListRequest, ListSynchronizer};
pub use upload::{normalize_locator, UploadCoordinator, UploadState};

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{
    EmployeeStatus, FilterCriteria, ListViewModel, SortField, SortOrder, UploadFile,
};
use crate::store::{RecordRepository, Session};

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Operator confirmation for destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryOptions {
    /// Criteria of the first fetch
    pub criteria: FilterCriteria,
    pub search_debounce: Duration,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            criteria: FilterCriteria::default(),
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
        }
    }
}

pub struct Directory<R> {
    repo: R,
    session: Session,
    filter: Mutex<FilterState>,
    sync: ListSynchronizer,
    form: Mutex<Option<OpenForm>>,
    form_seq: AtomicU64,
    upload: UploadCoordinator,
    departments: RwLock<Vec<String>>,
    /// The single inline message of the view
    error: Mutex<Option<String>>,
    debounce: SearchDebounce,
}

impl<R: RecordRepository> Directory<R> {
    pub fn new(repo: R, session: Session, options: DirectoryOptions) -> Self {
        Self {
            repo,
            session,
            filter: Mutex::new(FilterState::new(options.criteria)),
            sync: ListSynchronizer::new(),
            form: Mutex::new(None),
            form_seq: AtomicU64::new(0),
            upload: UploadCoordinator::new(),
            departments: RwLock::new(Vec::new()),
            error: Mutex::new(None),
            debounce: SearchDebounce::new(options.search_debounce),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ---------------------------------------------------------------------
    // List
    // ---------------------------------------------------------------------

    /// Fetch the page for the current criteria.
    ///
    /// A response superseded by a newer request is not an error. When the
    /// applied total shows the requested page no longer exists, the page is
    /// clamped and fetched once more.
    pub async fn refresh(&self) -> DirectoryResult<()> {
        self.clear_error();
        let criteria = self.filter.lock().snapshot();
        match self.sync.fetch(&self.repo, &self.session, criteria).await {
            FetchOutcome::Applied {
                total_count,
                page_size,
            } => {
                let clamped = self.filter.lock().observe_total(total_count, page_size);
                match clamped {
                    Some(page) => {
                        debug!(page, total_count, "Requested page past the end, refetching");
                        let criteria = self.filter.lock().snapshot();
                        let outcome = self.sync.fetch(&self.repo, &self.session, criteria).await;
                        self.settle(outcome)
                    }
                    None => Ok(()),
                }
            }
            outcome => self.settle(outcome),
        }
    }

    fn settle(&self, outcome: FetchOutcome) -> DirectoryResult<()> {
        match outcome {
            FetchOutcome::Applied {
                total_count,
                page_size,
            } => {
                self.filter.lock().observe_total(total_count, page_size);
                Ok(())
            }
            FetchOutcome::Superseded => Ok(()),
            FetchOutcome::Failed(err) => {
                self.set_error(err.describe());
                Err(err)
            }
        }
    }

    async fn refresh_if(&self, changed: bool) -> DirectoryResult<()> {
        if changed {
            self.refresh().await
        } else {
            Ok(())
        }
    }

    pub async fn set_search(&self, text: impl Into<String>) -> DirectoryResult<()> {
        let changed = self.filter.lock().set_search(text);
        self.refresh_if(changed).await
    }

    /// Debounced search for keystroke-driven input.
    ///
    /// Returns `Ok(false)` when a later keystroke superseded this one.
    pub async fn type_search(&self, text: impl Into<String>) -> DirectoryResult<bool> {
        let text = text.into();
        if !self.debounce.settle().await {
            debug!(text = %text, "Search keystroke superseded");
            return Ok(false);
        }
        self.set_search(text).await?;
        Ok(true)
    }

    pub async fn set_department(&self, department: impl Into<String>) -> DirectoryResult<()> {
        let changed = self.filter.lock().set_department(department);
        self.refresh_if(changed).await
    }

    pub async fn set_status(&self, status: Option<EmployeeStatus>) -> DirectoryResult<()> {
        let changed = self.filter.lock().set_status(status);
        self.refresh_if(changed).await
    }

    pub async fn set_page(&self, page: u32) -> DirectoryResult<()> {
        let changed = self.filter.lock().set_page(page)?;
        self.refresh_if(changed).await
    }

    pub async fn set_page_size(&self, page_size: u32) -> DirectoryResult<()> {
        let changed = self.filter.lock().set_page_size(page_size)?;
        self.refresh_if(changed).await
    }

    pub async fn set_sort(&self, field: SortField, order: SortOrder) -> DirectoryResult<()> {
        let changed = self.filter.lock().set_sort(field, order);
        self.refresh_if(changed).await
    }

    pub async fn next_page(&self) -> DirectoryResult<()> {
        let changed = self.filter.lock().next_page();
        self.refresh_if(changed).await
    }

    pub async fn prev_page(&self) -> DirectoryResult<()> {
        let changed = self.filter.lock().prev_page();
        self.refresh_if(changed).await
    }

    /// Refresh the department options. A failure keeps the previous list.
    pub async fn load_departments(&self) -> Vec<String> {
        match self.repo.departments(&self.session).await {
            Ok(departments) => {
                debug!(count = departments.len(), "Loaded departments");
                *self.departments.write() = departments.clone();
                departments
            }
            Err(err) => {
                warn!(error = %err, "Failed to fetch departments");
                self.departments.read().clone()
            }
        }
    }

    pub fn departments(&self) -> Vec<String> {
        self.departments.read().clone()
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.filter.lock().snapshot()
    }

    pub fn view(&self) -> ListViewModel {
        self.sync.view()
    }

    pub fn is_loading(&self) -> bool {
        self.sync.is_loading()
    }

    // ---------------------------------------------------------------------
    // Inline error
    // ---------------------------------------------------------------------

    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    pub fn clear_error(&self) {
        *self.error.lock() = None;
    }

    fn set_error(&self, message: impl Into<String>) {
        *self.error.lock() = Some(message.into());
    }

    // ---------------------------------------------------------------------
    // Photo upload
    // ---------------------------------------------------------------------

    /// Upload `file` and write its URL into the open form's photo.
    ///
    /// The draft is patched only if the form that was open when the upload
    /// started is still open; on failure the photo is left unchanged.
    pub async fn select_photo(&self, file: UploadFile) -> DirectoryResult<String> {
        let form_id = self
            .form
            .lock()
            .as_ref()
            .map(|open| open.id)
            .ok_or(DirectoryError::NoOpenForm)?;

        match self.upload.upload(&self.repo, &self.session, file).await {
            Ok(url) => {
                let mut form = self.form.lock();
                match form.as_mut() {
                    Some(open) if open.id == form_id => open.draft.photo = Some(url.clone()),
                    _ => debug!(url = %url, form_id, "Form closed during upload, photo not applied"),
                }
                Ok(url)
            }
            Err(err) => {
                self.set_error(err.describe_or("Failed to upload image"));
                Err(err)
            }
        }
    }

    pub fn upload_state(&self) -> UploadState {
        self.upload.state()
    }

    /// URL of the photo currently held by the open draft.
    pub fn photo_preview(&self) -> Option<String> {
        self.form
            .lock()
            .as_ref()
            .and_then(|open| open.draft.photo.clone())
            .filter(|p| !p.is_empty())
    }

    // ---------------------------------------------------------------------
    // Export
    // ---------------------------------------------------------------------

    /// Render the current page. `None` when there is nothing to export.
    pub fn export(&self, format: ExportFormat) -> Option<ExportArtifact> {
        let (view, loading) = self.sync.snapshot();
        let artifact = match format {
            ExportFormat::Csv => ExportEngine::csv(&view, loading),
            ExportFormat::Excel => ExportEngine::excel(&view, loading),
            ExportFormat::Print => ExportEngine::printable(&view, loading),
        };
        if let Some(artifact) = &artifact {
            info!(file = %artifact.file_name, rows = view.rows.len(), "Exported page");
        }
        artifact
    }

    /// Send the current page to `surface` for printing.
    pub fn print(&self, surface: &dyn PrintSurface) -> DirectoryResult<bool> {
        let (view, loading) = self.sync.snapshot();
        ExportEngine::print(&view, loading, surface).map_err(|err| {
            self.set_error(err.to_string());
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CurrentUser, EmployeePayload, EmployeeRecord, FormDraft, UploadReceipt,
    };
    use crate::store::MemoryRepository;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn draft(name: &str, email: &str, department: &str) -> FormDraft {
        FormDraft {
            name: name.to_string(),
            email: email.to_string(),
            department: department.to_string(),
            role: "Dev".to_string(),
            salary: Some(1000.0),
            join_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        }
    }

    async fn seeded(count: usize) -> MemoryRepository {
        let repo = MemoryRepository::default();
        let session = Session::with_token("t");
        for i in 0..count {
            let department = if i % 2 == 0 { "Eng" } else { "Ops" };
            let d = draft(&format!("Person {:02}", i), &format!("p{}@x.com", i), department);
            let payload = EmployeePayload::from_draft(&d).unwrap();
            repo.add(&session, &payload).await.unwrap();
        }
        repo
    }

    fn directory<R: RecordRepository>(repo: R) -> Directory<R> {
        Directory::new(
            repo,
            Session::with_token("t"),
            DirectoryOptions {
                search_debounce: Duration::from_millis(20),
                ..Default::default()
            },
        )
    }

    /// Holds list calls whose search matches `held`, and uploads of a file
    /// named `held`, until released.
    struct GatedRepository {
        inner: MemoryRepository,
        held: String,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl RecordRepository for GatedRepository {
        fn origin(&self) -> &str {
            self.inner.origin()
        }

        async fn current_user(&self, session: &Session) -> DirectoryResult<CurrentUser> {
            self.inner.current_user(session).await
        }

        async fn count(&self, session: &Session, criteria: &FilterCriteria) -> DirectoryResult<u64> {
            self.inner.count(session, criteria).await
        }

        async fn list(
            &self,
            session: &Session,
            criteria: &FilterCriteria,
        ) -> DirectoryResult<Vec<EmployeeRecord>> {
            if criteria.search_text == self.held {
                self.gate.notified().await;
            }
            self.inner.list(session, criteria).await
        }

        async fn get(&self, session: &Session, id: &str) -> DirectoryResult<EmployeeRecord> {
            self.inner.get(session, id).await
        }

        async fn departments(&self, session: &Session) -> DirectoryResult<Vec<String>> {
            self.inner.departments(session).await
        }

        async fn add(
            &self,
            session: &Session,
            payload: &EmployeePayload<'_>,
        ) -> DirectoryResult<EmployeeRecord> {
            self.inner.add(session, payload).await
        }

        async fn update(
            &self,
            session: &Session,
            id: &str,
            payload: &EmployeePayload<'_>,
        ) -> DirectoryResult<EmployeeRecord> {
            self.inner.update(session, id, payload).await
        }

        async fn soft_delete(&self, session: &Session, id: &str) -> DirectoryResult<()> {
            self.inner.soft_delete(session, id).await
        }

        async fn restore(&self, session: &Session, id: &str) -> DirectoryResult<()> {
            self.inner.restore(session, id).await
        }

        async fn upload(&self, session: &Session, file: UploadFile) -> DirectoryResult<UploadReceipt> {
            if file.file_name == self.held {
                self.gate.notified().await;
            }
            self.inner.upload(session, file).await
        }
    }

    #[tokio::test]
    async fn test_later_request_wins_when_earlier_resolves_last() {
        let gate = Arc::new(Notify::new());
        let dir = directory(GatedRepository {
            inner: seeded(6).await,
            held: "Person 01".to_string(),
            gate: gate.clone(),
        });

        let first = dir.set_search("Person 01");
        let second = async {
            tokio::task::yield_now().await;
            let result = dir.set_search("Person 02").await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();

        let view = dir.view();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].name, "Person 02");
        assert!(!dir.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_bounds_rows_and_page() {
        let dir = directory(seeded(23).await);
        dir.refresh().await.unwrap();
        let view = dir.view();
        assert_eq!(view.rows.len(), 10);
        assert_eq!(view.total_count, 23);
        assert_eq!(view.total_pages(), 3);
        assert_eq!(view.summary(), "Page 1 of 3 (Total: 23)");
    }

    #[tokio::test]
    async fn test_page_clamped_after_page_size_grows() {
        let dir = directory(seeded(23).await);
        dir.refresh().await.unwrap();
        dir.set_page(3).await.unwrap();
        assert_eq!(dir.view().rows.len(), 3);

        dir.set_page_size(20).await.unwrap();
        assert_eq!(dir.criteria().page, 2);
        let view = dir.view();
        assert_eq!(view.page, 2);
        assert_eq!(view.rows.len(), 3);
    }

    #[tokio::test]
    async fn test_filter_change_resets_page_and_refetches() {
        let dir = directory(seeded(23).await);
        dir.refresh().await.unwrap();
        dir.next_page().await.unwrap();
        assert_eq!(dir.view().page, 2);

        dir.set_department("Ops").await.unwrap();
        let view = dir.view();
        assert_eq!(view.page, 1);
        assert_eq!(view.total_count, 11);
        assert!(view.rows.iter().all(|r| r.department == "Ops"));
    }

    #[tokio::test]
    async fn test_set_page_out_of_range_is_rejected() {
        let dir = directory(seeded(5).await);
        dir.refresh().await.unwrap();
        assert!(matches!(
            dir.set_page(2).await,
            Err(DirectoryError::PageOutOfRange { page: 2, total_pages: 1 })
        ));
        assert_eq!(dir.criteria().page, 1);
    }

    #[tokio::test]
    async fn test_type_search_applies_last_keystroke() {
        let dir = directory(seeded(12).await);
        let (a, b) = tokio::join!(dir.type_search("Person 1"), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            dir.type_search("Person 11").await
        });
        assert!(!a.unwrap());
        assert!(b.unwrap());
        assert_eq!(dir.criteria().search_text, "Person 11");
        assert_eq!(dir.view().rows.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_token_keeps_view_and_sets_error() {
        let repo = seeded(3).await.with_accepted_token("t");
        let dir = directory(repo);
        dir.refresh().await.unwrap();

        let stale = Directory::new(
            seeded(3).await.with_accepted_token("other"),
            Session::with_token("t"),
            DirectoryOptions::default(),
        );
        assert!(matches!(stale.refresh().await, Err(DirectoryError::AuthExpired)));
        assert!(stale.view().rows.is_empty());
        assert!(stale.error().unwrap().contains("sign in"));
        assert!(!stale.is_loading());
        assert_eq!(dir.view().rows.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_fetch() {
        let dir = Directory::new(
            seeded(2).await,
            Session::anonymous(),
            DirectoryOptions::default(),
        );
        assert!(matches!(dir.refresh().await, Err(DirectoryError::MissingCredential)));
        assert_eq!(dir.view().total_count, 0);
    }

    #[tokio::test]
    async fn test_departments_load_and_survive_failure() {
        let dir = directory(seeded(4).await);
        assert_eq!(dir.load_departments().await, vec!["Eng", "Ops"]);

        let anonymous = Directory::new(
            seeded(4).await,
            Session::anonymous(),
            DirectoryOptions::default(),
        );
        assert!(anonymous.load_departments().await.is_empty());
        assert!(anonymous.error().is_none());
    }

    #[tokio::test]
    async fn test_exports_are_noops_on_empty_page() {
        let dir = directory(MemoryRepository::default());
        dir.refresh().await.unwrap();
        assert!(dir.export(ExportFormat::Csv).is_none());
        assert!(dir.export(ExportFormat::Excel).is_none());
        assert!(dir.export(ExportFormat::Print).is_none());
    }

    #[tokio::test]
    async fn test_export_covers_current_page_only() {
        let dir = directory(seeded(15).await);
        dir.refresh().await.unwrap();
        dir.next_page().await.unwrap();
        let csv = dir.export(ExportFormat::Csv).unwrap();
        assert_eq!(csv.file_name, "employees_page2.csv");
        assert_eq!(csv.content.lines().count(), 6);
    }

    struct Blocked;

    impl PrintSurface for Blocked {
        fn open_window(&self, _title: &str) -> Option<Box<dyn PrintWindow + '_>> {
            None
        }
    }

    #[tokio::test]
    async fn test_blocked_print_sets_error() {
        let dir = directory(seeded(2).await);
        dir.refresh().await.unwrap();
        assert!(matches!(dir.print(&Blocked), Err(DirectoryError::PopupBlocked)));
        assert_eq!(
            dir.error().as_deref(),
            Some("Popup blocked. Please allow popups to print or export to PDF.")
        );
    }

    #[tokio::test]
    async fn test_select_photo_patches_open_draft() {
        let dir = directory(MemoryRepository::new("http://store:8000"));
        assert!(matches!(
            dir.select_photo(UploadFile::new("a.png", vec![1])).await,
            Err(DirectoryError::NoOpenForm)
        ));

        dir.open_add_form();
        let url = dir
            .select_photo(UploadFile::new("a.png", vec![1, 2, 3]))
            .await
            .unwrap();
        assert!(url.starts_with("http://store:8000/api/uploads/"));
        assert_eq!(dir.photo_preview(), Some(url.clone()));
        assert_eq!(dir.form().unwrap().draft.photo, Some(url));
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_photo_unchanged() {
        let dir = directory(MemoryRepository::default());
        dir.open_add_form();
        dir.edit_draft(|d| d.photo = Some("http://old/p.png".to_string()))
            .unwrap();

        let err = dir
            .select_photo(UploadFile::new("empty.png", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Upload(_)));
        assert_eq!(dir.photo_preview().as_deref(), Some("http://old/p.png"));
        assert_eq!(dir.error().as_deref(), Some("Failed to upload image: Empty file"));
    }

    #[tokio::test]
    async fn test_upload_for_cancelled_form_skips_reopened_form() {
        let gate = Arc::new(Notify::new());
        let dir = directory(GatedRepository {
            inner: MemoryRepository::default(),
            held: "old.png".to_string(),
            gate: gate.clone(),
        });
        dir.open_add_form();
        let first_form = dir.form().unwrap().id;

        let upload = dir.select_photo(UploadFile::new("old.png", vec![1, 2]));
        let reopen = async {
            tokio::task::yield_now().await;
            assert!(dir.upload_state().is_uploading());
            dir.cancel_form();
            dir.open_add_form();
            gate.notify_one();
        };
        let (url, ()) = tokio::join!(upload, reopen);
        url.unwrap();

        let form = dir.form().unwrap();
        assert_ne!(form.id, first_form);
        assert_eq!(form.kind, FormKind::Add);
        assert_eq!(form.draft.photo, None);
        assert_eq!(dir.photo_preview(), None);
    }

    #[tokio::test]
    async fn test_second_photo_rejected_while_first_uploads() {
        let gate = Arc::new(Notify::new());
        let dir = directory(GatedRepository {
            inner: MemoryRepository::default(),
            held: "first.png".to_string(),
            gate: gate.clone(),
        });
        dir.open_add_form();

        let first = dir.select_photo(UploadFile::new("first.png", vec![1]));
        let second = async {
            tokio::task::yield_now().await;
            let result = dir.select_photo(UploadFile::new("second.png", vec![2])).await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(second, Err(DirectoryError::UploadInFlight)));
        let url = first.unwrap();
        assert!(url.ends_with(".png"));
        assert_eq!(dir.form().unwrap().draft.photo, Some(url.clone()));
        assert_eq!(dir.upload_state(), UploadState::Succeeded { url });
        assert_eq!(dir.repository().inner.uploads().len(), 1);
    }
}
