//! List synchronization with last-wins ordering.
//!
//! Each fetch captures its criteria in an immutable [`ListRequest`] stamped
//! with a strictly increasing sequence number. The count and page queries
//! both run against that snapshot, and a response is applied only if its
//! request is still the most recently issued one.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{total_pages, EmployeeRecord, FilterCriteria, ListViewModel};
use crate::store::{RecordRepository, Session};

/// One issued fetch: sequence number plus the criteria it was built from.
#[derive(Debug, Clone)]
pub struct ListRequest {
    seq: u64,
    criteria: FilterCriteria,
}

impl ListRequest {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// The response became the current view model
    Applied { total_count: u64, page_size: u32 },
    /// A newer request was issued; the response was dropped
    Superseded,
    /// The latest request failed; the previous view model was kept
    Failed(DirectoryError),
}

#[derive(Debug, Default)]
struct SyncState {
    view: ListViewModel,
    applied_seq: u64,
    loading: bool,
}

#[derive(Debug, Default)]
pub struct ListSynchronizer {
    issued: AtomicU64,
    state: RwLock<SyncState>,
}

impl ListSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new request; every earlier one becomes stale.
    pub fn begin(&self, criteria: FilterCriteria) -> ListRequest {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().loading = true;
        debug!(seq, page = criteria.page, "Issued list request");
        ListRequest { seq, criteria }
    }

    pub fn is_latest(&self, request: &ListRequest) -> bool {
        request.seq == self.issued.load(Ordering::SeqCst)
    }

    /// Commit a response if its request is still the latest.
    pub fn apply(
        &self,
        request: &ListRequest,
        result: DirectoryResult<(u64, Vec<EmployeeRecord>)>,
    ) -> FetchOutcome {
        let mut state = self.state.write();
        // checked under the write lock so no newer apply can interleave
        if !self.is_latest(request) {
            debug!(seq = request.seq, "Discarding stale list response");
            return FetchOutcome::Superseded;
        }
        state.loading = false;

        match result {
            Ok((total_count, mut rows)) => {
                let criteria = &request.criteria;
                let page_size = criteria.page_size.max(1);
                rows.truncate(page_size as usize);
                let upper = total_pages(total_count, page_size).max(1);
                state.view = ListViewModel {
                    rows,
                    total_count,
                    page: criteria.page.clamp(1, upper),
                    page_size,
                };
                state.applied_seq = request.seq;
                debug!(
                    seq = request.seq,
                    total_count,
                    rows = state.view.rows.len(),
                    "Applied list response"
                );
                FetchOutcome::Applied {
                    total_count,
                    page_size,
                }
            }
            Err(err) => {
                warn!(seq = request.seq, error = %err, "List fetch failed");
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Issue, run and apply one fetch for `criteria`.
    pub async fn fetch<R>(&self, repo: &R, session: &Session, criteria: FilterCriteria) -> FetchOutcome
    where
        R: RecordRepository + ?Sized,
    {
        let request = self.begin(criteria);
        let result = tokio::try_join!(
            repo.count(session, &request.criteria),
            repo.list(session, &request.criteria)
        );
        self.apply(&request, result)
    }

    pub fn view(&self) -> ListViewModel {
        self.state.read().view.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    /// View model and loading flag read together.
    pub fn snapshot(&self) -> (ListViewModel, bool) {
        let state = self.state.read();
        (state.view.clone(), state.loading)
    }

    pub fn applied_seq(&self) -> u64 {
        self.state.read().applied_seq
    }
}
