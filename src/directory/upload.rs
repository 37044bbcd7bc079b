//! Photo upload coordination.
//!
//! At most one upload runs per coordinator; a second selection while one is
//! in flight is rejected with `UploadInFlight`.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::UploadFile;
use crate::store::{RecordRepository, Session};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading {
        file_name: String,
    },
    Succeeded {
        url: String,
    },
    Failed {
        message: String,
    },
}

impl UploadState {
    pub fn is_uploading(&self) -> bool {
        matches!(self, UploadState::Uploading { .. })
    }
}

/// Resolve a store locator against the service origin.
pub fn normalize_locator(origin: &str, locator: &str) -> String {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        return locator.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if locator.starts_with('/') {
        format!("{}{}", origin, locator)
    } else {
        format!("{}/{}", origin, locator)
    }
}

#[derive(Debug, Default)]
pub struct UploadCoordinator {
    state: Mutex<UploadState>,
}

/// Puts the coordinator back to idle if the upload future is dropped mid-flight.
struct InFlight<'a> {
    state: &'a Mutex<UploadState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.is_uploading() {
            *state = UploadState::Idle;
        }
    }
}

impl UploadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> UploadState {
        self.state.lock().clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.state.lock().is_uploading()
    }

    /// Upload `file` and return the absolute URL of the stored copy.
    pub async fn upload<R>(&self, repo: &R, session: &Session, file: UploadFile) -> DirectoryResult<String>
    where
        R: RecordRepository + ?Sized,
    {
        {
            let mut state = self.state.lock();
            if state.is_uploading() {
                warn!(file = %file.file_name, "Upload rejected: another upload is in flight");
                return Err(DirectoryError::UploadInFlight);
            }
            *state = UploadState::Uploading {
                file_name: file.file_name.clone(),
            };
        }
        let guard = InFlight { state: &self.state };

        let file_name = file.file_name.clone();
        let result = match repo.upload(session, file).await {
            Ok(receipt) => match receipt.locator() {
                Some(locator) => Ok(normalize_locator(repo.origin(), locator)),
                None => Err(DirectoryError::Upload(
                    "store returned no file reference".to_string(),
                )),
            },
            Err(err @ (DirectoryError::AuthExpired | DirectoryError::MissingCredential)) => Err(err),
            Err(err) => Err(DirectoryError::Upload(err.describe())),
        };

        *self.state.lock() = match &result {
            Ok(url) => {
                info!(file = %file_name, url = %url, "Upload finished");
                UploadState::Succeeded { url: url.clone() }
            }
            Err(err) => {
                warn!(file = %file_name, error = %err, "Upload failed");
                UploadState::Failed {
                    message: err.to_string(),
                }
            }
        };
        drop(guard);
        result
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        if !state.is_uploading() {
            *state = UploadState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;

    #[test]
    fn test_normalize_locator() {
        assert_eq!(
            normalize_locator("http://h:8000", "/api/uploads/a.png"),
            "http://h:8000/api/uploads/a.png"
        );
        assert_eq!(normalize_locator("http://h:8000/", "a.png"), "http://h:8000/a.png");
        assert_eq!(
            normalize_locator("http://h:8000", "https://cdn.example/a.png"),
            "https://cdn.example/a.png"
        );
    }

    #[tokio::test]
    async fn test_upload_success_returns_absolute_url() {
        let repo = MemoryRepository::new("http://files.local");
        let coordinator = UploadCoordinator::new();
        let url = coordinator
            .upload(&repo, &Session::with_token("t"), UploadFile::new("me.jpg", vec![1, 2]))
            .await
            .unwrap();
        assert!(url.starts_with("http://files.local/api/uploads/"));
        assert!(url.ends_with(".jpg"));
        assert_eq!(coordinator.state(), UploadState::Succeeded { url });
    }

    #[tokio::test]
    async fn test_upload_failure_is_upload_error() {
        let repo = MemoryRepository::default();
        let coordinator = UploadCoordinator::new();
        let err = coordinator
            .upload(&repo, &Session::with_token("t"), UploadFile::new("empty.png", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Upload(ref m) if m == "Empty file"));
        assert!(matches!(coordinator.state(), UploadState::Failed { .. }));
        assert!(!coordinator.is_uploading());
    }
}
