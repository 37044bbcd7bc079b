//! HTTP client for the remote record store.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    employee_path, restore_path, RecordRepository, Session, ADD_PATH, AUTH_ME_PATH, COUNT_PATH,
    DEPARTMENTS_PATH, LIST_PATH, UPLOAD_PATH,
};
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{
    CurrentUser, EmployeePayload, EmployeeRecord, FilterCriteria, UploadFile, UploadReceipt,
};

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct DepartmentsResponse {
    #[serde(default)]
    departments: Vec<String>,
}

/// Record store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
    /// Base URL without its trailing slash; any path prefix is kept
    origin: String,
}

impl HttpRepository {
    /// Create a client for the store at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid store URL '{}': {}", base_url, e))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("staffdir/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        let origin = base_url.as_str().trim_end_matches('/').to_string();

        Ok(Self { client, origin })
    }

    fn url(&self, path: &str) -> DirectoryResult<Url> {
        Url::parse(&format!("{}{}", self.origin, path)).map_err(|e| {
            DirectoryError::InvalidResponse {
                endpoint: path.to_string(),
                message: format!("cannot build URL: {}", e),
            }
        })
    }

    fn authorized(&self, request: RequestBuilder, session: &Session) -> DirectoryResult<RequestBuilder> {
        let token = session.bearer()?;
        Ok(request.bearer_auth(token))
    }

    /// Send an authenticated request and decode a JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
        session: &Session,
    ) -> DirectoryResult<T> {
        let request = self.authorized(request, session)?;
        debug!(endpoint = path, "Sending store request");

        let response = request.send().await.map_err(|e| {
            warn!(endpoint = path, error = %e, "No response from record store");
            DirectoryError::transport(path, &e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = path, status = status.as_u16(), "Record store returned an error");
            return Err(DirectoryError::from_status(status.as_u16(), path, &body));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DirectoryError::transport(path, &e))?;
        serde_json::from_slice(&body).map_err(|e| DirectoryError::InvalidResponse {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RecordRepository for HttpRepository {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn current_user(&self, session: &Session) -> DirectoryResult<CurrentUser> {
        let request = self.client.get(self.url(AUTH_ME_PATH)?);
        self.send(AUTH_ME_PATH, request, session).await
    }

    async fn count(&self, session: &Session, criteria: &FilterCriteria) -> DirectoryResult<u64> {
        let request = self
            .client
            .get(self.url(COUNT_PATH)?)
            .query(&criteria.count_params());
        let response: CountResponse = self.send(COUNT_PATH, request, session).await?;
        Ok(response.count)
    }

    async fn list(
        &self,
        session: &Session,
        criteria: &FilterCriteria,
    ) -> DirectoryResult<Vec<EmployeeRecord>> {
        let request = self
            .client
            .get(self.url(LIST_PATH)?)
            .query(&criteria.list_params());
        self.send(LIST_PATH, request, session).await
    }

    async fn get(&self, session: &Session, id: &str) -> DirectoryResult<EmployeeRecord> {
        let path = employee_path(id);
        let request = self.client.get(self.url(&path)?);
        self.send(&path, request, session).await
    }

    async fn departments(&self, session: &Session) -> DirectoryResult<Vec<String>> {
        let request = self.client.get(self.url(DEPARTMENTS_PATH)?);
        let response: DepartmentsResponse = self.send(DEPARTMENTS_PATH, request, session).await?;
        Ok(response.departments)
    }

    async fn add(
        &self,
        session: &Session,
        payload: &EmployeePayload<'_>,
    ) -> DirectoryResult<EmployeeRecord> {
        let request = self.client.post(self.url(ADD_PATH)?).json(payload);
        self.send(ADD_PATH, request, session).await
    }

    async fn update(
        &self,
        session: &Session,
        id: &str,
        payload: &EmployeePayload<'_>,
    ) -> DirectoryResult<EmployeeRecord> {
        let path = employee_path(id);
        let request = self.client.put(self.url(&path)?).json(payload);
        self.send(&path, request, session).await
    }

    async fn soft_delete(&self, session: &Session, id: &str) -> DirectoryResult<()> {
        let path = employee_path(id);
        let request = self.client.delete(self.url(&path)?);
        let _: serde_json::Value = self.send(&path, request, session).await?;
        Ok(())
    }

    async fn restore(&self, session: &Session, id: &str) -> DirectoryResult<()> {
        let path = restore_path(id);
        let request = self
            .client
            .post(self.url(&path)?)
            .json(&serde_json::json!({}));
        let _: serde_json::Value = self.send(&path, request, session).await?;
        Ok(())
    }

    async fn upload(&self, session: &Session, file: UploadFile) -> DirectoryResult<UploadReceipt> {
        let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(content_type) = file.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| DirectoryError::Upload(format!("invalid content type: {}", e)))?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self.client.post(self.url(UPLOAD_PATH)?).multipart(form);
        self.send(UPLOAD_PATH, request, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_strips_trailing_slash() {
        let repo = HttpRepository::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(repo.origin(), "http://localhost:8000");
        assert_eq!(
            repo.url(LIST_PATH).unwrap().as_str(),
            "http://localhost:8000/api/employees/list"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let repo = HttpRepository::new("https://corp.example/hr/", Duration::from_secs(5)).unwrap();
        assert_eq!(repo.origin(), "https://corp.example/hr");
        assert_eq!(
            repo.url(LIST_PATH).unwrap().as_str(),
            "https://corp.example/hr/api/employees/list"
        );
        assert_eq!(
            repo.url(&restore_path("a/b")).unwrap().as_str(),
            "https://corp.example/hr/api/employees/a%2Fb/restore"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpRepository::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_io() {
        // Port 9 (discard) is never contacted: the credential check comes first.
        let repo = HttpRepository::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let result = repo.departments(&Session::anonymous()).await;
        assert!(matches!(result, Err(DirectoryError::MissingCredential)));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        let repo = HttpRepository::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = repo
            .count(&Session::with_token("t"), &FilterCriteria::default())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.describe().contains(COUNT_PATH));
    }
}
