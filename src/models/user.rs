use serde::{Deserialize, Serialize};

/// Profile of the operator behind the bearer token (`GET /api/auth/me`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    /// Admin, HR or Manager
    pub role: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
}

/// Response of `POST /api/upload`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl UploadReceipt {
    /// The locator to store in a draft: `url`, falling back to `filename`.
    pub fn locator(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.filename.as_deref().filter(|f| !f.is_empty()))
    }
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first()
            .map(|m| m.essence_str().to_string());
        Self {
            file_name,
            content_type,
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_prefers_url() {
        let receipt = UploadReceipt {
            filename: Some("a.png".to_string()),
            url: Some("/api/uploads/a.png".to_string()),
        };
        assert_eq!(receipt.locator(), Some("/api/uploads/a.png"));

        let receipt = UploadReceipt {
            filename: Some("a.png".to_string()),
            url: None,
        };
        assert_eq!(receipt.locator(), Some("a.png"));
        assert_eq!(UploadReceipt::default().locator(), None);
    }

    #[test]
    fn test_upload_file_guesses_content_type() {
        let file = UploadFile::new("portrait.png", vec![1, 2, 3]);
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
    }
}
