//! Error taxonomy for the directory controller and the record store client.
//!
//! Every failure is handled at the operation boundary and surfaced as a single
//! inline message; `describe()` produces that message.

use serde_json::Value;
use thiserror::Error;

/// What went wrong when no response was received at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Connect,
    Timeout,
    Request,
    Body,
    Other,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Connect => "ECONNREFUSED",
            TransportKind::Timeout => "ETIMEDOUT",
            TransportKind::Request => "ERR_REQUEST",
            TransportKind::Body => "ERR_BODY",
            TransportKind::Other => "ERR_NETWORK",
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else if err.is_body() {
            TransportKind::Body
        } else if err.is_request() {
            TransportKind::Request
        } else {
            TransportKind::Other
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum DirectoryError {
    /// No response was received (network failure, timeout)
    #[error("Network error ({}) requesting {endpoint}: {message}", .kind.as_str())]
    Transport {
        kind: TransportKind,
        endpoint: String,
        message: String,
    },

    /// 4xx response, usually with a structured detail
    #[error("Request rejected ({status}) by {endpoint}{}", fmt_detail(.detail))]
    Validation {
        status: u16,
        endpoint: String,
        detail: Option<String>,
    },

    /// 5xx response
    #[error("Server error ({status}) from {endpoint}{}", fmt_detail(.detail))]
    Server {
        status: u16,
        endpoint: String,
        detail: Option<String>,
    },

    /// The bearer token was rejected
    #[error("Session expired or token rejected. Please sign in again.")]
    AuthExpired,

    /// No bearer token in the session
    #[error("Not signed in: no bearer token available")]
    MissingCredential,

    #[error("Failed to upload image: {0}")]
    Upload(String),

    #[error("An upload is already in progress")]
    UploadInFlight,

    /// The print context could not be opened
    #[error("Popup blocked. Please allow popups to print or export to PDF.")]
    PopupBlocked,

    #[error("Export failed: {0}")]
    Export(String),

    /// Client-side required-field or shape check failed
    #[error("{0}")]
    InvalidDraft(String),

    #[error("Page {page} is out of range (1..={total_pages})")]
    PageOutOfRange { page: u32, total_pages: u32 },

    #[error("No add or edit form is open")]
    NoOpenForm,

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

fn fmt_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    /// Map a reqwest failure where no response was received.
    pub fn transport(endpoint: &str, err: &reqwest::Error) -> Self {
        DirectoryError::Transport {
            kind: TransportKind::from_reqwest(err),
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }

    /// Map a non-success status and its body text.
    pub fn from_status(status: u16, endpoint: &str, body: &str) -> Self {
        let detail = extract_detail(body);
        match status {
            401 => DirectoryError::AuthExpired,
            400..=499 => DirectoryError::Validation {
                status,
                endpoint: endpoint.to_string(),
                detail,
            },
            _ => DirectoryError::Server {
                status,
                endpoint: endpoint.to_string(),
                detail,
            },
        }
    }

    /// The structured detail supplied by the store, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            DirectoryError::Validation { detail, .. } | DirectoryError::Server { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DirectoryError::Transport { .. })
    }

    /// The single user-visible message for a failed list fetch.
    ///
    /// Priority: store detail, then the failure message; transport failures
    /// carry their code and endpoint in the failure message itself.
    pub fn describe(&self) -> String {
        match self.detail() {
            Some(detail) => detail.to_string(),
            None => self.to_string(),
        }
    }

    /// Message for a failed mutation: store detail, else the fallback.
    ///
    /// Transport failures keep their code and endpoint after the fallback, and
    /// client-side failures keep their own wording.
    pub fn describe_or(&self, fallback: &str) -> String {
        if let Some(detail) = self.detail() {
            return detail.to_string();
        }
        match self {
            DirectoryError::Transport { .. } => format!("{}: {}", fallback, self),
            DirectoryError::AuthExpired
            | DirectoryError::MissingCredential
            | DirectoryError::InvalidDraft(_)
            | DirectoryError::NoOpenForm
            | DirectoryError::UploadInFlight
            | DirectoryError::Upload(_)
            | DirectoryError::PopupBlocked
            | DirectoryError::Export(_) => self.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// Pull the `detail` field out of an error body.
///
/// Accepts `{"detail": "text"}` and the list form used for field validation,
/// `{"detail": [{"loc": [...], "msg": "..."}]}`.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let msg = item.get("msg")?.as_str()?;
                    let field = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .and_then(|loc| loc.last())
                        .and_then(Value::as_str);
                    Some(match field {
                        Some(field) => format!("{}: {}", field, msg),
                        None => msg.to_string(),
                    })
                })
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}
