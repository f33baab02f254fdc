use std::fmt;

use uocc_recon::SheetError;

/// Error type for remote service calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Request never got an HTTP answer
    Network(String),
    /// Non-2xx status with response body
    Http(u16, String),
    /// Body was not what the API documents
    Parse(String),
    /// Credentials rejected or token unavailable
    Auth(String),
    /// 200 response carrying an API-level error object
    Remote { code: i64, message: String },
    /// Local file I/O
    Io(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Network(msg) => write!(f, "Network error: {msg}"),
            ServiceError::Http(code, msg) => write!(f, "HTTP {code}: {msg}"),
            ServiceError::Parse(msg) => write!(f, "Parse error: {msg}"),
            ServiceError::Auth(msg) => write!(f, "Authentication failed: {msg}"),
            ServiceError::Remote { code, message } => write!(f, "Service error {code}: {message}"),
            ServiceError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ServiceError> for SheetError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Http(404, body) => SheetError::NotFound(body),
            ServiceError::Parse(msg) => SheetError::Malformed(msg),
            other => SheetError::Backend(other.to_string()),
        }
    }
}
