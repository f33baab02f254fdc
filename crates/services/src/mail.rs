//! Run notifications.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde_json::json;

use crate::error::ServiceError;
use crate::{check_status, http_client};

pub const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

/// Where end-of-run messages go.
pub trait Notifier {
    fn notify(&self, message: &Message) -> Result<(), ServiceError>;
}

pub struct SendGridNotifier {
    http: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
    from: String,
    to: Vec<String>,
    /// Prepended to every subject.
    prefix: String,
}

impl SendGridNotifier {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>, to: Vec<String>, prefix: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client()?,
            api_base: SENDGRID_API_BASE.to_string(),
            api_key: api_key.into(),
            from: from.into(),
            to,
            prefix: prefix.into(),
        })
    }

    pub fn with_base_url(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn payload(&self, message: &Message) -> Result<serde_json::Value, ServiceError> {
        let to: Vec<_> = self.to.iter().map(|email| json!({ "email": email })).collect();
        let mut payload = json!({
            "personalizations": [{ "to": to }],
            "from": { "email": self.from },
            "subject": format!("{}{}", self.prefix, message.subject),
            "content": [{ "type": "text/plain", "value": message.body }],
        });
        if let Some(path) = &message.attachment {
            payload["attachments"] = json!([attachment(path)?]);
        }
        Ok(payload)
    }
}

fn attachment(path: &Path) -> Result<serde_json::Value, ServiceError> {
    let bytes = std::fs::read(path).map_err(|e| ServiceError::Io(format!("{}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment.txt".to_string());
    Ok(json!({
        "content": base64::engine::general_purpose::STANDARD.encode(bytes),
        "filename": file_name,
        "type": "text/plain",
        "disposition": "attachment",
    }))
}

impl Notifier for SendGridNotifier {
    fn notify(&self, message: &Message) -> Result<(), ServiceError> {
        let payload = self.payload(message)?;
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        check_status(response)?;
        log::debug!("Sent notification '{}' to {} recipient(s)", message.subject, self.to.len());
        Ok(())
    }
}
