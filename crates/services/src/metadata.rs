//! GCP metadata server: ambient OAuth tokens and the project id.

use serde::Deserialize;

use crate::error::ServiceError;
use crate::{check_status, http_client};

pub const METADATA_BASE: &str = "http://metadata.google.internal";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

#[derive(Clone)]
pub struct MetadataServer {
    http: reqwest::blocking::Client,
    base: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl MetadataServer {
    pub fn new() -> Result<Self, ServiceError> {
        Self::with_base_url(METADATA_BASE)
    }

    pub fn with_base_url(base: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client()?,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::blocking::Response, ServiceError> {
        let response = self
            .http
            .get(format!("{}/computeMetadata/v1/{path}", self.base))
            .header("Metadata-Flavor", "Google")
            .query(query)
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        check_status(response)
    }

    /// Token for the runtime's default service account.
    pub fn access_token(&self, scopes: &[&str]) -> Result<String, ServiceError> {
        let scopes = scopes.join(",");
        let response = self
            .get("instance/service-accounts/default/token", &[("scopes", scopes.as_str())])
            .map_err(|e| ServiceError::Auth(format!("metadata token: {e}")))?;
        let token: TokenResponse = response.json().map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(token.access_token)
    }

    pub fn project_id(&self) -> Result<String, ServiceError> {
        let response = self.get("project/project-id", &[])?;
        response.text().map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

/// Project id when running on GCP, else the local host name.
pub fn host_name(metadata: &MetadataServer) -> String {
    match metadata.project_id() {
        Ok(id) if !id.trim().is_empty() => id.trim().to_string(),
        Ok(_) => local_host_name(),
        Err(e) => {
            log::debug!("No project id from metadata server ({e}); using local host name");
            local_host_name()
        }
    }
}

fn local_host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}
