//! Blocking HTTP clients for the services the sync job talks to.
//!
//! No Tokio runtime. No retries; reqwest's default timeouts apply.

pub mod agol;
pub mod error;
pub mod mail;
pub mod metadata;
pub mod sheets;

pub use agol::{Feature, FeatureServiceClient, FieldInfo, ItemInfo, Point, SpatialReference};
pub use error::ServiceError;
pub use mail::{Message, Notifier, SendGridNotifier};
pub use metadata::{host_name, MetadataServer};
pub use sheets::{SheetsAuth, SheetsClient};

pub(crate) const USER_AGENT: &str = concat!("uocc-skid/", env!("CARGO_PKG_VERSION"));

pub(crate) fn http_client() -> Result<reqwest::blocking::Client, ServiceError> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ServiceError::Network(e.to_string()))
}

/// Fail on non-2xx, keeping the body for the message.
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ServiceError> {
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ServiceError::Http(status, body));
    }
    Ok(response)
}
