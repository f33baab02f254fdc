use std::fmt;

use uocc_config::{SecretsError, SettingsError};
use uocc_io::BundleError;
use uocc_recon::{ReconError, SheetError};
use uocc_services::ServiceError;

use crate::exit_codes::*;

/// Anything that stops a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SkidError {
    Settings(SettingsError),
    Secrets(SecretsError),
    Service(ServiceError),
    Sheet(SheetError),
    Recon(ReconError),
    /// One district's ledger update failed and the run stopped there.
    Distribution { district: String, source: ReconError },
    /// Run finished but these districts were not updated.
    DistributionIncomplete(Vec<String>),
    Locations(String),
    Bundle(BundleError),
    Io(String),
}

impl fmt::Display for SkidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings(e) => write!(f, "{e}"),
            Self::Secrets(e) => write!(f, "{e}"),
            Self::Service(e) => write!(f, "{e}"),
            Self::Sheet(e) => write!(f, "{e}"),
            Self::Recon(e) => write!(f, "{e}"),
            Self::Distribution { district, source } => {
                write!(f, "distribution to {district} failed: {source}")
            }
            Self::DistributionIncomplete(districts) => {
                write!(f, "distribution failed for: {}", districts.join(", "))
            }
            Self::Locations(msg) => write!(f, "locations: {msg}"),
            Self::Bundle(e) => write!(f, "{e}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for SkidError {}

impl SkidError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Settings(_) => EXIT_SETTINGS,
            Self::Secrets(SecretsError::NotFound { .. }) => EXIT_SECRETS_NOT_FOUND,
            Self::Secrets(_) => EXIT_SECRETS_INVALID,
            Self::Service(ServiceError::Auth(_)) => EXIT_AUTH,
            Self::Service(_) => EXIT_SERVICE,
            Self::Sheet(_) | Self::Recon(ReconError::Sheet(_)) => EXIT_SHEETS,
            Self::Recon(_) => EXIT_DATA,
            Self::Distribution { .. } | Self::DistributionIncomplete(_) => EXIT_DISTRIBUTION,
            Self::Locations(_) => EXIT_LOCATIONS,
            Self::Bundle(_) => EXIT_SURVEY_BUNDLE,
            Self::Io(_) => EXIT_ERROR,
        }
    }

    /// Next step for the operator, where one is obvious.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Secrets(SecretsError::NotFound { .. }) => {
                Some("mount /secrets/app/secrets.json or pass --secrets-dir".to_string())
            }
            Self::Secrets(SecretsError::Missing(_)) => {
                Some("local runs need SHEETS_ACCESS_TOKEN in secrets.json".to_string())
            }
            Self::Service(ServiceError::Auth(_)) => Some("check AGOL_USER and AGOL_PASSWORD".to_string()),
            Self::Distribution { .. } => {
                Some("set [distribution] continue_on_error = true to update the other districts".to_string())
            }
            _ => None,
        }
    }
}

impl From<SettingsError> for SkidError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

impl From<SecretsError> for SkidError {
    fn from(err: SecretsError) -> Self {
        Self::Secrets(err)
    }
}

impl From<ServiceError> for SkidError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<SheetError> for SkidError {
    fn from(err: SheetError) -> Self {
        Self::Sheet(err)
    }
}

impl From<ReconError> for SkidError {
    fn from(err: ReconError) -> Self {
        Self::Recon(err)
    }
}

impl From<BundleError> for SkidError {
    fn from(err: BundleError) -> Self {
        Self::Bundle(err)
    }
}

impl From<std::io::Error> for SkidError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
