// Secrets
// Production reads the mounted `/secrets/app/secrets.json` and uses the
// metadata server for Google credentials. Local development reads
// `secrets/secrets.json` and carries its own access token.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretsError {
    /// Neither the mount point nor the local directory exists.
    NotFound { mount_root: String, local_dir: String },
    Io { path: String, message: String },
    Parse(String),
    Missing(&'static str),
}

impl fmt::Display for SecretsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretsError::NotFound { mount_root, local_dir } => {
                write!(f, "Secrets folder not found; secrets not loaded (looked in {mount_root} and {local_dir})")
            }
            SecretsError::Io { path, message } => write!(f, "cannot read {path}: {message}"),
            SecretsError::Parse(msg) => write!(f, "invalid secrets.json: {msg}"),
            SecretsError::Missing(key) => write!(f, "secret {key} is required"),
        }
    }
}

impl std::error::Error for SecretsError {}

/// How the Sheets client obtains an OAuth token.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Metadata server of the hosting runtime.
    Ambient,
    Token(String),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Ambient => f.write_str("Ambient"),
            CredentialSource::Token(_) => f.write_str("Token(<redacted>)"),
        }
    }
}

/// One district's ledger spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub district: String,
    pub sheet_id: String,
    /// Worksheet titles, primary first; empty means every tab.
    pub worksheets: Vec<String>,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Secrets {
    pub agol_user: String,
    pub agol_password: String,
    pub sendgrid_api_key: String,
    pub uocc_locations_sheet_id: String,
    pub uocc_contacts_sheet_id: String,
    pub uocc_locations_itemid: String,
    pub uocc_contacts_itemid: String,
    pub responses_itemid: String,
    pub survey_itemid: String,
    /// District order here is the distribution order.
    #[serde(deserialize_with = "ledger_entries")]
    pub ledger_sheet_ids: Vec<LedgerEntry>,
    #[serde(default)]
    pub sheets_access_token: Option<String>,
    #[serde(skip, default = "ambient")]
    pub credentials: CredentialSource,
}

fn ambient() -> CredentialSource {
    CredentialSource::Ambient
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("agol_user", &self.agol_user)
            .field("agol_password", &"<redacted>")
            .field("sendgrid_api_key", &"<redacted>")
            .field("uocc_locations_sheet_id", &self.uocc_locations_sheet_id)
            .field("uocc_contacts_sheet_id", &self.uocc_contacts_sheet_id)
            .field("uocc_locations_itemid", &self.uocc_locations_itemid)
            .field("uocc_contacts_itemid", &self.uocc_contacts_itemid)
            .field("responses_itemid", &self.responses_itemid)
            .field("survey_itemid", &self.survey_itemid)
            .field("ledger_sheet_ids", &self.ledger_sheet_ids)
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLedger {
    Id(String),
    Detailed {
        sheet_id: String,
        #[serde(default)]
        worksheets: Vec<String>,
    },
}

fn ledger_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<LedgerEntry>, D::Error> {
    let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(district, value)| {
            let raw: RawLedger = serde_json::from_value(value)
                .map_err(|e| D::Error::custom(format!("LEDGER_SHEET_IDS.{district}: {e}")))?;
            let (sheet_id, worksheets) = match raw {
                RawLedger::Id(id) => (id, Vec::new()),
                RawLedger::Detailed { sheet_id, worksheets } => (sheet_id, worksheets),
            };
            Ok(LedgerEntry {
                district,
                sheet_id,
                worksheets,
            })
        })
        .collect()
}

/// Where to look for `secrets.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretsLocation {
    pub mount_root: PathBuf,
    pub local_dir: PathBuf,
}

impl Default for SecretsLocation {
    fn default() -> Self {
        Self {
            mount_root: PathBuf::from("/secrets"),
            local_dir: PathBuf::from("secrets"),
        }
    }
}

impl SecretsLocation {
    pub fn with_local_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: dir.into(),
            ..Self::default()
        }
    }
}

impl Secrets {
    /// Parse a secrets document. Credentials default to ambient; use
    /// [`Secrets::load`] to resolve them from the location.
    pub fn from_json(content: &str) -> Result<Self, SecretsError> {
        serde_json::from_str(content).map_err(|e| SecretsError::Parse(e.to_string()))
    }

    pub fn load(location: &SecretsLocation) -> Result<Self, SecretsError> {
        if location.mount_root.exists() {
            let path = location.mount_root.join("app").join("secrets.json");
            log::debug!("Loading secrets from mount {}", path.display());
            let mut secrets = Self::from_json(&read(&path)?)?;
            secrets.credentials = CredentialSource::Ambient;
            return Ok(secrets);
        }

        if location.local_dir.exists() {
            let path = location.local_dir.join("secrets.json");
            log::debug!("Loading local secrets from {}", path.display());
            let mut secrets = Self::from_json(&read(&path)?)?;
            let token = secrets
                .sheets_access_token
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or(SecretsError::Missing("SHEETS_ACCESS_TOKEN"))?;
            secrets.credentials = CredentialSource::Token(token);
            return Ok(secrets);
        }

        Err(SecretsError::NotFound {
            mount_root: location.mount_root.display().to_string(),
            local_dir: location.local_dir.display().to_string(),
        })
    }

    pub fn ledger(&self, district: &str) -> Option<&LedgerEntry> {
        self.ledger_sheet_ids.iter().find(|l| l.district == district)
    }
}

fn read(path: &Path) -> Result<String, SecretsError> {
    fs::read_to_string(path).map_err(|e| SecretsError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
