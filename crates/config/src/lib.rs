// Configuration loading

pub mod secrets;
pub mod settings;

pub use secrets::{CredentialSource, LedgerEntry, Secrets, SecretsError, SecretsLocation};
pub use settings::{Settings, SettingsError};
