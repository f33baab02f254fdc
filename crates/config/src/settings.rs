// Run settings
// Loaded from an optional TOML file; every key has a default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use log::LevelFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    Io { path: String, message: String },
    Parse(String),
    Invalid(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, message } => write!(f, "cannot read settings file {path}: {message}"),
            SettingsError::Parse(msg) => write!(f, "invalid settings TOML: {msg}"),
            SettingsError::Invalid(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logger name, mail subject prefix and summary title.
    pub skid_name: String,
    pub agol_org: String,
    /// `error`, `warn`, `info`, `debug` or `trace`. `RUST_LOG` overrides.
    pub log_level: String,
    /// Stem of the per-run log file.
    pub log_file_name: String,
    pub mail: MailSettings,
    pub sheets: SheetSettings,
    pub responses: ResponseSettings,
    pub contacts: ContactSettings,
    pub distribution: DistributionSettings,
    pub locations: LocationSettings,
    pub survey: SurveySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            skid_name: "uocc-skid".to_string(),
            agol_org: "https://utahdeq.maps.arcgis.com".to_string(),
            log_level: "debug".to_string(),
            log_file_name: "log".to_string(),
            mail: MailSettings::default(),
            sheets: SheetSettings::default(),
            responses: ResponseSettings::default(),
            contacts: ContactSettings::default(),
            distribution: DistributionSettings::default(),
            locations: LocationSettings::default(),
            survey: SurveySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub from_address: String,
    pub to_addresses: Vec<String>,
    pub api_base: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from_address: "noreply@utah.gov".to_string(),
            to_addresses: vec!["jdadams@utah.gov".to_string()],
            api_base: "https://api.sendgrid.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetSettings {
    pub api_base: String,
    pub locations_worksheet: String,
    pub contacts_worksheet: String,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com".to_string(),
            locations_worksheet: "UOCCs".to_string(),
            contacts_worksheet: "UOCC Contacts".to_string(),
        }
    }
}

/// Response layer field names. These columns are not renamed to their
/// aliases, so they are given as the layer's field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSettings {
    pub global_id_field: String,
    pub district_field: String,
    /// Field name where alias numbering stops.
    pub terminal_field: String,
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            global_id_field: "GlobalID".to_string(),
            district_field: "lhd".to_string(),
            terminal_field: "certify".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSettings {
    pub still_correct_field: String,
    pub no_value: String,
    pub facility_id_field: String,
    pub contact_name_field: String,
    pub contact_email_field: String,
    pub submitted_field: String,
    pub registry_id_field: String,
    pub registry_name_field: String,
    pub registry_email_field: String,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            still_correct_field: "contact_correct".to_string(),
            no_value: "No".to_string(),
            facility_id_field: "facility_id".to_string(),
            contact_name_field: "new_contact_name".to_string(),
            contact_email_field: "new_contact_email".to_string(),
            submitted_field: "CreationDate".to_string(),
            registry_id_field: "ID#".to_string(),
            registry_name_field: "UOCC Contact Name".to_string(),
            registry_email_field: "UOCC Email Address".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionSettings {
    /// Keep distributing to later districts after one fails. The run still
    /// exits non-zero.
    pub continue_on_error: bool,
}

/// Location sheet to feature layer mapping. Column names here are the
/// layer-safe names produced by the column rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    pub county_field: String,
    pub district_field: String,
    pub latitude_field: String,
    pub longitude_field: String,
    pub renames: BTreeMap<String, String>,
    pub drop_columns: Vec<String>,
    pub float_columns: Vec<String>,
    pub int_columns: Vec<String>,
}

impl Default for LocationSettings {
    fn default() -> Self {
        let renames = [
            ("Longitude_", "Longitude"),
            (
                "Accept_Material__Dropped___Off_by_the_Public",
                "Accept_Material_Dropped_Off_by_",
            ),
            (
                "Gallons_of_Used_Oil_Collected_for_Recycling_Last_Year",
                "Gallons_of_Used_Oil_Collected_f",
            ),
        ];
        Self {
            county_field: "County".to_string(),
            district_field: "lhd".to_string(),
            latitude_field: "Latitude".to_string(),
            longitude_field: "Longitude".to_string(),
            renames: renames
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            drop_columns: [
                "Local_Health_Department",
                "UOCC_Email_Address",
                "Corporate_Email_Address",
                "Corporate_Contact_Name",
                "UOCC_Contact_Name",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            float_columns: vec![
                "Latitude".to_string(),
                "Longitude".to_string(),
                "Gallons_of_Used_Oil_Collected_f".to_string(),
            ],
            int_columns: vec!["Zip_Code".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveySettings {
    /// Archive entry replaced by the facility list (matched by suffix).
    pub csv_entry: String,
    /// Registry columns written to the CSV; empty writes all of them.
    pub columns: Vec<String>,
}

impl Default for SurveySettings {
    fn default() -> Self {
        Self {
            csv_entry: "uoccs.csv".to_string(),
            columns: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults when `path` is `None`; a given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.mail.to_addresses.is_empty() {
            return Err(SettingsError::Invalid("mail.to_addresses is empty".into()));
        }
        self.level_filter()?;

        let required = [
            ("skid_name", &self.skid_name),
            ("responses.global_id_field", &self.responses.global_id_field),
            ("responses.district_field", &self.responses.district_field),
            ("contacts.facility_id_field", &self.contacts.facility_id_field),
            ("contacts.registry_id_field", &self.contacts.registry_id_field),
            ("contacts.still_correct_field", &self.contacts.still_correct_field),
            ("contacts.submitted_field", &self.contacts.submitted_field),
            ("locations.county_field", &self.locations.county_field),
            ("survey.csv_entry", &self.survey.csv_entry),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::Invalid(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, SettingsError> {
        self.log_level
            .parse::<LevelFilter>()
            .map_err(|_| SettingsError::Invalid(format!("unknown log_level '{}'", self.log_level)))
    }

    /// `<skid_name> on <host>: `
    pub fn subject_prefix(&self, host: &str) -> String {
        format!("{} on {host}: ", self.skid_name)
    }
}
