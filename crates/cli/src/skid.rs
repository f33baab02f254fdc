//! The sync job.
//!
//! One run: authenticate, pull the survey responses, append new ones to each
//! district's ledger, fold contact corrections into the registry, reload the
//! locations and contacts layers, rebuild the survey's facility list, and
//! mail a summary with the run log attached.
//!
//! Every stage is a hard stop on error except the registry write inside
//! [`reconcile`], and districts when `continue_on_error` is set.

use std::collections::{HashMap, HashSet};

use tempfile::TempDir;
use uocc_config::{CredentialSource, Secrets, Settings};
use uocc_io::{rewrite_csv_entry, table_to_csv};
use uocc_recon::{
    distribute, normalize_aliases, reconcile, ContactFields, DistrictLedger, Reconciliation, ResponseKeys,
    SpreadsheetClient, Table, WorksheetSelector,
};
use uocc_services::{
    host_name, FeatureServiceClient, Message, MetadataServer, Notifier, SendGridNotifier, SheetsAuth, SheetsClient,
};

use crate::error::SkidError;
use crate::locations::{location_features, prepare_contacts, prepare_locations, table_features};
use crate::logging::RunLog;
use crate::summary::{DistrictOutcome, DistrictResult, RunSummary};

pub fn contact_fields(settings: &Settings) -> ContactFields {
    let c = &settings.contacts;
    ContactFields {
        still_correct: c.still_correct_field.clone(),
        no_value: c.no_value.clone(),
        response_id: c.facility_id_field.clone(),
        response_name: c.contact_name_field.clone(),
        response_email: c.contact_email_field.clone(),
        submitted: c.submitted_field.clone(),
        registry_id: c.registry_id_field.clone(),
        registry_name: c.registry_name_field.clone(),
        registry_email: c.registry_email_field.clone(),
    }
}

pub fn ledgers(secrets: &Secrets) -> Vec<DistrictLedger> {
    secrets
        .ledger_sheet_ids
        .iter()
        .map(|l| DistrictLedger {
            district: l.district.clone(),
            sheet_id: l.sheet_id.clone(),
            worksheets: l.worksheets.clone(),
        })
        .collect()
}

/// Response columns looked up by field name. These keep their names when the
/// rest of the layer is renamed to aliases.
pub fn key_fields(settings: &Settings) -> HashSet<&str> {
    let r = &settings.responses;
    let c = &settings.contacts;
    [
        &r.global_id_field,
        &r.district_field,
        &c.still_correct_field,
        &c.facility_id_field,
        &c.contact_name_field,
        &c.contact_email_field,
        &c.submitted_field,
    ]
    .into_iter()
    .map(String::as_str)
    .collect()
}

/// Responses whose district has no ledger, including rows with no district.
pub fn count_unrouted(responses: &Table, district_field: &str, ledgers: &[DistrictLedger]) -> usize {
    let known: HashSet<&str> = ledgers.iter().map(|l| l.district.as_str()).collect();
    let Some(col) = responses.column_index(district_field) else {
        return responses.len();
    };
    responses
        .rows()
        .iter()
        .filter(|row| !row[col].as_deref().is_some_and(|d| known.contains(d)))
        .count()
}

pub struct Skid<'a> {
    settings: &'a Settings,
    secrets: &'a Secrets,
    run_log: Option<&'a RunLog>,
}

impl<'a> Skid<'a> {
    pub fn new(settings: &'a Settings, secrets: &'a Secrets) -> Self {
        Self {
            settings,
            secrets,
            run_log: None,
        }
    }

    /// Attach this log file to the summary mail.
    pub fn with_run_log(mut self, run_log: &'a RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn process(
        &self,
        sheets: &dyn SpreadsheetClient,
        gis: &mut FeatureServiceClient,
        notifier: &dyn Notifier,
    ) -> Result<RunSummary, SkidError> {
        let start = chrono::Local::now().naive_local();

        gis.authenticate(&self.secrets.agol_user, &self.secrets.agol_password)?;
        let gis: &FeatureServiceClient = gis;

        let responses = self.extract_responses(gis)?;
        let (districts, unrouted) = self.distribute_responses(sheets, &responses)?;
        let reconciliation = self.reconcile_contacts(sheets, &responses)?;

        let locations_loaded = self.load_locations(sheets, gis)?;
        let contacts_loaded = self.load_contacts(gis, &reconciliation.contacts)?;
        let survey_status = self.repackage_survey(gis, &reconciliation.contacts)?;

        let summary = RunSummary {
            skid_name: self.settings.skid_name.clone(),
            start,
            end: chrono::Local::now().naive_local(),
            locations_loaded,
            contacts_loaded,
            districts,
            unrouted,
            contact_status: reconciliation.status,
            survey_status,
        };
        self.notify(notifier, &summary);
        Ok(summary)
    }

    /// All responses, columns renamed to their normalized question text.
    /// Key fields keep their field names.
    pub fn extract_responses(&self, gis: &FeatureServiceClient) -> Result<Table, SkidError> {
        log::info!("Loading survey responses...");
        let layer = gis.first_layer_url(&self.secrets.responses_itemid)?;
        let aliases = gis.field_aliases(&layer)?;
        let keys = key_fields(self.settings);
        let renames: HashMap<String, String> =
            normalize_aliases(&aliases, &self.settings.responses.terminal_field)
                .into_iter()
                .filter(|(name, _)| !keys.contains(name.as_str()))
                .collect();
        let mut responses = gis.query_table(&layer)?;
        responses.rename_columns(&renames);
        log::info!("{} response(s) in the survey layer", responses.len());
        Ok(responses)
    }

    /// Append new responses to every ledger, in ledger order.
    pub fn distribute_responses(
        &self,
        sheets: &dyn SpreadsheetClient,
        responses: &Table,
    ) -> Result<(Vec<DistrictResult>, usize), SkidError> {
        let keys = ResponseKeys {
            global_id: self.settings.responses.global_id_field.clone(),
            district: self.settings.responses.district_field.clone(),
        };
        responses.require_column("responses", &keys.district)?;
        let ledgers = ledgers(self.secrets);

        let unrouted = count_unrouted(responses, &keys.district, &ledgers);
        if unrouted > 0 {
            log::warn!("{unrouted} response(s) name a district with no ledger");
        }

        let mut results = Vec::with_capacity(ledgers.len());
        for ledger in &ledgers {
            log::info!("Distributing responses to {}...", ledger.district);
            match distribute(sheets, ledger, responses, &keys) {
                Ok(appended) => results.push(DistrictResult {
                    district: ledger.district.clone(),
                    outcome: DistrictOutcome::Appended(appended),
                }),
                Err(err) if self.settings.distribution.continue_on_error => {
                    log::error!("Distribution to {} failed: {err}", ledger.district);
                    results.push(DistrictResult {
                        district: ledger.district.clone(),
                        outcome: DistrictOutcome::Failed(err.to_string()),
                    });
                }
                Err(err) => {
                    for done in &results {
                        if let DistrictOutcome::Appended(n) = done.outcome {
                            log::info!("{} had already received {n} response(s)", done.district);
                        }
                    }
                    return Err(SkidError::Distribution {
                        district: ledger.district.clone(),
                        source: err,
                    });
                }
            }
        }
        Ok((results, unrouted))
    }

    pub fn reconcile_contacts(
        &self,
        sheets: &dyn SpreadsheetClient,
        responses: &Table,
    ) -> Result<Reconciliation, SkidError> {
        log::info!("Reconciling contact corrections...");
        let book = sheets.open_by_key(&self.secrets.uocc_contacts_sheet_id)?;
        let registry = book.worksheet(&WorksheetSelector::Title(self.settings.sheets.contacts_worksheet.clone()))?;
        let existing = registry.get_table()?;
        let fields = contact_fields(self.settings);
        Ok(reconcile(existing, responses, &fields, &*registry)?)
    }

    pub fn load_locations(&self, sheets: &dyn SpreadsheetClient, gis: &FeatureServiceClient) -> Result<usize, SkidError> {
        log::info!("Loading locations from sheet...");
        let book = sheets.open_by_key(&self.secrets.uocc_locations_sheet_id)?;
        let worksheet = book.worksheet(&WorksheetSelector::Title(self.settings.sheets.locations_worksheet.clone()))?;
        let locations = prepare_locations(worksheet.get_table()?, &self.settings.locations)?;

        log::info!("Creating, projecting, and cleaning spatial location data...");
        let features = location_features(&locations, &self.settings.locations)?;

        log::info!("Truncating and loading location data...");
        let layer = gis.first_layer_url(&self.secrets.uocc_locations_itemid)?;
        Ok(gis.truncate_and_load(&layer, &features)?)
    }

    pub fn load_contacts(&self, gis: &FeatureServiceClient, contacts: &Table) -> Result<usize, SkidError> {
        log::info!("Truncating and loading contact data...");
        let features = table_features(&prepare_contacts(contacts));
        let layer = gis.first_layer_url(&self.secrets.uocc_contacts_itemid)?;
        Ok(gis.truncate_and_load(&layer, &features)?)
    }

    /// Rewrite the facility list inside the survey package from `contacts`.
    pub fn repackage_survey(&self, gis: &FeatureServiceClient, contacts: &Table) -> Result<String, SkidError> {
        log::info!("Updating survey facility list...");
        let survey = &self.settings.survey;
        let item = gis.item(&self.secrets.survey_itemid)?;
        let bundle = gis.download_item_data(&item.id)?;
        let csv = table_to_csv(contacts, &survey.columns)?;
        let rewritten = rewrite_csv_entry(&bundle, &survey.csv_entry, &csv)?;

        let file_name = item
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{}.zip", item.id));
        gis.update_item_data(&item, &file_name, rewritten)?;
        Ok(format!("Survey: {} facilities written to {}", contacts.len(), survey.csv_entry))
    }

    /// Send the summary. A failed send is logged; the run still succeeds.
    pub fn notify(&self, notifier: &dyn Notifier, summary: &RunSummary) {
        let attachment = self.run_log.and_then(|run_log| {
            if let Err(e) = run_log.flush() {
                log::warn!("Could not flush log file before attaching it: {e}");
            }
            run_log.is_attached().then(|| run_log.path().to_path_buf())
        });
        let message = Message {
            subject: summary.subject(),
            body: summary.render(),
            attachment,
        };
        match notifier.notify(&message) {
            Ok(()) => log::info!("Summary sent"),
            Err(e) => log::error!("Failed to send summary notification: {e}"),
        }
    }
}

/// Live service clients for a run.
pub struct Connections {
    pub sheets: SheetsClient,
    pub gis: FeatureServiceClient,
    pub notifier: SendGridNotifier,
}

pub fn connect(settings: &Settings, secrets: &Secrets) -> Result<Connections, SkidError> {
    let metadata = MetadataServer::new()?;
    let host = host_name(&metadata);
    let auth = match &secrets.credentials {
        CredentialSource::Ambient => SheetsAuth::Metadata(metadata),
        CredentialSource::Token(token) => SheetsAuth::Static(token.clone()),
    };
    let notifier = SendGridNotifier::new(
        secrets.sendgrid_api_key.clone(),
        settings.mail.from_address.clone(),
        settings.mail.to_addresses.clone(),
        settings.subject_prefix(&host),
    )?
    .with_base_url(settings.mail.api_base.clone());
    Ok(Connections {
        sheets: SheetsClient::with_base_url(auth, settings.sheets.api_base.clone())?,
        gis: FeatureServiceClient::new(settings.agol_org.clone())?,
        notifier,
    })
}

/// Connect and run once.
pub fn run(settings: &Settings, secrets: &Secrets, run_log: &RunLog) -> Result<RunSummary, SkidError> {
    let mut connections = connect(settings, secrets)?;
    Skid::new(settings, secrets).with_run_log(run_log).process(
        &connections.sheets,
        &mut connections.gis,
        &connections.notifier,
    )
}

/// Close the log file and remove the run's temp dir. Every failure is logged
/// and returned.
pub fn cleanup(run_log: &RunLog, workspace: TempDir) -> Vec<String> {
    let mut problems = Vec::new();
    if let Err(e) = run_log.detach() {
        problems.push(format!("closing log file {}: {e}", run_log.path().display()));
    }
    let dir = workspace.path().display().to_string();
    if let Err(e) = workspace.close() {
        problems.push(format!("removing temp dir {dir}: {e}"));
    }
    for problem in &problems {
        log::warn!("Cleanup: {problem}");
    }
    problems
}
