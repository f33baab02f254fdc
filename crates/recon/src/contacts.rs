//! Merge contact corrections from survey responses into the contact registry.
//!
//! A response whose "is this contact still correct?" answer is the configured
//! "no" value carries a corrected contact name and email for its facility.
//! The newest correction per facility wins; the registry keeps every row it
//! had and gains none.

use std::collections::{HashMap, HashSet};

use crate::error::ReconError;
use crate::sheet::{CellRef, Worksheet, WriteOptions};
use crate::table::{update_by_key, Table};
use crate::timestamp::newest_first;

pub const NO_UPDATES_STATUS: &str = "No contact updates found";

/// Column names on both sides of the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactFields {
    pub still_correct: String,
    /// Answer meaning "no, the contact on file is wrong".
    pub no_value: String,
    pub response_id: String,
    pub response_name: String,
    pub response_email: String,
    pub submitted: String,
    pub registry_id: String,
    pub registry_name: String,
    pub registry_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub contacts: Table,
    /// One line for the run summary.
    pub status: String,
    /// Registry rows that received a correction.
    pub updated: usize,
    /// Whether the merged table reached the registry worksheet.
    pub persisted: bool,
}

/// Responses flagging a wrong contact, projected to id, name, email and
/// submission time (response column names).
pub fn correction_candidates(responses: &Table, fields: &ContactFields) -> Result<Table, ReconError> {
    let flag = responses.require_column("responses", &fields.still_correct)?;
    let flagged = responses.filter_rows(|row| row[flag].as_deref() == Some(fields.no_value.as_str()));
    flagged.select(
        "responses",
        &[
            fields.response_id.as_str(),
            fields.response_name.as_str(),
            fields.response_email.as_str(),
            fields.submitted.as_str(),
        ],
    )
}

/// Newest candidate per facility, timestamp dropped, columns renamed to the
/// registry's names. Candidates without a facility id are discarded.
pub fn latest_corrections(candidates: &Table, fields: &ContactFields) -> Result<Table, ReconError> {
    let id = candidates.require_column("candidates", &fields.response_id)?;
    let ts = candidates.require_column("candidates", &fields.submitted)?;

    let mut rows: Vec<_> = candidates.rows().iter().collect();
    rows.sort_by(|a, b| newest_first(a[ts].as_deref(), b[ts].as_deref()));

    let mut seen: HashSet<&str> = HashSet::new();
    let mut latest = Table::new(candidates.columns().iter().cloned());
    for row in rows {
        let Some(key) = row[id].as_deref() else {
            continue;
        };
        if seen.insert(key) {
            latest.push_row(row.clone());
        }
    }

    latest.drop_columns(&[fields.submitted.as_str()]);
    latest.rename_columns(&HashMap::from([
        (fields.response_id.clone(), fields.registry_id.clone()),
        (fields.response_name.clone(), fields.registry_name.clone()),
        (fields.response_email.clone(), fields.registry_email.clone()),
    ]));
    Ok(latest)
}

/// Apply the newest contact correction per facility to `existing` and write
/// the result back to `registry`.
///
/// With no corrections the registry is left alone entirely (no write). A
/// failed write is logged and reported in the status; the merged table is
/// still returned.
pub fn reconcile(
    existing: Table,
    responses: &Table,
    fields: &ContactFields,
    registry: &dyn Worksheet,
) -> Result<Reconciliation, ReconError> {
    existing.require_column("contacts", &fields.registry_id)?;

    let candidates = correction_candidates(responses, fields)?;
    if candidates.is_empty() {
        log::info!("{NO_UPDATES_STATUS}");
        return Ok(Reconciliation {
            contacts: existing,
            status: NO_UPDATES_STATUS.to_string(),
            updated: 0,
            persisted: false,
        });
    }

    let corrections = latest_corrections(&candidates, fields)?;
    let merged = update_by_key(&existing, &corrections, &fields.registry_id)?;

    let corrected: HashSet<&str> = corrections
        .column_values(&fields.registry_id)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect();
    let updated = existing
        .column_values(&fields.registry_id)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter(|id| corrected.contains(id))
        .count();
    let unmatched = corrected.len().saturating_sub(updated);
    if unmatched > 0 {
        log::warn!("{unmatched} contact correction(s) name facilities not in the registry; dropped");
    }

    log::info!(
        "Writing {} contact row(s) to '{}' ({updated} corrected)",
        merged.len(),
        registry.title()
    );
    match registry.set_table(&merged, CellRef::A1, &WriteOptions::with_header()) {
        Ok(()) => Ok(Reconciliation {
            contacts: merged,
            status: format!("Contact updates: {updated} facility contact(s) updated"),
            updated,
            persisted: true,
        }),
        Err(err) => {
            log::error!("Failed to write contact updates to '{}': {err}", registry.title());
            Ok(Reconciliation {
                contacts: merged,
                status: format!("Contact updates merged but not written to sheet: {err}"),
                updated,
                persisted: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryWorksheet;
    use crate::table::Cell;

    fn fields() -> ContactFields {
        ContactFields {
            still_correct: "contact_correct".into(),
            no_value: "No".into(),
            response_id: "facility_id".into(),
            response_name: "new_contact_name".into(),
            response_email: "new_contact_email".into(),
            submitted: "submitted".into(),
            registry_id: "ID#".into(),
            registry_name: "UOCC Contact Name".into(),
            registry_email: "UOCC Email Address".into(),
        }
    }

    fn c(v: &str) -> Cell {
        if v.is_empty() { None } else { Some(v.to_string()) }
    }

    fn registry() -> Table {
        let mut t = Table::new(["Name", "ID#", "UOCC Contact Name", "UOCC Email Address", "County"]);
        t.push_row(vec![c("Shop A"), c("1"), c("Ann"), c("ann@old"), c("Cache")]);
        t.push_row(vec![c("Shop B"), c("2"), c("Bob"), c("bob@old"), c("")]);
        t.push_row(vec![c("Shop C"), c("3"), c(""), c(""), c("Utah")]);
        t
    }

    fn responses(rows: &[(&str, &str, &str, &str, &str)]) -> Table {
        let mut t = Table::new([
            "facility_id",
            "contact_correct",
            "new_contact_name",
            "new_contact_email",
            "submitted",
        ]);
        for (id, ok, name, email, when) in rows {
            t.push_row(vec![c(id), c(ok), c(name), c(email), c(when)]);
        }
        t
    }

    #[test]
    fn candidates_are_only_no_answers() {
        let r = responses(&[
            ("1", "Yes", "", "", "1/1/2024"),
            ("2", "No", "Bea", "bea@new", "1/2/2024"),
            ("3", "no", "Cy", "cy@new", "1/3/2024"),
        ]);
        let cands = correction_candidates(&r, &fields()).unwrap();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands.columns(), &["facility_id", "new_contact_name", "new_contact_email", "submitted"]);
        assert_eq!(cands.get(0, "facility_id"), Some("2"));
    }

    #[test]
    fn latest_correction_per_facility_wins() {
        let r = responses(&[
            ("2", "No", "Old Bea", "old@bea", "1/2/2024 09:00"),
            ("2", "No", "New Bea", "new@bea", "2024-03-01 10:00:00"),
            ("2", "No", "Mid Bea", "mid@bea", "2/1/2024"),
        ]);
        let latest = latest_corrections(&correction_candidates(&r, &fields()).unwrap(), &fields()).unwrap();
        assert_eq!(latest.columns(), &["ID#", "UOCC Contact Name", "UOCC Email Address"]);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest.get(0, "UOCC Contact Name"), Some("New Bea"));
    }

    #[test]
    fn reconcile_merges_and_persists() {
        let sheet = MemoryWorksheet::from_table("UOCC Contacts", &registry());
        let r = responses(&[
            ("2", "No", "Bea", "bea@new", "1/2/2024"),
            ("3", "No", "", "cy@new", "1/3/2024"),
            ("99", "No", "Ghost", "ghost@new", "1/4/2024"),
        ]);

        let out = reconcile(registry(), &r, &fields(), &sheet).unwrap();

        assert!(out.persisted);
        assert_eq!(out.updated, 2);
        assert_eq!(out.contacts.len(), 3);
        assert_eq!(out.contacts.columns(), registry().columns());
        assert_eq!(out.contacts.get(1, "UOCC Contact Name"), Some("Bea"));
        assert_eq!(out.contacts.get(1, "UOCC Email Address"), Some("bea@new"));
        // missing name in the correction leaves the registry cell missing
        assert_eq!(out.contacts.get(2, "UOCC Contact Name"), None);
        assert_eq!(out.contacts.get(2, "UOCC Email Address"), Some("cy@new"));
        assert_eq!(out.contacts.rows()[0], registry().rows()[0]);
        assert_eq!(sheet.get_table().unwrap(), out.contacts);
        assert_eq!(sheet.writes()[0].start, CellRef::A1);
        assert!(sheet.writes()[0].header);
    }

    #[test]
    fn no_candidates_skips_the_write() {
        let sheet = MemoryWorksheet::from_table("UOCC Contacts", &registry());
        let r = responses(&[("1", "Yes", "", "", "1/1/2024")]);

        let out = reconcile(registry(), &r, &fields(), &sheet).unwrap();

        assert_eq!(out.contacts, registry());
        assert_eq!(out.status, NO_UPDATES_STATUS);
        assert!(!out.persisted);
        assert!(sheet.writes().is_empty());
    }

    #[test]
    fn failed_write_still_returns_merged_table() {
        let sheet = MemoryWorksheet::from_table("UOCC Contacts", &registry()).fail_writes_with("quota exceeded");
        let r = responses(&[("1", "No", "Al", "al@new", "1/1/2024")]);

        let out = reconcile(registry(), &r, &fields(), &sheet).unwrap();

        assert!(!out.persisted);
        assert!(out.status.contains("quota exceeded"), "status: {}", out.status);
        assert_eq!(out.contacts.get(0, "UOCC Contact Name"), Some("Al"));
    }

    #[test]
    fn registry_without_id_column_is_a_hard_error() {
        let sheet = MemoryWorksheet::empty("UOCC Contacts");
        let err = reconcile(Table::new(["Name"]), &responses(&[]), &fields(), &sheet).unwrap_err();
        assert!(matches!(err, ReconError::MissingColumn { .. }));
    }
}
