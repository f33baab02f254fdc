// A failed registry write is reported once at error level and does not fail
// the reconciliation. Own test binary: it installs the global logger.

use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use uocc_recon::memory::MemoryWorksheet;
use uocc_recon::{reconcile, ContactFields, Table};

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

struct Capture;

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = RECORDS.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: Capture = Capture;

#[test]
fn persist_failure_logs_exactly_one_error() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let fields = ContactFields {
        still_correct: "correct".into(),
        no_value: "No".into(),
        response_id: "fid".into(),
        response_name: "name".into(),
        response_email: "email".into(),
        submitted: "when".into(),
        registry_id: "ID#".into(),
        registry_name: "Contact".into(),
        registry_email: "Email".into(),
    };
    let mut existing = Table::new(["ID#", "Contact", "Email"]);
    existing.push_row(vec![Some("10".into()), Some("Old".into()), Some("old@x".into())]);
    let mut responses = Table::new(["fid", "correct", "name", "email", "when"]);
    responses.push_row(vec![
        Some("10".into()),
        Some("No".into()),
        Some("New".into()),
        Some("new@x".into()),
        Some("2024-02-02 12:00:00".into()),
    ]);
    let sheet = MemoryWorksheet::from_table("Contacts", &existing).fail_writes_with("HTTP 503: backend unavailable");

    let out = reconcile(existing, &responses, &fields, &sheet).unwrap();

    assert!(out.status.contains("HTTP 503: backend unavailable"), "status: {}", out.status);
    assert_eq!(out.contacts.get(0, "Contact"), Some("New"));

    let records = RECORDS.lock().unwrap();
    let errors: Vec<&String> = records
        .iter()
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, msg)| msg)
        .collect();
    assert_eq!(errors.len(), 1, "errors logged: {errors:?}");
    assert!(errors[0].contains("backend unavailable"));
}
