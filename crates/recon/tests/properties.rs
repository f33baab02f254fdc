// Property-based tests for distribution, reconciliation and alias rewriting.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use uocc_recon::memory::{MemoryBook, MemorySheets, MemoryWorksheet};
use uocc_recon::{
    distribute, normalize_aliases, reconcile, CellRef, ContactFields, DistrictLedger, ResponseKeys, Table,
    Worksheet,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const DISTRICT: &str = "WMHD";

fn keys() -> ResponseKeys {
    ResponseKeys {
        global_id: "GlobalID".into(),
        district: "lhd".into(),
    }
}

fn ledger() -> DistrictLedger {
    DistrictLedger {
        district: DISTRICT.into(),
        sheet_id: "wmhd".into(),
        worksheets: vec![],
    }
}

fn response_table(ids: &[String]) -> Table {
    let mut t = Table::new(["GlobalID", "lhd", "1. Answer"]);
    for id in ids {
        t.push_row(vec![Some(id.clone()), Some(DISTRICT.into()), Some(format!("answer {id}"))]);
    }
    t
}

fn contact_fields() -> ContactFields {
    ContactFields {
        still_correct: "correct".into(),
        no_value: "No".into(),
        response_id: "fid".into(),
        response_name: "name".into(),
        response_email: "email".into(),
        submitted: "when".into(),
        registry_id: "ID#".into(),
        registry_name: "Contact".into(),
        registry_email: "Email".into(),
    }
}

fn registry(ids: &BTreeSet<u8>) -> Table {
    let mut t = Table::new(["ID#", "Contact", "Email", "Notes"]);
    for id in ids {
        t.push_row(vec![
            Some(id.to_string()),
            Some(format!("contact {id}")),
            None,
            Some("keep".into()),
        ]);
    }
    t
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Short ids from a tiny alphabet so ledgers and batches overlap often.
fn arb_ids(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-e]{1,2}", 0..max)
}

/// (name, alias) pairs mixing numbered, lettered and bare aliases.
fn arb_aliases() -> impl Strategy<Value = Vec<(String, String)>> {
    let alias = prop_oneof![
        2 => (1u8..30, "[A-Za-z ]{1,12}").prop_map(|(n, t)| format!("{n}. {t}")),
        1 => (1u8..30, "[a-d]", "[A-Za-z ]{1,12}").prop_map(|(n, l, t)| format!("{n}{l}. {t}")),
        2 => "[A-Za-z][A-Za-z ]{0,12}",
    ];
    prop::collection::vec(alias, 0..12).prop_map(|aliases| {
        aliases
            .into_iter()
            .enumerate()
            .map(|(i, a)| (format!("field_{i}"), a))
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Distributor
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn appended_set_is_batch_minus_ledger(ledger_ids in arb_ids(8), batch_ids in arb_ids(10)) {
        let existing: Vec<String> = {
            let mut seen = HashSet::new();
            ledger_ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
        };
        let client = MemorySheets::new().with_book(MemoryBook::new(
            "wmhd",
            vec![MemoryWorksheet::from_table("Responses", &response_table(&existing))],
        ));

        let n = distribute(&client, &ledger(), &response_table(&batch_ids), &keys()).unwrap();

        let mut expected: Vec<String> = Vec::new();
        for id in &batch_ids {
            if !existing.contains(id) && !expected.contains(id) {
                expected.push(id.clone());
            }
        }
        prop_assert_eq!(n, expected.len());

        let sheet = client.book("wmhd").unwrap().sheet("Responses").unwrap();
        let after = sheet.get_table().unwrap();
        let appended: Vec<String> = after.rows()[existing.len()..]
            .iter()
            .map(|r| r[0].clone().unwrap_or_default())
            .collect();
        prop_assert_eq!(appended, expected);

        // idempotent
        let again = distribute(&client, &ledger(), &response_table(&batch_ids), &keys()).unwrap();
        prop_assert_eq!(again, 0);
    }

    #[test]
    fn append_offset_ignores_secondary_worksheets(primary in 0usize..6, secondary in 0usize..6) {
        let primary_ids: Vec<String> = (0..primary).map(|i| format!("p{i}")).collect();
        let secondary_ids: Vec<String> = (0..secondary).map(|i| format!("s{i}")).collect();
        let client = MemorySheets::new().with_book(MemoryBook::new(
            "wmhd",
            vec![
                MemoryWorksheet::from_table("Current", &response_table(&primary_ids)),
                MemoryWorksheet::from_table("Archive", &response_table(&secondary_ids)),
            ],
        ));
        let batch: Vec<String> = vec!["new1".into(), "new2".into()];

        distribute(&client, &ledger(), &response_table(&batch), &keys()).unwrap();

        let sheet = client.book("wmhd").unwrap().sheet("Current").unwrap();
        prop_assert_eq!(sheet.writes()[0].start, CellRef::new(primary + 2, 1));
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn reconcile_never_changes_row_count(
        registry_ids in prop::collection::btree_set(0u8..20, 0..10),
        corrections in prop::collection::vec((0u8..30, 0u32..1000, prop::bool::ANY), 0..15),
    ) {
        let existing = registry(&registry_ids);
        let mut responses = Table::new(["fid", "correct", "name", "email", "when"]);
        for (fid, minute, wrong) in &corrections {
            responses.push_row(vec![
                Some(fid.to_string()),
                Some(if *wrong { "No" } else { "Yes" }.into()),
                Some(format!("name {minute}")),
                Some(format!("{minute}@example.com")),
                Some(format!("2024-01-01 00:00:00 +{minute}")),
            ]);
        }
        let sheet = MemoryWorksheet::from_table("Contacts", &existing);

        let out = reconcile(existing.clone(), &responses, &contact_fields(), &sheet).unwrap();

        prop_assert_eq!(out.contacts.len(), existing.len());
        prop_assert_eq!(out.contacts.columns(), existing.columns());
        let before: Vec<_> = existing.column_values("ID#").unwrap();
        let after: Vec<_> = out.contacts.column_values("ID#").unwrap();
        prop_assert_eq!(before, after);
        for i in 0..out.contacts.len() {
            prop_assert_eq!(out.contacts.get(i, "Notes"), Some("keep"));
        }
    }

    #[test]
    fn newest_correction_wins(first in 0u32..720, second in 0u32..720) {
        prop_assume!(first != second);
        let ids: BTreeSet<u8> = [7u8].into_iter().collect();
        let existing = registry(&ids);
        let stamp = |m: u32| format!("2024-05-01 {:02}:{:02}:00", m / 60, m % 60);

        let mut responses = Table::new(["fid", "correct", "name", "email", "when"]);
        for m in [first, second] {
            responses.push_row(vec![
                Some("7".into()),
                Some("No".into()),
                Some(format!("name {m}")),
                Some(format!("{m}@example.com")),
                Some(stamp(m)),
            ]);
        }
        let sheet = MemoryWorksheet::from_table("Contacts", &existing);

        let out = reconcile(existing, &responses, &contact_fields(), &sheet).unwrap();

        let newest = first.max(second);
        let want_name = format!("name {newest}");
        let want_email = format!("{newest}@example.com");
        prop_assert_eq!(out.contacts.get(0, "Contact"), Some(want_name.as_str()));
        prop_assert_eq!(out.contacts.get(0, "Email"), Some(want_email.as_str()));
    }
}

// ---------------------------------------------------------------------------
// Alias normalizer
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn alias_keys_and_order_are_preserved(aliases in arb_aliases(), stop in 0usize..14) {
        let terminal = format!("field_{stop}");
        let out = normalize_aliases(&aliases, &terminal);

        prop_assert_eq!(out.len(), aliases.len());
        let mut numbered_seen = false;
        let mut stopped = false;
        for ((name_in, alias_in), (name_out, alias_out)) in aliases.iter().zip(&out) {
            prop_assert_eq!(name_in, name_out);
            if name_in == &terminal {
                stopped = true;
            }
            let numbered = regex_like_numbered(alias_in);
            let lettered = regex_like_lettered(alias_in);
            if stopped || numbered || lettered || !numbered_seen {
                prop_assert_eq!(alias_in, alias_out);
            } else {
                prop_assert!(alias_out.ends_with(alias_in.as_str()));
                prop_assert!(alias_out.len() > alias_in.len());
            }
            if numbered {
                numbered_seen = true;
            }
        }
    }
}

/// `N. ` or `NN. ` anywhere, checked by hand so the test does not share the
/// implementation's regex.
fn regex_like_numbered(s: &str) -> bool {
    let b = s.as_bytes();
    (0..b.len()).any(|i| b[i].is_ascii_digit() && b.get(i + 1..i + 3) == Some(b". ".as_slice()))
}

/// `Na. ` or `NNa. ` anywhere.
fn regex_like_lettered(s: &str) -> bool {
    let b = s.as_bytes();
    (0..b.len()).any(|i| {
        b[i].is_ascii_digit()
            && b.get(i + 1).is_some_and(|c| c.is_ascii_lowercase())
            && b.get(i + 2..i + 4) == Some(b". ".as_slice())
    })
}
