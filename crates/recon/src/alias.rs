//! Survey field aliases -> column labels.
//!
//! Survey questions are aliased `"1. Question text"`; their comment fields are
//! aliased with bare text (`"Comments"`). Prefixing the bare ones with the
//! number of the question they follow makes every column label unique and
//! self-describing once fields are renamed to their aliases.

use once_cell::sync::Lazy;
use regex::Regex;

static QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}\. ").expect("valid regex"));
static SUB_QUESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}[a-z]\. ").expect("valid regex"));

/// Rewrite unnumbered aliases to carry their parent question's number.
///
/// `aliases` is (field name, alias) in survey field order. The result has the
/// same names in the same order. Scanning stops at `terminal_field`: it and
/// everything after it are returned untouched.
pub fn normalize_aliases(aliases: &[(String, String)], terminal_field: &str) -> Vec<(String, String)> {
    let mut current = String::new();
    let mut out = Vec::with_capacity(aliases.len());
    let mut stopped = false;

    for (name, alias) in aliases {
        if !stopped && name == terminal_field {
            stopped = true;
        }
        if stopped {
            out.push((name.clone(), alias.clone()));
            continue;
        }

        if let Some(m) = QUESTION.find(alias) {
            current = m.as_str().to_string();
            out.push((name.clone(), alias.clone()));
            continue;
        }

        if SUB_QUESTION.is_match(alias) || current.is_empty() {
            out.push((name.clone(), alias.clone()));
            continue;
        }

        out.push((name.clone(), format!("{current}{alias}")));
    }

    out
}
