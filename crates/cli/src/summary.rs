//! End-of-run summary mailed to the maintainers.

use std::fmt::Write as _;

use chrono::{NaiveDateTime, TimeDelta};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistrictOutcome {
    Appended(usize),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictResult {
    pub district: String,
    pub outcome: DistrictOutcome,
}

impl DistrictResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, DistrictOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub skid_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub locations_loaded: usize,
    pub contacts_loaded: usize,
    pub districts: Vec<DistrictResult>,
    pub unrouted: usize,
    pub contact_status: String,
    pub survey_status: String,
}

impl RunSummary {
    pub fn subject(&self) -> String {
        format!("{} Update Summary", self.skid_name)
    }

    pub fn failed_districts(&self) -> Vec<String> {
        self.districts
            .iter()
            .filter(|d| d.is_failure())
            .map(|d| d.district.clone())
            .collect()
    }

    pub fn appended(&self) -> usize {
        self.districts
            .iter()
            .map(|d| match d.outcome {
                DistrictOutcome::Appended(n) => n,
                DistrictOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} update {}", self.skid_name, self.start.format("%Y-%m-%d"));
        let _ = writeln!(out, "{}", "=".repeat(20));
        let _ = writeln!(out);
        let _ = writeln!(out, "Start time: {}", self.start.format("%H:%M:%S"));
        let _ = writeln!(out, "End time: {}", self.end.format("%H:%M:%S"));
        let _ = writeln!(out, "Duration: {}", format_duration(self.end - self.start));
        let _ = writeln!(out, "Locations loaded: {}", self.locations_loaded);
        let _ = writeln!(out, "Contacts loaded: {}", self.contacts_loaded);
        let _ = writeln!(out);
        let _ = writeln!(out, "Responses distributed:");
        for district in &self.districts {
            match &district.outcome {
                DistrictOutcome::Appended(n) => {
                    let _ = writeln!(out, "  {}: {n} new responses", district.district);
                }
                DistrictOutcome::Failed(msg) => {
                    let _ = writeln!(out, "  {}: failed: {msg}", district.district);
                }
            }
        }
        let _ = writeln!(out, "Unrouted responses: {}", self.unrouted);
        let _ = writeln!(out, "{}", self.contact_status);
        let _ = writeln!(out, "{}", self.survey_status);
        out
    }
}

/// `H:MM:SS`; negative spans (clock changes) render as zero.
pub fn format_duration(span: TimeDelta) -> String {
    let secs = span.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
