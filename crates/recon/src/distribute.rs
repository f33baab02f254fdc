//! Append unseen responses to a district's ledger.
//!
//! A ledger is one spreadsheet whose worksheets together hold every response
//! ever routed to the district. Identifier uniqueness is checked against the
//! union of all of them, but new rows only ever land in the first (primary)
//! worksheet, directly below its own last row.

use std::collections::HashSet;

use crate::error::ReconError;
use crate::sheet::{CellRef, SpreadsheetClient, Worksheet, WorksheetSelector, WriteOptions};
use crate::table::Table;

/// Where one district's responses live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictLedger {
    pub district: String,
    pub sheet_id: String,
    /// Worksheet titles, primary first. Empty means every worksheet in tab
    /// order, the first tab being primary.
    pub worksheets: Vec<String>,
}

/// Response columns the distributor keys on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseKeys {
    pub global_id: String,
    pub district: String,
}

/// Rows of `responses` routed to `district` whose id is not in `known`.
///
/// Rows without an id are skipped, and an id repeated within the batch is
/// kept once (first occurrence), so the result never introduces a duplicate.
pub fn unseen_responses(
    responses: &Table,
    known: &HashSet<&str>,
    district: &str,
    keys: &ResponseKeys,
) -> Result<Table, ReconError> {
    let id_col = responses.require_column("responses", &keys.global_id)?;
    let district_col = responses.require_column("responses", &keys.district)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut skipped_without_id = 0usize;
    let pending = responses.filter_rows(|row| {
        if row[district_col].as_deref() != Some(district) {
            return false;
        }
        let Some(id) = row[id_col].as_deref() else {
            skipped_without_id += 1;
            return false;
        };
        !known.contains(id) && seen.insert(id.to_string())
    });

    if skipped_without_id > 0 {
        log::warn!("{district}: skipped {skipped_without_id} response(s) without {}", keys.global_id);
    }
    Ok(pending)
}

/// Append every response for `ledger.district` that the ledger does not yet
/// hold. Returns the number of rows written.
pub fn distribute(
    client: &dyn SpreadsheetClient,
    ledger: &DistrictLedger,
    responses: &Table,
    keys: &ResponseKeys,
) -> Result<usize, ReconError> {
    let book = client.open_by_key(&ledger.sheet_id)?;
    let sheets: Vec<Box<dyn Worksheet + '_>> = if ledger.worksheets.is_empty() {
        book.worksheets()?
    } else {
        ledger
            .worksheets
            .iter()
            .map(|t| book.worksheet(&WorksheetSelector::Title(t.clone())))
            .collect::<Result<_, _>>()?
    };
    let Some(primary) = sheets.first() else {
        return Err(ReconError::NoWorksheets {
            district: ledger.district.clone(),
        });
    };

    let mut live = Vec::with_capacity(sheets.len());
    for ws in &sheets {
        let table = ws.get_table()?;
        log::debug!("{}: worksheet '{}' holds {} row(s)", ledger.district, ws.title(), table.len());
        live.push(table);
    }
    let primary_table = &live[0];
    let primary_columns = primary_table.columns().to_vec();
    let next_row = primary_table.len() + 2;

    // A blank worksheet has no header; give it the id column so the union
    // always has something to filter against.
    let padded: Vec<Table> = live
        .iter()
        .map(|t| {
            if t.columns().is_empty() {
                Table::new([keys.global_id.as_str()])
            } else {
                t.clone()
            }
        })
        .collect();
    let combined = Table::concat(&padded);
    let known: HashSet<&str> = combined
        .column_values(&keys.global_id)
        .ok_or_else(|| ReconError::MissingColumn {
            table: format!("{} ledger", ledger.district),
            column: keys.global_id.clone(),
        })?
        .into_iter()
        .flatten()
        .collect();

    let pending = unseen_responses(responses, &known, &ledger.district, keys)?;
    if pending.is_empty() {
        log::info!("{}: no new responses", ledger.district);
        return Ok(0);
    }

    let to_write = if primary_columns.is_empty() {
        pending
    } else {
        let dropped: Vec<&str> = pending
            .columns()
            .iter()
            .filter(|c| !primary_columns.contains(c))
            .map(String::as_str)
            .collect();
        if !dropped.is_empty() {
            log::warn!(
                "{}: columns not in '{}' header were not written: {}",
                ledger.district,
                primary.title(),
                dropped.join(", ")
            );
        }
        pending.align_to(&primary_columns)
    };

    log::info!(
        "{}: appending {} response(s) to '{}' at row {next_row}",
        ledger.district,
        to_write.len(),
        primary.title()
    );
    // A headerless primary gets the batch's header in row 1 so the next read
    // sees the rows just written.
    if primary_columns.is_empty() {
        primary.set_table(&to_write, CellRef::new(1, 1), &WriteOptions::with_header())?;
    } else {
        primary.set_table(&to_write, CellRef::new(next_row, 1), &WriteOptions::rows_only())?;
    }

    Ok(to_write.len())
}
