//! Ordered rows of named fields.
//!
//! A `Table` is the unit every worksheet read and write goes through. Cells are
//! `Option<String>`: `None` is a missing value (an empty sheet cell, a null
//! attribute), which is distinct from an empty string only in that update
//! operations never copy a missing cell over a present one.

use std::collections::{HashMap, HashSet};

use crate::error::ReconError;

pub type Cell = Option<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Empty table with the given header.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build from a header and rows; every row must match the header width.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, ReconError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(ReconError::RowWidth {
                expected: columns.len(),
                found: bad.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Like [`column_index`](Self::column_index) but an absent column is an error
    /// naming `table` for the message.
    pub fn require_column(&self, table: &str, column: &str) -> Result<usize, ReconError> {
        self.column_index(column).ok_or_else(|| ReconError::MissingColumn {
            table: table.into(),
            column: column.into(),
        })
    }

    /// Append a row, padding with missing cells or truncating to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Every value of one column, in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<Option<&str>>> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(|r| r[col].as_deref()).collect())
    }

    /// Stack tables vertically. The header is the union of all headers in
    /// first-seen order; cells a table does not have are missing.
    pub fn concat(tables: &[Table]) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for t in tables {
            for c in &t.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }

        let mut out = Table::new(columns);
        for t in tables {
            let aligned = t.align_to(&out.columns);
            out.rows.extend(aligned.rows);
        }
        out
    }

    /// Rows for which `keep` returns true, same header.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[Cell]) -> bool) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Project onto `columns` (in that order). Every column must exist.
    pub fn select(&self, table: &str, columns: &[&str]) -> Result<Table, ReconError> {
        let idx = columns
            .iter()
            .map(|c| self.require_column(table, c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Reorder to `columns` by name. Columns this table lacks come back
    /// missing; columns not listed are dropped.
    pub fn align_to(&self, columns: &[String]) -> Table {
        let idx: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        Table {
            columns: columns.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|i| i.and_then(|i| r[i].clone())).collect())
                .collect(),
        }
    }

    /// Rename columns present in `renames`; others keep their name.
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) {
        for c in &mut self.columns {
            if let Some(new) = renames.get(c) {
                *c = new.clone();
            }
        }
    }

    /// Remove the named columns. Unknown names are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let drop: HashSet<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        if drop.is_empty() {
            return;
        }
        self.columns = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !drop.contains(i))
            .map(|(_, c)| c.clone())
            .collect();
        for row in &mut self.rows {
            *row = row
                .iter()
                .enumerate()
                .filter(|(i, _)| !drop.contains(i))
                .map(|(_, v)| v.clone())
                .collect();
        }
    }

    /// Set a column from a per-row function, adding it at the end if absent.
    pub fn set_column(&mut self, name: &str, mut value: impl FnMut(&[Cell]) -> Cell) {
        match self.column_index(name) {
            Some(col) => {
                for row in &mut self.rows {
                    let v = value(row);
                    row[col] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    let v = value(row);
                    row.push(v);
                }
            }
        }
    }
}

/// Keyed upsert: copy every present cell of `updates` onto the row of
/// `existing` with the same `key` value.
///
/// Rows of `updates` whose key is absent from `existing` are dropped, as are
/// update columns `existing` does not have. Missing update cells leave the
/// existing value alone. Row count, row order and column order of `existing`
/// are unchanged.
pub fn update_by_key(existing: &Table, updates: &Table, key: &str) -> Result<Table, ReconError> {
    let existing_key = existing.require_column("existing", key)?;
    let update_key = updates.require_column("updates", key)?;

    // update column index -> existing column index
    let targets: Vec<(usize, usize)> = updates
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != update_key)
        .filter_map(|(i, c)| existing.column_index(c).map(|e| (i, e)))
        .collect();

    // last occurrence wins, matching a sequential application of updates
    let mut by_key: HashMap<&str, &Vec<Cell>> = HashMap::new();
    for row in &updates.rows {
        if let Some(k) = row[update_key].as_deref() {
            by_key.insert(k, row);
        }
    }

    let mut merged = existing.clone();
    for row in &mut merged.rows {
        let Some(k) = row[existing_key].as_deref() else {
            continue;
        };
        let Some(update) = by_key.get(k) else {
            continue;
        };
        let update = *update;
        for &(from, to) in &targets {
            if let Some(v) = &update[from] {
                row[to] = Some(v.clone());
            }
        }
    }

    Ok(merged)
}
