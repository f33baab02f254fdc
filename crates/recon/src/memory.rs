//! In-process spreadsheet backend.
//!
//! Holds worksheets as plain grids, records every write and can be told to
//! fail reads or writes. Single-threaded (`RefCell`), like the engine.

use std::cell::RefCell;

use crate::error::SheetError;
use crate::sheet::{CellRef, Spreadsheet, SpreadsheetClient, Worksheet, WorksheetSelector, WriteOptions};
use crate::table::{Cell, Table};

/// One `set_table` call as the worksheet saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub start: CellRef,
    pub header: bool,
    pub rows: usize,
}

#[derive(Debug, Default)]
pub struct MemoryWorksheet {
    title: String,
    /// grid[0] is sheet row 1.
    grid: RefCell<Vec<Vec<Cell>>>,
    writes: RefCell<Vec<RecordedWrite>>,
    fail_reads: RefCell<Option<String>>,
    fail_writes: RefCell<Option<String>>,
}

impl MemoryWorksheet {
    /// A worksheet with nothing in it, not even a header.
    pub fn empty(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// A worksheet holding `table` with its header in row 1.
    pub fn from_table(title: &str, table: &Table) -> Self {
        let sheet = Self::empty(title);
        {
            let mut grid = sheet.grid.borrow_mut();
            grid.push(table.columns().iter().map(|c| Some(c.clone())).collect());
            grid.extend(table.rows().iter().cloned());
        }
        sheet
    }

    pub fn fail_reads_with(self, message: &str) -> Self {
        *self.fail_reads.borrow_mut() = Some(message.to_string());
        self
    }

    pub fn fail_writes_with(self, message: &str) -> Self {
        *self.fail_writes.borrow_mut() = Some(message.to_string());
        self
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.borrow().clone()
    }

    /// Number of grid rows in use, header included.
    pub fn used_rows(&self) -> usize {
        self.grid.borrow().len()
    }

    /// Raw cell at a 1-based address.
    pub fn cell(&self, at: CellRef) -> Option<String> {
        let grid = self.grid.borrow();
        grid.get(at.row.checked_sub(1)?)?
            .get(at.col.checked_sub(1)?)?
            .clone()
    }
}

impl Worksheet for MemoryWorksheet {
    fn title(&self) -> &str {
        &self.title
    }

    fn get_table(&self) -> Result<Table, SheetError> {
        if let Some(msg) = self.fail_reads.borrow().as_ref() {
            return Err(SheetError::Backend(msg.clone()));
        }

        let grid = self.grid.borrow();
        let Some(header) = grid.first() else {
            return Ok(Table::default());
        };
        if header.iter().all(Option::is_none) {
            return Ok(Table::default());
        }

        let columns: Vec<String> = header.iter().map(|c| c.clone().unwrap_or_default()).collect();
        let mut table = Table::new(columns);
        for row in grid.iter().skip(1) {
            table.push_row(row.clone());
        }
        Ok(table)
    }

    fn set_table(&self, table: &Table, start: CellRef, options: &WriteOptions) -> Result<(), SheetError> {
        if let Some(msg) = self.fail_writes.borrow().as_ref() {
            return Err(SheetError::Backend(msg.clone()));
        }
        if start.row == 0 || start.col == 0 {
            return Err(SheetError::Malformed(format!(
                "cell address is 1-based, got row {} col {}",
                start.row, start.col
            )));
        }

        let mut lines: Vec<Vec<Cell>> = Vec::with_capacity(table.len() + 1);
        if options.copy_head {
            lines.push(table.columns().iter().map(|c| Some(c.clone())).collect());
        }
        lines.extend(table.rows().iter().cloned());

        let mut grid = self.grid.borrow_mut();
        let last_row = start.row - 1 + lines.len();
        if last_row > grid.len() {
            if !options.extend && !lines.is_empty() {
                return Err(SheetError::Backend(format!(
                    "write to row {last_row} exceeds grid of {} rows",
                    grid.len()
                )));
            }
            grid.resize(last_row, Vec::new());
        }

        for (i, line) in lines.iter().enumerate() {
            let row = &mut grid[start.row - 1 + i];
            let needed = start.col - 1 + line.len();
            if row.len() < needed {
                row.resize(needed, None);
            }
            for (j, value) in line.iter().enumerate() {
                row[start.col - 1 + j] = match value.as_deref() {
                    None | Some("") if options.nan.is_empty() => None,
                    None => Some(options.nan.clone()),
                    Some(v) => Some(v.to_string()),
                };
            }
        }

        self.writes.borrow_mut().push(RecordedWrite {
            start,
            header: options.copy_head,
            rows: table.len(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBook {
    key: String,
    sheets: Vec<MemoryWorksheet>,
}

impl MemoryBook {
    pub fn new(key: &str, sheets: Vec<MemoryWorksheet>) -> Self {
        Self {
            key: key.to_string(),
            sheets,
        }
    }

    pub fn sheet(&self, title: &str) -> Option<&MemoryWorksheet> {
        self.sheets.iter().find(|s| s.title == title)
    }
}

impl Spreadsheet for MemoryBook {
    fn key(&self) -> &str {
        &self.key
    }

    fn worksheets(&self) -> Result<Vec<Box<dyn Worksheet + '_>>, SheetError> {
        Ok(self
            .sheets
            .iter()
            .map(|s| Box::new(s) as Box<dyn Worksheet + '_>)
            .collect())
    }

    fn worksheet(&self, selector: &WorksheetSelector) -> Result<Box<dyn Worksheet + '_>, SheetError> {
        let found = match selector {
            WorksheetSelector::Title(t) => self.sheets.iter().find(|s| &s.title == t),
            WorksheetSelector::Index(i) => self.sheets.get(*i),
        };
        found
            .map(|s| Box::new(s) as Box<dyn Worksheet + '_>)
            .ok_or_else(|| SheetError::NotFound(format!("worksheet {selector} in '{}'", self.key)))
    }
}

#[derive(Debug, Default)]
pub struct MemorySheets {
    books: Vec<MemoryBook>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book(mut self, book: MemoryBook) -> Self {
        self.books.push(book);
        self
    }

    pub fn book(&self, key: &str) -> Option<&MemoryBook> {
        self.books.iter().find(|b| b.key == key)
    }
}

impl SpreadsheetClient for MemorySheets {
    fn open_by_key(&self, key: &str) -> Result<Box<dyn Spreadsheet + '_>, SheetError> {
        self.book(key)
            .map(|b| Box::new(b) as Box<dyn Spreadsheet + '_>)
            .ok_or_else(|| SheetError::NotFound(format!("spreadsheet '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(["id", "v"]);
        t.push_row(vec![Some("1".into()), None]);
        t
    }

    #[test]
    fn empty_worksheet_reads_as_headerless_table() {
        let ws = MemoryWorksheet::empty("Sheet1");
        let t = ws.get_table().unwrap();
        assert!(t.columns().is_empty());
        assert!(t.is_empty());
    }

    #[test]
    fn round_trips_header_and_rows() {
        let ws = MemoryWorksheet::from_table("Sheet1", &sample());
        assert_eq!(ws.get_table().unwrap(), sample());
        assert_eq!(ws.used_rows(), 2);
    }

    #[test]
    fn rows_only_write_leaves_header() {
        let ws = MemoryWorksheet::from_table("Sheet1", &sample());
        let mut more = Table::new(["id", "v"]);
        more.push_row(vec![Some("2".into()), Some("x".into())]);

        ws.set_table(&more, CellRef::new(3, 1), &WriteOptions::rows_only()).unwrap();

        let t = ws.get_table().unwrap();
        assert_eq!(t.columns(), &["id", "v"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1, "v"), Some("x"));
        assert_eq!(
            ws.writes(),
            vec![RecordedWrite { start: CellRef::new(3, 1), header: false, rows: 1 }]
        );
    }

    #[test]
    fn write_without_extend_fails_past_grid() {
        let ws = MemoryWorksheet::empty("Sheet1");
        let opts = WriteOptions { extend: false, ..WriteOptions::rows_only() };
        assert!(ws.set_table(&sample(), CellRef::new(2, 1), &opts).is_err());
    }

    #[test]
    fn injected_failures_surface_as_backend_errors() {
        let ws = MemoryWorksheet::empty("Sheet1")
            .fail_writes_with("quota exceeded")
            .fail_reads_with("offline");
        assert_eq!(ws.get_table().unwrap_err(), SheetError::Backend("offline".into()));
        let err = ws.set_table(&sample(), CellRef::A1, &WriteOptions::with_header()).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn client_opens_books_by_key() {
        let client = MemorySheets::new().with_book(MemoryBook::new(
            "abc",
            vec![MemoryWorksheet::empty("A"), MemoryWorksheet::empty("B")],
        ));
        let book = client.open_by_key("abc").unwrap();
        let titles: Vec<String> = book
            .worksheets()
            .unwrap()
            .iter()
            .map(|w| w.title().to_string())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(book.worksheet(&WorksheetSelector::Index(1)).unwrap().title(), "B");
        assert!(client.open_by_key("nope").is_err());
        assert!(book.worksheet(&WorksheetSelector::Title("C".into())).is_err());
    }
}
