//! Spreadsheet backend seam.
//!
//! The engine talks to spreadsheets only through these traits. Rows and
//! columns are 1-based as in the sheet UI; row 1 holds the header.

use crate::error::SheetError;
use crate::table::Table;

/// How to pick one worksheet out of a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorksheetSelector {
    Title(String),
    /// 0-based position in the spreadsheet's tab order.
    Index(usize),
}

impl std::fmt::Display for WorksheetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title(t) => write!(f, "title '{t}'"),
            Self::Index(i) => write!(f, "index {i}"),
        }
    }
}

/// 1-based cell address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub const A1: CellRef = CellRef { row: 1, col: 1 };

    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Options for [`Worksheet::set_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Write the header row before the data rows.
    pub copy_head: bool,
    /// Grow the worksheet grid when the write runs past it.
    pub extend: bool,
    /// Text written for missing cells.
    pub nan: String,
}

impl WriteOptions {
    /// Data rows only, grid grows as needed. Used for appends.
    pub fn rows_only() -> Self {
        Self {
            copy_head: false,
            extend: true,
            nan: String::new(),
        }
    }

    /// Header plus rows, grid grows as needed. Used for full rewrites.
    pub fn with_header() -> Self {
        Self {
            copy_head: true,
            extend: true,
            nan: String::new(),
        }
    }
}

pub trait SpreadsheetClient {
    fn open_by_key(&self, key: &str) -> Result<Box<dyn Spreadsheet + '_>, SheetError>;
}

pub trait Spreadsheet {
    fn key(&self) -> &str;

    /// Every worksheet, in tab order.
    fn worksheets(&self) -> Result<Vec<Box<dyn Worksheet + '_>>, SheetError>;

    fn worksheet(&self, selector: &WorksheetSelector) -> Result<Box<dyn Worksheet + '_>, SheetError>;
}

pub trait Worksheet {
    fn title(&self) -> &str;

    /// Whole worksheet as a table; row 1 is the header. An empty worksheet
    /// yields a table with no columns.
    fn get_table(&self) -> Result<Table, SheetError>;

    fn set_table(&self, table: &Table, start: CellRef, options: &WriteOptions) -> Result<(), SheetError>;
}

impl<T: Worksheet + ?Sized> Worksheet for &T {
    fn title(&self) -> &str {
        (**self).title()
    }

    fn get_table(&self) -> Result<Table, SheetError> {
        (**self).get_table()
    }

    fn set_table(&self, table: &Table, start: CellRef, options: &WriteOptions) -> Result<(), SheetError> {
        (**self).set_table(table, start, options)
    }
}

impl<T: Spreadsheet + ?Sized> Spreadsheet for &T {
    fn key(&self) -> &str {
        (**self).key()
    }

    fn worksheets(&self) -> Result<Vec<Box<dyn Worksheet + '_>>, SheetError> {
        (**self).worksheets()
    }

    fn worksheet(&self, selector: &WorksheetSelector) -> Result<Box<dyn Worksheet + '_>, SheetError> {
        (**self).worksheet(selector)
    }
}
