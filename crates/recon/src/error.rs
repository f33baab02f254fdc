use std::fmt;

/// Failure reported by a worksheet backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    /// Spreadsheet or worksheet does not exist.
    NotFound(String),
    /// Backend could not be reached or rejected the request.
    Backend(String),
    /// Backend answered with data we cannot interpret.
    Malformed(String),
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Backend(msg) => write!(f, "sheet backend error: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed sheet data: {msg}"),
        }
    }
}

impl std::error::Error for SheetError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// A column the operation keys on is absent from the table.
    MissingColumn { table: String, column: String },
    /// Row width does not match the table header.
    RowWidth { expected: usize, found: usize },
    /// A district ledger lists no worksheets and the spreadsheet has none.
    NoWorksheets { district: String },
    /// Worksheet read or write failed.
    Sheet(SheetError),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::RowWidth { expected, found } => {
                write!(f, "row has {found} cell(s), header has {expected}")
            }
            Self::NoWorksheets { district } => {
                write!(f, "district '{district}': ledger has no worksheets")
            }
            Self::Sheet(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<SheetError> for ReconError {
    fn from(err: SheetError) -> Self {
        Self::Sheet(err)
    }
}
