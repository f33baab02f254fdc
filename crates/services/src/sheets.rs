//! Google Sheets REST v4 backend for the worksheet traits.
//!
//! Reads formatted values; writes with `valueInputOption=RAW`. A write that
//! runs past the worksheet grid appends rows/columns first when the caller
//! allows it.

use std::cell::RefCell;
use std::fmt;

use once_cell::unsync::OnceCell;
use reqwest::blocking::{RequestBuilder, Response};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use uocc_recon::{CellRef, SheetError, Spreadsheet, SpreadsheetClient, Table, Worksheet, WorksheetSelector, WriteOptions};

use crate::error::ServiceError;
use crate::metadata::{MetadataServer, SHEETS_SCOPE};
use crate::{check_status, http_client};

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

/// Where the bearer token comes from.
pub enum SheetsAuth {
    Static(String),
    Metadata(MetadataServer),
}

pub struct SheetsClient {
    http: reqwest::blocking::Client,
    api_base: String,
    auth: SheetsAuth,
    token: OnceCell<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub grid_properties: GridProperties,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Rows,
    Columns,
}

impl Dimension {
    fn as_str(self) -> &'static str {
        match self {
            Dimension::Rows => "ROWS",
            Dimension::Columns => "COLUMNS",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SheetsClient {
    pub fn new(auth: SheetsAuth) -> Result<Self, ServiceError> {
        Self::with_base_url(auth, SHEETS_API_BASE)
    }

    pub fn with_base_url(auth: SheetsAuth, api_base: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client()?,
            api_base: api_base.into(),
            auth,
            token: OnceCell::new(),
        })
    }

    /// Fetched on first use and kept for the client's lifetime.
    fn token(&self) -> Result<&str, ServiceError> {
        self.token
            .get_or_try_init(|| match &self.auth {
                SheetsAuth::Static(token) => Ok(token.clone()),
                SheetsAuth::Metadata(metadata) => metadata.access_token(&[SHEETS_SCOPE]),
            })
            .map(String::as_str)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url =
            Url::parse(&self.api_base).map_err(|e| ServiceError::Parse(format!("sheets api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Parse(format!("sheets api base has no path: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ServiceError> {
        let response = request
            .bearer_auth(self.token()?)
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        check_status(response)
    }

    pub fn sheet_properties(&self, key: &str) -> Result<Vec<SheetProperties>, ServiceError> {
        let url = self.url(&[key])?;
        let response = self.send(self.http.get(url).query(&[("fields", "sheets.properties")]))?;
        let meta: SpreadsheetMeta = response.json().map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    /// Formatted cell text, row-major. Trailing blanks are omitted by the API.
    pub fn read_values(&self, key: &str, range: &str) -> Result<Vec<Vec<String>>, ServiceError> {
        let url = self.url(&[key, "values", range])?;
        let response = self.send(self.http.get(url))?;
        let body: ValueRange = response.json().map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(value_text).collect())
            .collect())
    }

    pub fn update_values(&self, key: &str, range: &str, rows: &[Vec<String>]) -> Result<(), ServiceError> {
        let url = self.url(&[key, "values", range])?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.send(self.http.put(url).query(&[("valueInputOption", "RAW")]).json(&body))?;
        Ok(())
    }

    pub fn append_dimension(
        &self,
        key: &str,
        sheet_id: i64,
        dimension: Dimension,
        length: usize,
    ) -> Result<(), ServiceError> {
        let batch = format!("{key}:batchUpdate");
        let url = self.url(&[batch.as_str()])?;
        let body = json!({
            "requests": [{
                "appendDimension": {
                    "sheetId": sheet_id,
                    "dimension": dimension.as_str(),
                    "length": length,
                }
            }]
        });
        self.send(self.http.post(url).json(&body))?;
        Ok(())
    }
}

impl SpreadsheetClient for SheetsClient {
    fn open_by_key(&self, key: &str) -> Result<Box<dyn Spreadsheet + '_>, SheetError> {
        let sheets = self.sheet_properties(key)?;
        log::debug!("Opened spreadsheet {key} ({} worksheet(s))", sheets.len());
        Ok(Box::new(SheetsBook {
            client: self,
            key: key.to_string(),
            sheets,
        }))
    }
}

pub struct SheetsBook<'a> {
    client: &'a SheetsClient,
    key: String,
    sheets: Vec<SheetProperties>,
}

impl SheetsBook<'_> {
    fn tab(&self, props: &SheetProperties) -> SheetsWorksheet<'_> {
        SheetsWorksheet {
            client: self.client,
            key: &self.key,
            sheet_id: props.sheet_id,
            title: props.title.clone(),
            grid: RefCell::new(props.grid_properties),
        }
    }
}

impl Spreadsheet for SheetsBook<'_> {
    fn key(&self) -> &str {
        &self.key
    }

    fn worksheets(&self) -> Result<Vec<Box<dyn Worksheet + '_>>, SheetError> {
        let mut ordered: Vec<&SheetProperties> = self.sheets.iter().collect();
        ordered.sort_by_key(|p| p.index);
        Ok(ordered
            .into_iter()
            .map(|p| Box::new(self.tab(p)) as Box<dyn Worksheet + '_>)
            .collect())
    }

    fn worksheet(&self, selector: &WorksheetSelector) -> Result<Box<dyn Worksheet + '_>, SheetError> {
        let found = match selector {
            WorksheetSelector::Title(title) => self.sheets.iter().find(|p| &p.title == title),
            WorksheetSelector::Index(index) => self.sheets.iter().find(|p| p.index == *index),
        };
        found
            .map(|p| Box::new(self.tab(p)) as Box<dyn Worksheet + '_>)
            .ok_or_else(|| SheetError::NotFound(format!("worksheet {selector} in spreadsheet {}", self.key)))
    }
}

pub struct SheetsWorksheet<'a> {
    client: &'a SheetsClient,
    key: &'a str,
    sheet_id: i64,
    title: String,
    grid: RefCell<GridProperties>,
}

impl SheetsWorksheet<'_> {
    fn ensure_grid(&self, dimension: Dimension, needed: usize, extend: bool) -> Result<(), SheetError> {
        let current = {
            let grid = self.grid.borrow();
            match dimension {
                Dimension::Rows => grid.row_count,
                Dimension::Columns => grid.column_count,
            }
        };
        if needed <= current {
            return Ok(());
        }
        if !extend {
            return Err(SheetError::Backend(format!(
                "'{}': write needs {needed} {dimension} but the grid has {current}",
                self.title
            )));
        }
        log::debug!("'{}': appending {} {dimension}", self.title, needed - current);
        self.client
            .append_dimension(self.key, self.sheet_id, dimension, needed - current)?;
        let mut grid = self.grid.borrow_mut();
        match dimension {
            Dimension::Rows => grid.row_count = needed,
            Dimension::Columns => grid.column_count = needed,
        }
        Ok(())
    }
}

impl Worksheet for SheetsWorksheet<'_> {
    fn title(&self) -> &str {
        &self.title
    }

    fn get_table(&self) -> Result<Table, SheetError> {
        let values = self.client.read_values(self.key, &quote_title(&self.title))?;
        Ok(values_to_table(values))
    }

    fn set_table(&self, table: &Table, start: CellRef, options: &WriteOptions) -> Result<(), SheetError> {
        if start.row == 0 || start.col == 0 {
            return Err(SheetError::Malformed(format!(
                "cell address is 1-based, got row {} col {}",
                start.row, start.col
            )));
        }

        let mut lines: Vec<Vec<String>> = Vec::with_capacity(table.len() + 1);
        if options.copy_head {
            lines.push(table.columns().to_vec());
        }
        for row in table.rows() {
            lines.push(
                row.iter()
                    .map(|cell| cell.clone().unwrap_or_else(|| options.nan.clone()))
                    .collect(),
            );
        }
        if lines.is_empty() {
            return Ok(());
        }

        let width = lines.iter().map(Vec::len).max().unwrap_or(0);
        self.ensure_grid(Dimension::Rows, start.row - 1 + lines.len(), options.extend)?;
        self.ensure_grid(Dimension::Columns, start.col - 1 + width, options.extend)?;

        let range = format!("{}!{}", quote_title(&self.title), a1(start));
        self.client.update_values(self.key, &range, &lines)?;
        log::debug!("'{}': wrote {} line(s) at {}", self.title, lines.len(), a1(start));
        Ok(())
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Row 1 is the header; blank cells become missing.
pub fn values_to_table(values: Vec<Vec<String>>) -> Table {
    let mut lines = values.into_iter();
    let Some(header) = lines.next() else {
        return Table::default();
    };
    if header.iter().all(String::is_empty) {
        return Table::default();
    }
    let mut table = Table::new(header);
    for line in lines {
        table.push_row(
            line.into_iter()
                .map(|v| if v.is_empty() { None } else { Some(v) })
                .collect(),
        );
    }
    table
}

pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// `A1`-style address.
pub fn a1(cell: CellRef) -> String {
    let mut letters = String::new();
    let mut col = cell.col;
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.insert(0, char::from(b'A' + rem as u8));
        col = (col - 1) / 26;
    }
    format!("{letters}{}", cell.row)
}
