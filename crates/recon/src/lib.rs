//! `uocc-recon`: response distribution and contact reconciliation.
//!
//! Pure engine crate: works on in-memory tables and talks to spreadsheets
//! only through the [`sheet`] traits. No HTTP, no process state.

pub mod alias;
pub mod contacts;
pub mod distribute;
pub mod district;
pub mod error;
pub mod memory;
pub mod sheet;
pub mod table;
pub mod timestamp;

pub use alias::normalize_aliases;
pub use contacts::{reconcile, ContactFields, Reconciliation, NO_UPDATES_STATUS};
pub use distribute::{distribute, DistrictLedger, ResponseKeys};
pub use district::district_for_county;
pub use error::{ReconError, SheetError};
pub use sheet::{CellRef, Spreadsheet, SpreadsheetClient, Worksheet, WorksheetSelector, WriteOptions};
pub use table::{update_by_key, Cell, Table};
