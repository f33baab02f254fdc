// File I/O operations

pub mod csv;
pub mod survey_bundle;

pub use crate::csv::table_to_csv;
pub use survey_bundle::{rewrite_csv_entry, BundleError};
