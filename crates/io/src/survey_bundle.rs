// Survey form package rewriting
//
// A survey item's data is a zip archive. The facility list the form draws
// from is a CSV inside it; every other entry is copied through untouched.

use std::fmt;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// Archive could not be read or written
    Archive(String),
    /// No entry path ends with the requested name
    EntryNotFound(String),
    Csv(String),
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleError::Archive(msg) => write!(f, "survey bundle: {msg}"),
            BundleError::EntryNotFound(name) => write!(f, "survey bundle has no entry named {name}"),
            BundleError::Csv(msg) => write!(f, "CSV error: {msg}"),
        }
    }
}

impl std::error::Error for BundleError {}

impl From<zip::result::ZipError> for BundleError {
    fn from(err: zip::result::ZipError) -> Self {
        BundleError::Archive(err.to_string())
    }
}

/// `path` names `entry_name` itself or a file called `entry_name` in some
/// folder of the archive.
fn matches_entry(path: &str, entry_name: &str) -> bool {
    path == entry_name || path.ends_with(&format!("/{entry_name}"))
}

/// Copy `bundle`, replacing every entry that matches `entry_name` with
/// `csv`. Returns the new archive bytes.
pub fn rewrite_csv_entry(bundle: &[u8], entry_name: &str, csv: &str) -> Result<Vec<u8>, BundleError> {
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(bundle.len())));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut replaced = 0usize;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if !entry.is_dir() && matches_entry(&name, entry_name) {
            drop(entry);
            writer.start_file(name.as_str(), options)?;
            writer
                .write_all(csv.as_bytes())
                .map_err(|e| BundleError::Archive(e.to_string()))?;
            log::debug!("Replaced {name} in survey bundle ({} bytes)", csv.len());
            replaced += 1;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }

    if replaced == 0 {
        return Err(BundleError::EntryNotFound(entry_name.to_string()));
    }
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
