// Table to CSV

use uocc_recon::Table;

use crate::survey_bundle::BundleError;

/// Render `table` as CSV with a header row. `columns` projects and orders
/// the output; empty means every column. Missing cells render empty.
pub fn table_to_csv(table: &Table, columns: &[String]) -> Result<String, BundleError> {
    let projected = if columns.is_empty() {
        table.clone()
    } else {
        let wanted: Vec<&str> = columns.iter().map(String::as_str).collect();
        table
            .select("survey csv", &wanted)
            .map_err(|e| BundleError::Csv(e.to_string()))?
    };

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(projected.columns())
        .map_err(|e| BundleError::Csv(e.to_string()))?;
    for row in projected.rows() {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .map_err(|e| BundleError::Csv(e.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| BundleError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BundleError::Csv(e.to_string()))
}
