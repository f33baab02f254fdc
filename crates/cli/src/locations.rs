//! Facility locations and contacts: sheet tables to feature-service rows.
//!
//! Sheet headers are free text; feature-service field names are not. The
//! renaming here produces the field names the hosted layers were published
//! with, then applies the configured fix-ups.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use serde_json::{Map, Number, Value};
use uocc_config::settings::LocationSettings;
use uocc_recon::{district_for_county, Table};
use uocc_services::{Feature, Point, SpatialReference};

use crate::error::SkidError;

/// Web Mercator.
pub const WEB_MERCATOR_WKID: u32 = 3857;

const EARTH_RADIUS_M: f64 = 6_378_137.0;
/// Web Mercator is undefined at the poles.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Feature-service field name for a sheet header.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`; a leading run of
/// digits and underscores moves to the end (`2023 Gallons` -> `Gallons2023_`).
pub fn agol_field_name(header: &str) -> String {
    let cleaned: String = header
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let lead = cleaned
        .find(|c: char| !(c.is_ascii_digit() || c == '_'))
        .unwrap_or(cleaned.len());
    if lead == 0 || lead == cleaned.len() {
        return cleaned;
    }
    format!("{}{}", &cleaned[lead..], &cleaned[..lead])
}

/// Rename every column with [`agol_field_name`]. Names that collide are
/// logged; the first column with a name wins lookups.
pub fn rename_for_agol(table: &mut Table) {
    let renames: HashMap<String, String> = table
        .columns()
        .iter()
        .map(|c| (c.clone(), agol_field_name(c)))
        .collect();
    table.rename_columns(&renames);

    let mut seen = HashSet::new();
    for column in table.columns() {
        if !seen.insert(column.as_str()) {
            log::warn!("More than one sheet column maps to field '{column}'");
        }
    }
}

/// Locations worksheet to the layer's columns: field names fixed up,
/// contact columns dropped, district code added from the county.
pub fn prepare_locations(mut table: Table, settings: &LocationSettings) -> Result<Table, SkidError> {
    rename_for_agol(&mut table);
    let renames: HashMap<String, String> = settings.renames.clone().into_iter().collect();
    table.rename_columns(&renames);
    let drops: Vec<&str> = settings.drop_columns.iter().map(String::as_str).collect();
    table.drop_columns(&drops);

    let county = table.require_column("locations", &settings.county_field)?;
    table.set_column(&settings.district_field, |row| {
        row[county].as_deref().map(district_for_county)
    });
    Ok(table)
}

/// Contacts registry to the contacts table layer's columns.
pub fn prepare_contacts(contacts: &Table) -> Table {
    let mut table = contacts.clone();
    rename_for_agol(&mut table);
    table
}

/// WGS84 longitude/latitude in degrees to Web Mercator metres.
pub fn web_mercator(longitude: f64, latitude: f64) -> (f64, f64) {
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS_M * longitude.to_radians();
    let y = EARTH_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Blank, missing and zero coordinates mean "not geocoded".
fn has_coordinate(cell: Option<&str>) -> bool {
    match cell.map(str::trim) {
        None | Some("") => false,
        Some(text) => text.parse::<f64>().map(|v| v != 0.0).unwrap_or(true),
    }
}

fn parse_coordinate(cell: Option<&str>, column: &str, row: usize) -> Result<f64, SkidError> {
    let text = cell.unwrap_or_default().trim();
    text.parse::<f64>()
        .map_err(|_| SkidError::Locations(format!("row {row}: {column} '{text}' is not a number")))
}

fn float_value(text: &str) -> Value {
    text.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Accepts `84101` and `84101.0`; anything else is null.
fn int_value(text: &str) -> Value {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Value::from(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Value::from(v as i64),
        _ => Value::Null,
    }
}

/// Row attributes. Missing cells are null, typed columns are coerced.
pub fn attributes(
    table: &Table,
    row: &[Option<String>],
    float_columns: &HashSet<&str>,
    int_columns: &HashSet<&str>,
) -> Map<String, Value> {
    let mut attributes = Map::new();
    for (column, cell) in table.columns().iter().zip(row) {
        let value = match cell.as_deref() {
            None => Value::Null,
            Some(text) if float_columns.contains(column.as_str()) => float_value(text),
            Some(text) if int_columns.contains(column.as_str()) => int_value(text),
            Some(text) => Value::String(text.to_string()),
        };
        attributes.entry(column.clone()).or_insert(value);
    }
    attributes
}

/// Point features for every geocoded location.
pub fn location_features(table: &Table, settings: &LocationSettings) -> Result<Vec<Feature>, SkidError> {
    let lat = table.require_column("locations", &settings.latitude_field)?;
    let lon = table.require_column("locations", &settings.longitude_field)?;
    let floats: HashSet<&str> = settings.float_columns.iter().map(String::as_str).collect();
    let ints: HashSet<&str> = settings.int_columns.iter().map(String::as_str).collect();

    let mut features = Vec::with_capacity(table.len());
    let mut skipped = 0usize;
    for (i, row) in table.rows().iter().enumerate() {
        let (lat_cell, lon_cell) = (row[lat].as_deref(), row[lon].as_deref());
        if !has_coordinate(lat_cell) || !has_coordinate(lon_cell) {
            skipped += 1;
            continue;
        }
        let sheet_row = i + 2;
        let latitude = parse_coordinate(lat_cell, &settings.latitude_field, sheet_row)?;
        let longitude = parse_coordinate(lon_cell, &settings.longitude_field, sheet_row)?;
        let (x, y) = web_mercator(longitude, latitude);
        features.push(Feature {
            attributes: attributes(table, row, &floats, &ints),
            geometry: Some(Point {
                x,
                y,
                spatial_reference: SpatialReference { wkid: WEB_MERCATOR_WKID },
            }),
        });
    }
    if skipped > 0 {
        log::info!("Skipped {skipped} location(s) without coordinates");
    }
    Ok(features)
}

/// Attribute-only rows for a table layer.
pub fn table_features(table: &Table) -> Vec<Feature> {
    let none = HashSet::new();
    table
        .rows()
        .iter()
        .map(|row| Feature {
            attributes: attributes(table, row, &none, &none),
            geometry: None,
        })
        .collect()
}
