//! County -> local health district codes.

/// (county, district code). Every Utah county appears once.
pub const COUNTY_DISTRICTS: &[(&str, &str)] = &[
    ("Box Elder", "BRHD"),
    ("Cache", "BRHD"),
    ("Rich", "BRHD"),
    ("Weber", "WMHD"),
    ("Morgan", "WMHD"),
    ("Davis", "DCHD"),
    ("Salt Lake", "SLCoHD"),
    ("Utah", "UCHD"),
    ("Wasatch", "WCHD"),
    ("Summit", "SCHD"),
    ("Juab", "CUHD"),
    ("Millard", "CUHD"),
    ("Piute", "CUHD"),
    ("Sanpete", "CUHD"),
    ("Sevier", "CUHD"),
    ("Wayne", "CUHD"),
    ("Tooele", "TCHD"),
    ("Beaver", "SWUHD"),
    ("Iron", "SWUHD"),
    ("Kane", "SWUHD"),
    ("Washington", "SWUHD"),
    ("Garfield", "SWUHD"),
    ("San Juan", "SJHD"),
    ("Grand", "SEUHD"),
    ("Emery", "SEUHD"),
    ("Carbon", "SEUHD"),
    ("Duchesne", "TCHD"),
    ("Daggett", "TCHD"),
    ("Uintah", "TCHD"),
];

/// District code for a county name, trimmed first. Unknown counties come back
/// as the trimmed name itself.
pub fn district_for_county(county: &str) -> String {
    let county = county.trim();
    COUNTY_DISTRICTS
        .iter()
        .find(|(c, _)| *c == county)
        .map(|(_, d)| d.to_string())
        .unwrap_or_else(|| {
            log::warn!("county '{county}' has no district mapping; passing it through");
            county.to_string()
        })
}
