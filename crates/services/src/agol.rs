//! ArcGIS Online / feature service client.
//!
//! Token auth via `generateToken`, item metadata and data, layer field
//! metadata, paged attribute queries, and truncate-and-load edits. ArcGIS
//! reports most failures as a 200 with an `error` object; both forms map to
//! [`ServiceError`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::blocking::multipart;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uocc_recon::Table;

use crate::error::ServiceError;
use crate::{check_status, http_client};

/// Page size for attribute queries.
pub const QUERY_PAGE_SIZE: usize = 2000;
/// Features per `addFeatures` request.
pub const ADD_CHUNK_SIZE: usize = 500;

const DATE_FIELD: &str = "esriFieldTypeDate";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// File name for file-backed items.
    #[serde(default)]
    pub name: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: String,
}

impl FieldInfo {
    /// Alias, or the field name when the layer defines none.
    pub fn label(&self) -> &str {
        self.alias.as_deref().filter(|a| !a.is_empty()).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub spatial_reference: SpatialReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

/// One row for `addFeatures`. Tables carry no geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Point>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct LayerInfo {
    #[serde(default)]
    fields: Vec<FieldInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    features: Vec<QueryFeature>,
    #[serde(default)]
    exceeded_transfer_limit: bool,
}

#[derive(Deserialize)]
struct QueryFeature {
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddResponse {
    #[serde(default)]
    add_results: Vec<EditResult>,
}

#[derive(Deserialize)]
struct EditResult {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<Value>,
}

pub struct FeatureServiceClient {
    http: reqwest::blocking::Client,
    org: String,
    token: Option<String>,
}

impl FeatureServiceClient {
    /// `org` is the portal root, e.g. `https://utahdeq.maps.arcgis.com`.
    pub fn new(org: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client()?,
            org: org.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<(), ServiceError> {
        let url = format!("{}/sharing/rest/generateToken", self.org);
        let form = [
            ("username", username),
            ("password", password),
            ("client", "referer"),
            ("referer", self.org.as_str()),
            ("expiration", "120"),
            ("f", "json"),
        ];
        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        let body = arcgis_json(check_status(response)?).map_err(|e| match e {
            ServiceError::Remote { message, .. } => ServiceError::Auth(message),
            other => other,
        })?;
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| ServiceError::Auth(format!("no token in response: {e}")))?;
        log::info!("Authenticated to {} as {username}", self.org);
        self.token = Some(token.token);
        Ok(())
    }

    fn token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }

    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ServiceError> {
        let response = self
            .http
            .get(url)
            .query(&[("f", "json"), ("token", self.token())])
            .query(query)
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        arcgis_json(check_status(response)?)
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value, ServiceError> {
        let mut fields: Vec<(&str, &str)> = vec![("f", "json"), ("token", self.token())];
        fields.extend_from_slice(form);
        let response = self
            .http
            .post(url)
            .form(&fields)
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        arcgis_json(check_status(response)?)
    }

    pub fn item(&self, item_id: &str) -> Result<ItemInfo, ServiceError> {
        let url = format!("{}/sharing/rest/content/items/{item_id}", self.org);
        let body = self.get_json(&url, &[])?;
        serde_json::from_value(body).map_err(|e| ServiceError::Parse(format!("item {item_id}: {e}")))
    }

    /// URL of the item's first layer or table (`<service>/0`).
    pub fn first_layer_url(&self, item_id: &str) -> Result<String, ServiceError> {
        let item = self.item(item_id)?;
        let service = item
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServiceError::Parse(format!("item {item_id} has no service url")))?;
        Ok(format!("{}/0", service.trim_end_matches('/')))
    }

    pub fn layer_fields(&self, layer_url: &str) -> Result<Vec<FieldInfo>, ServiceError> {
        let body = self.get_json(layer_url, &[])?;
        let layer: LayerInfo = serde_json::from_value(body).map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(layer.fields)
    }

    /// Field name to alias, in layer order.
    pub fn field_aliases(&self, layer_url: &str) -> Result<Vec<(String, String)>, ServiceError> {
        Ok(self
            .layer_fields(layer_url)?
            .into_iter()
            .map(|f| {
                let label = f.label().to_string();
                (f.name, label)
            })
            .collect())
    }

    /// Every row of the layer without geometry, columns in layer field order.
    pub fn query_table(&self, layer_url: &str) -> Result<Table, ServiceError> {
        let fields = self.layer_fields(layer_url)?;
        let date_fields: HashMap<&str, bool> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type == DATE_FIELD))
            .collect();
        let mut table = Table::new(fields.iter().map(|f| f.name.clone()));
        let url = format!("{layer_url}/query");
        let page_size = QUERY_PAGE_SIZE.to_string();
        let mut offset = 0usize;

        loop {
            let offset_text = offset.to_string();
            let body = self.get_json(
                &url,
                &[
                    ("where", "1=1"),
                    ("outFields", "*"),
                    ("returnGeometry", "false"),
                    ("resultOffset", offset_text.as_str()),
                    ("resultRecordCount", page_size.as_str()),
                ],
            )?;
            let page: QueryPage = serde_json::from_value(body).map_err(|e| ServiceError::Parse(e.to_string()))?;
            let count = page.features.len();
            for feature in page.features {
                let row = fields
                    .iter()
                    .map(|f| {
                        let is_date = date_fields.get(f.name.as_str()).copied().unwrap_or(false);
                        feature.attributes.get(&f.name).and_then(|v| cell_text(v, is_date))
                    })
                    .collect();
                table.push_row(row);
            }
            log::debug!("{layer_url}: fetched {count} row(s) at offset {offset}");
            offset += count;
            if !page.exceeded_transfer_limit || count == 0 {
                break;
            }
        }
        Ok(table)
    }

    /// Delete every feature in the layer.
    pub fn truncate(&self, layer_url: &str) -> Result<(), ServiceError> {
        self.post_form(&format!("{layer_url}/deleteFeatures"), &[("where", "1=1")])?;
        Ok(())
    }

    /// Add features in chunks; returns how many the service accepted.
    pub fn add_features(&self, layer_url: &str, features: &[Feature]) -> Result<usize, ServiceError> {
        let url = format!("{layer_url}/addFeatures");
        let mut added = 0;
        for chunk in features.chunks(ADD_CHUNK_SIZE) {
            let payload = serde_json::to_string(chunk).map_err(|e| ServiceError::Parse(e.to_string()))?;
            let body = self.post_form(&url, &[("features", payload.as_str()), ("rollbackOnFailure", "true")])?;
            let response: AddResponse = serde_json::from_value(body).map_err(|e| ServiceError::Parse(e.to_string()))?;
            if let Some(failed) = response.add_results.iter().find(|r| !r.success) {
                return Err(ServiceError::Remote {
                    code: 0,
                    message: format!(
                        "addFeatures rejected a feature: {}",
                        failed.error.clone().unwrap_or(Value::Null)
                    ),
                });
            }
            added += response.add_results.len();
        }
        Ok(added)
    }

    pub fn truncate_and_load(&self, layer_url: &str, features: &[Feature]) -> Result<usize, ServiceError> {
        log::info!("Truncating {layer_url}");
        self.truncate(layer_url)?;
        log::info!("Loading {} feature(s) into {layer_url}", features.len());
        self.add_features(layer_url, features)
    }

    /// Raw bytes of the item's data (e.g. a survey form package).
    pub fn download_item_data(&self, item_id: &str) -> Result<Vec<u8>, ServiceError> {
        let url = format!("{}/sharing/rest/content/items/{item_id}/data", self.org);
        let response = self
            .http
            .get(url)
            .query(&[("token", self.token())])
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        let bytes = check_status(response)?
            .bytes()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Replace the item's file with `data`.
    pub fn update_item_data(&self, item: &ItemInfo, file_name: &str, data: Vec<u8>) -> Result<(), ServiceError> {
        let url = format!(
            "{}/sharing/rest/content/users/{}/items/{}/update",
            self.org, item.owner, item.id
        );
        let part = multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .text("f", "json")
            .text("token", self.token().to_string())
            .text("overwrite", "true")
            .part("file", part);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        let body = arcgis_json(check_status(response)?)?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(ServiceError::Remote {
                code: 0,
                message: format!("item {} update not acknowledged: {body}", item.id),
            });
        }
        log::info!("Updated item {} ({file_name})", item.id);
        Ok(())
    }
}

/// Parse a JSON body, lifting an embedded `{"error": {...}}` to an error.
fn arcgis_json(response: reqwest::blocking::Response) -> Result<Value, ServiceError> {
    let body: Value = response.json().map_err(|e| ServiceError::Parse(e.to_string()))?;
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let mut message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        if let Some(details) = error.get("details").and_then(Value::as_array) {
            let details: Vec<&str> = details.iter().filter_map(Value::as_str).collect();
            if !details.is_empty() {
                message = format!("{message} ({})", details.join("; "));
            }
        }
        return Err(ServiceError::Remote { code, message });
    }
    Ok(body)
}

/// Attribute value as sheet-style text. Date fields (epoch ms) render as
/// `YYYY-MM-DD HH:MM:SS` UTC.
fn cell_text(value: &Value, is_date: bool) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if is_date => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .or_else(|| Some(n.to_string())),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn date_fields_render_as_utc_text() {
        assert_eq!(
            cell_text(&json!(1714564800000i64), true).as_deref(),
            Some("2024-05-01 12:00:00")
        );
        assert_eq!(cell_text(&json!(1714564800000i64), false).as_deref(), Some("1714564800000"));
        assert_eq!(cell_text(&Value::Null, true), None);
        assert_eq!(cell_text(&json!("Yes"), false).as_deref(), Some("Yes"));
    }

    #[test]
    fn label_falls_back_to_name() {
        let f = FieldInfo {
            name: "certify".into(),
            alias: Some(String::new()),
            field_type: "esriFieldTypeString".into(),
        };
        assert_eq!(f.label(), "certify");
    }

    #[test]
    fn feature_serializes_without_geometry_for_tables() {
        let mut attributes = Map::new();
        attributes.insert("ID_".into(), json!("12"));
        let feature = Feature { attributes, geometry: None };
        assert_eq!(serde_json::to_value(&feature).unwrap(), json!({"attributes": {"ID_": "12"}}));
    }

    #[test]
    fn point_carries_spatial_reference() {
        let p = Point {
            x: 1.0,
            y: 2.0,
            spatial_reference: SpatialReference { wkid: 3857 },
        };
        assert_eq!(
            serde_json::to_value(p).unwrap(),
            json!({"x": 1.0, "y": 2.0, "spatialReference": {"wkid": 3857}})
        );
    }
}
