//! HTTP client for a catsHTM-style positional cross-match service.
//!
//! The service answers with one object per catalog, each mapping column name
//! to either `{"unit": .., "value": ..}` or a bare value. Values may be
//! scalars or arrays (one entry per source, nearest first). An empty object
//! means no source within the radius.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::error::{BrokerError, BrokerResult, ErrorContext};
use super::CatalogService;
use crate::models::{CatalogMatch, SkyDirection};

pub const DEFAULT_API_URL: &str = "https://catshtm.alerce.online";

/// Host-name columns tried in order.
pub fn default_name_columns() -> Vec<String> {
    ["GWGC_name", "HyperLEDA_name", "2MASS_name", "SDSS-DR12_name", "PGC", "Name"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Column layout of a catalog response.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnNames {
    pub name: Vec<String>,
    pub redshift: String,
    pub separation: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            name: default_name_columns(),
            redshift: "z".to_string(),
            separation: "Dist".to_string(),
        }
    }
}

fn column<'a>(table: &'a Value, name: &str) -> Option<&'a Value> {
    let entry = table
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)?;
    let value = match entry.get("value") {
        Some(v) => v,
        None => entry,
    };
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn as_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract the nearest match for `catalog` from a decoded response.
///
/// Returns `None` when the catalog has no row or no usable name column.
pub fn parse_crossmatch(body: &Value, catalog: &str, columns: &ColumnNames) -> Option<CatalogMatch> {
    let table = body
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(catalog))
        .map(|(_, v)| v)?;
    if table.as_object().is_none_or(|t| t.is_empty()) {
        return None;
    }

    let name = columns
        .name
        .iter()
        .find_map(|c| column(table, c).and_then(as_name))?;
    let redshift = column(table, &columns.redshift).and_then(as_f64);
    let separation_arcsec = column(table, &columns.separation).and_then(as_f64);

    Some(CatalogMatch {
        catalog: catalog.to_string(),
        name,
        redshift,
        separation_arcsec,
    })
}

/// catsHTM cross-match REST client.
#[derive(Debug, Clone)]
pub struct CatshtmClient {
    client: reqwest::Client,
    api_url: String,
    columns: ColumnNames,
}

impl CatshtmClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration, columns: ColumnNames) -> BrokerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            columns,
        })
    }
}

#[async_trait]
impl CatalogService for CatshtmClient {
    async fn nearest(
        &self,
        position: &SkyDirection,
        radius_arcsec: f64,
        catalog: &str,
    ) -> BrokerResult<Option<CatalogMatch>> {
        let url = format!("{}/crossmatch", self.api_url);
        let context = ErrorContext::new("crossmatch")
            .with_entity(catalog)
            .with_entity_id(position);
        let params = [
            ("ra", position.ra_deg().to_string()),
            ("dec", position.dec_deg().to_string()),
            ("radius", radius_arcsec.to_string()),
            ("catalog", catalog.to_string()),
        ];

        log::debug!("GET {} {:?}", url, params);
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| BrokerError::from_reqwest(e, context.clone()))?;

        let status = response.status();
        // The service reports "nothing found" as 404.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::from_reqwest(e, context.clone()))?;
        if !status.is_success() {
            return Err(BrokerError::status(status.as_u16(), body.trim().to_string(), context));
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| BrokerError::decode(e.to_string(), context))?;
        Ok(parse_crossmatch(&value, catalog, &self.columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_value_layout() {
        let body: Value = serde_json::from_str(
            r#"{
                "GWGC": {
                    "RA": {"unit": "deg", "value": 197.448},
                    "Dec": {"unit": "deg", "value": -23.384},
                    "GWGC_name": {"unit": null, "value": "NGC4993"},
                    "z": {"unit": null, "value": 0.009727},
                    "Dist": {"unit": "arcsec", "value": 10.6}
                }
            }"#,
        )
        .unwrap();

        let m = parse_crossmatch(&body, "GWGC", &ColumnNames::default()).unwrap();
        assert_eq!(m.catalog, "GWGC");
        assert_eq!(m.name, "NGC4993");
        assert_eq!(m.redshift, Some(0.009727));
        assert_eq!(m.separation_arcsec, Some(10.6));
    }

    #[test]
    fn test_parse_bare_arrays_take_nearest() {
        let body: Value = serde_json::from_str(
            r#"{"glade": {"PGC": [45657, 45700], "Z": ["0.0098", "0.02"]}}"#,
        )
        .unwrap();

        let m = parse_crossmatch(&body, "GLADE", &ColumnNames::default()).unwrap();
        assert_eq!(m.name, "45657");
        assert_eq!(m.redshift, Some(0.0098));
        assert!(m.separation_arcsec.is_none());
    }

    #[test]
    fn test_parse_empty_or_nameless() {
        let columns = ColumnNames::default();
        let empty: Value = serde_json::from_str(r#"{"GWGC": {}}"#).unwrap();
        assert!(parse_crossmatch(&empty, "GWGC", &columns).is_none());

        let other: Value = serde_json::from_str(r#"{"NED": {"Name": "x"}}"#).unwrap();
        assert!(parse_crossmatch(&other, "GWGC", &columns).is_none());

        let nameless: Value = serde_json::from_str(r#"{"GWGC": {"z": 0.01, "GWGC_name": null}}"#).unwrap();
        assert!(parse_crossmatch(&nameless, "GWGC", &columns).is_none());
    }

    #[test]
    fn test_non_finite_redshift_ignored() {
        let body: Value = serde_json::from_str(r#"{"GWGC": {"GWGC_name": "NGC4993", "z": "nan"}}"#).unwrap();
        let m = parse_crossmatch(&body, "GWGC", &ColumnNames::default()).unwrap();
        assert!(m.redshift.is_none());
    }
}
