//! HTTP client for the ALeRCE alert broker.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::{BrokerError, BrokerResult, ErrorContext};
use super::{AlertBroker, ConeQuery};
use crate::models::{CandidateRecord, LightCurve, ObjectId, StampKind};

pub const DEFAULT_API_URL: &str = "https://api.alerce.online/ztf/v1";
pub const DEFAULT_STAMPS_URL: &str = "https://avro.alerce.online";

/// Default cap on pages fetched for one cone search.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// One page of the object search endpoint.
#[derive(Debug, Deserialize)]
pub struct ObjectsPage {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub has_next: Option<bool>,
    #[serde(default)]
    pub items: Vec<CandidateRecord>,
}

/// Decode an object-search response body.
pub fn parse_objects_page(body: &str) -> BrokerResult<ObjectsPage> {
    serde_json::from_str(body).map_err(|e| {
        BrokerError::decode(
            e.to_string(),
            ErrorContext::new("query_objects").with_entity("objects_page"),
        )
    })
}

/// Whether the service holds results past `page`.
///
/// `has_next` decides when present; otherwise a full page implies another.
/// An empty page always ends the search.
pub fn has_more(page: &ObjectsPage, page_size: u32) -> bool {
    let count = page.items.len();
    if count == 0 {
        return false;
    }
    page.has_next.unwrap_or(count as u64 >= u64::from(page_size))
}

/// Fetch pages `1..` until the service runs out, failing with
/// [`BrokerError::PageLimit`] when results remain after `max_pages`.
pub async fn collect_pages<F, Fut>(
    max_pages: u32,
    page_size: u32,
    mut fetch: F,
) -> BrokerResult<Vec<CandidateRecord>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = BrokerResult<ObjectsPage>>,
{
    let mut records = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page).await?;
        let more = has_more(&batch, page_size);
        records.extend(batch.items);
        if !more {
            return Ok(records);
        }
        if page >= max_pages {
            let context = ErrorContext::new("query_objects")
                .with_entity("objects_page")
                .with_entity_id(page);
            return Err(BrokerError::page_limit(max_pages, records.len(), context));
        }
        page += 1;
    }
}

/// Query-string parameters for one page of a cone search.
pub fn query_params(query: &ConeQuery, page: u32, page_size: u32) -> Vec<(&'static str, String)> {
    vec![
        ("ra", query.center.ra_deg().to_string()),
        ("dec", query.center.dec_deg().to_string()),
        ("radius", query.radius_arcsec.to_string()),
        ("firstmjd", query.window.start.value().to_string()),
        ("firstmjd", query.window.end.value().to_string()),
        ("ndet", query.min_detections.to_string()),
        ("page", page.to_string()),
        ("page_size", page_size.to_string()),
    ]
}

/// ALeRCE REST client.
#[derive(Debug, Clone)]
pub struct AlerceClient {
    client: reqwest::Client,
    api_url: String,
    stamps_url: String,
    page_size: u32,
    max_pages: u32,
}

impl AlerceClient {
    pub fn new(
        api_url: impl Into<String>,
        stamps_url: impl Into<String>,
        timeout: Duration,
        page_size: u32,
    ) -> BrokerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            stamps_url: stamps_url.into().trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn get_text(
        &self,
        url: &str,
        params: &[(&str, String)],
        context: ErrorContext,
    ) -> BrokerResult<String> {
        log::debug!("GET {} {:?}", url, params);
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| BrokerError::from_reqwest(e, context.clone()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::from_reqwest(e, context.clone()))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BrokerError::not_found("resource not found", context.with_details(url)));
        }
        if !status.is_success() {
            return Err(BrokerError::status(status.as_u16(), body.trim().to_string(), context));
        }
        Ok(body)
    }
}

#[async_trait]
impl AlertBroker for AlerceClient {
    async fn query_objects(&self, query: &ConeQuery) -> BrokerResult<Vec<CandidateRecord>> {
        let url = format!("{}/objects/", self.api_url);
        let mut records = collect_pages(self.max_pages, self.page_size, |page| {
            let params = query_params(query, page, self.page_size);
            let context = ErrorContext::new("query_objects")
                .with_entity("objects_page")
                .with_entity_id(page);
            let url = &url;
            async move {
                let body = self.get_text(url, &params, context).await?;
                parse_objects_page(&body)
            }
        })
        .await?;

        // The service treats some parameters loosely; apply them again here.
        let total = records.len();
        records.retain(|r| query.matches(r));
        if records.len() != total {
            log::debug!("Dropped {} objects outside the query constraints", total - records.len());
        }
        log::info!("Broker returned {} objects", records.len());
        Ok(records)
    }

    async fn light_curve(&self, oid: &ObjectId) -> BrokerResult<LightCurve> {
        let url = format!("{}/objects/{}/lightcurve", self.api_url, oid);
        let context = ErrorContext::new("light_curve")
            .with_entity("object")
            .with_entity_id(oid);
        let body = self.get_text(&url, &[], context.clone()).await?;
        let curve: LightCurve =
            serde_json::from_str(&body).map_err(|e| BrokerError::decode(e.to_string(), context))?;
        Ok(curve.sorted())
    }

    async fn stamp(&self, oid: &ObjectId, candid: &str, kind: StampKind) -> BrokerResult<Vec<u8>> {
        let url = format!("{}/get_stamp", self.stamps_url);
        let context = ErrorContext::new("stamp")
            .with_entity(kind.as_str())
            .with_entity_id(format!("{}/{}", oid, candid));
        let params = [
            ("oid", oid.to_string()),
            ("candid", candid.to_string()),
            ("type", kind.as_str().to_string()),
            ("format", "png".to_string()),
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
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BrokerError::not_found("stamp not available", context));
        }
        if !status.is_success() {
            return Err(BrokerError::status(status.as_u16(), "stamp request failed", context));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BrokerError::from_reqwest(e, context))?;
        Ok(bytes.to_vec())
    }
}
