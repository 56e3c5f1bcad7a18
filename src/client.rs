// src/client.rs
//
// Thin reqwest client for the OpenAQ API. One client is built at startup and
// shared for the life of the process. Every request carries the X-API-Key
// header and the fixed timeout from config; a non-2xx status or transport
// error surfaces as an `Err`, which the paginator treats as terminal for
// that parameter's sweep this cycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;

use crate::paginate::PageFetcher;

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    results: Vec<Value>,
}

pub struct OpenAqClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAqClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building openaq http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_results(&self, url: &str) -> Result<Vec<Value>> {
        let t0 = std::time::Instant::now();
        let mut req = self.http.get(url);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-Key", key);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let envelope: ApiEnvelope = resp
            .json()
            .await
            .with_context(|| format!("decoding response of GET {url}"))?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_page_fetch_ms").record(ms);
        counter!("ingest_records_total").increment(envelope.results.len() as u64);
        Ok(envelope.results)
    }

    /// `GET /v3/parameters/{id}/latest` — one page of latest readings for a
    /// single parameter.
    pub async fn latest_page(&self, parameter_id: i64, page: u32, limit: u32) -> Result<Vec<Value>> {
        let url = format!(
            "{}/v3/parameters/{}/latest?limit={}&page={}",
            self.base_url, parameter_id, limit, page
        );
        self.get_results(&url).await
    }

    /// `GET /v3/locations` — one page of monitor stations with embedded
    /// sensors (the location-with-sensors shape).
    pub async fn locations_page(&self, page: u32, limit: u32) -> Result<Vec<Value>> {
        let url = format!(
            "{}/v3/locations?limit={}&page={}&monitor=true",
            self.base_url, limit, page
        );
        self.get_results(&url).await
    }

    /// `GET /v2/measurements` — the older flat shape, filtered to an overlap
    /// window ending now. Pagination here is by page number too; `date_from`
    /// only narrows the window.
    pub async fn measurements_page(
        &self,
        overlap: Duration,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Value>> {
        let date_from = (Utc::now() - chrono::Duration::from_std(overlap).unwrap_or_default())
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let url = format!(
            "{}/v2/measurements?limit={}&page={}&date_from={}&order_by=datetime",
            self.base_url, limit, page, date_from
        );
        self.get_results(&url).await
    }
}

/// Per-parameter fetcher over the latest endpoint; the sweep's default source.
pub struct LatestFetcher {
    client: Arc<OpenAqClient>,
}

impl LatestFetcher {
    pub fn new(client: Arc<OpenAqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for LatestFetcher {
    async fn fetch_page(&self, parameter_id: i64, page: u32, limit: u32) -> Result<Vec<Value>> {
        self.client.latest_page(parameter_id, page, limit).await
    }
    fn name(&self) -> &'static str {
        "latest"
    }
}

/// Fetcher over the flat measurements endpoint with an overlap window.
/// Not parameter-scoped: the swept parameter id is ignored and each record's
/// parameter resolves by name during normalization.
pub struct MeasurementsFetcher {
    client: Arc<OpenAqClient>,
    overlap: Duration,
}

impl MeasurementsFetcher {
    pub fn new(client: Arc<OpenAqClient>, overlap: Duration) -> Self {
        Self { client, overlap }
    }
}

#[async_trait]
impl PageFetcher for MeasurementsFetcher {
    async fn fetch_page(&self, _parameter_id: i64, page: u32, limit: u32) -> Result<Vec<Value>> {
        self.client.measurements_page(self.overlap, page, limit).await
    }
    fn name(&self) -> &'static str {
        "measurements"
    }
}

/// Fetcher over the locations endpoint (stations with embedded sensors).
/// Not parameter-scoped; each sensor carries its own parameter id.
pub struct LocationsFetcher {
    client: Arc<OpenAqClient>,
}

impl LocationsFetcher {
    pub fn new(client: Arc<OpenAqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for LocationsFetcher {
    async fn fetch_page(&self, _parameter_id: i64, page: u32, limit: u32) -> Result<Vec<Value>> {
        self.client.locations_page(page, limit).await
    }
    fn name(&self) -> &'static str {
        "locations"
    }
}
