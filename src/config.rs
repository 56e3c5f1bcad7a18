// src/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::fact::{default_tracked_set, TrackedParameter};

const ENV_TRACKED_PATH: &str = "TRACKED_PARAMETERS_PATH";

/// Which upstream endpoint feeds the steady-state cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Per-parameter `latest` endpoint (the default).
    Latest,
    /// Flat `measurements` endpoint with an overlap window.
    Measurements,
}

impl FromStr for FetchSource {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "measurements" => Ok(Self::Measurements),
            other => Err(anyhow!("unknown INGEST_SOURCE '{other}'")),
        }
    }
}

/// Process configuration, read once at startup from the environment
/// (`.env` is honored in local runs via dotenvy).
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub source: FetchSource,
    /// Overlap window for the measurements source.
    pub overlap: Duration,
    /// Page size for steady-state polling.
    pub page_limit: u32,
    /// Page size for the one-off bulk load.
    pub bulk_page_limit: u32,
    pub pacing: Duration,
    /// When set, a loop scheduler runs a cycle this often next to the HTTP
    /// trigger surface.
    pub interval: Option<Duration>,
    /// Soft per-cycle deadline, checked between pages.
    pub cycle_deadline: Option<Duration>,
    pub bind_addr: String,
    pub pubsub_endpoint: String,
    pub pubsub_project: String,
    pub pubsub_topic: String,
    pub pubsub_token: Option<String>,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        let source = match std::env::var("INGEST_SOURCE") {
            Ok(raw) => raw.parse()?,
            Err(_) => FetchSource::Latest,
        };
        Ok(Self {
            api_base: env_or("OPENAQ_API_BASE", "https://api.openaq.org"),
            api_key: std::env::var("OPENAQ_API_KEY").ok(),
            request_timeout: Duration::from_secs(env_parse("OPENAQ_TIMEOUT_SECS", 30)?),
            source,
            overlap: Duration::from_secs(env_parse("INGEST_OVERLAP_SECS", 3_600)?),
            page_limit: env_parse("INGEST_PAGE_LIMIT", 20)?,
            bulk_page_limit: env_parse("INGEST_BULK_PAGE_LIMIT", 1_000)?,
            pacing: Duration::from_millis(env_parse("INGEST_PACING_MS", 500)?),
            interval: env_parse_opt("INGEST_INTERVAL_SECS")?.map(Duration::from_secs),
            cycle_deadline: env_parse_opt("INGEST_CYCLE_DEADLINE_SECS")?.map(Duration::from_secs),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000"),
            pubsub_endpoint: env_or("PUBSUB_ENDPOINT", "https://pubsub.googleapis.com"),
            pubsub_project: std::env::var("PUBSUB_PROJECT_ID")
                .context("PUBSUB_PROJECT_ID is required")?,
            pubsub_topic: std::env::var("PUBSUB_TOPIC_ID").context("PUBSUB_TOPIC_ID is required")?,
            pubsub_token: std::env::var("PUBSUB_TOKEN").ok(),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("parsing {key}='{raw}'")),
        Err(_) => Ok(default),
    }
}

fn env_parse_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("parsing {key}='{raw}'")),
        Err(_) => Ok(None),
    }
}

/// Load the tracked parameter set from an explicit path. TOML or JSON.
pub fn load_tracked_from(path: &Path) -> Result<Vec<TrackedParameter>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading tracked parameters from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_tracked(&content, ext.as_str())
}

/// Load the tracked set using env var + fallbacks:
/// 1) $TRACKED_PARAMETERS_PATH
/// 2) config/tracked_parameters.toml
/// 3) config/tracked_parameters.json
/// 4) the built-in default set
pub fn load_tracked_default() -> Result<Vec<TrackedParameter>> {
    if let Ok(p) = std::env::var(ENV_TRACKED_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_tracked_from(&pb);
        }
        return Err(anyhow!(
            "TRACKED_PARAMETERS_PATH points to non-existent path"
        ));
    }
    let toml_p = PathBuf::from("config/tracked_parameters.toml");
    if toml_p.exists() {
        return load_tracked_from(&toml_p);
    }
    let json_p = PathBuf::from("config/tracked_parameters.json");
    if json_p.exists() {
        return load_tracked_from(&json_p);
    }
    Ok(default_tracked_set())
}

fn parse_tracked(s: &str, hint_ext: &str) -> Result<Vec<TrackedParameter>> {
    let try_toml = hint_ext == "toml" || s.contains("parameters");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported tracked-parameters format"))
}

fn parse_toml(s: &str) -> Result<Vec<TrackedParameter>> {
    #[derive(serde::Deserialize)]
    struct TomlSet {
        parameters: Vec<TrackedParameter>,
    }
    let v: TomlSet = toml::from_str(s)?;
    clean_set(v.parameters)
}

fn parse_json(s: &str) -> Result<Vec<TrackedParameter>> {
    let v: Vec<TrackedParameter> = serde_json::from_str(s)?;
    clean_set(v)
}

fn clean_set(items: Vec<TrackedParameter>) -> Result<Vec<TrackedParameter>> {
    use std::collections::BTreeMap;
    let mut by_id: BTreeMap<i64, TrackedParameter> = BTreeMap::new();
    for mut p in items {
        p.label = p.label.trim().to_string();
        if p.id == 0 || p.label.is_empty() {
            continue;
        }
        by_id.entry(p.id).or_insert(p);
    }
    if by_id.is_empty() {
        return Err(anyhow!("tracked parameter set is empty"));
    }
    Ok(by_id.into_values().collect())
}
