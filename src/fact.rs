// src/fact.rs
use anyhow::{Context, Result};

/// The canonical measurement record published downstream.
///
/// Wire form is a flat JSON map with exactly these four keys; rejection of
/// incomplete records happens in `normalize`, before a `Fact` ever exists.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Fact {
    pub location_id: i64,
    pub parameter_id: i64,
    pub value: f64,
    pub timestamp: String, // ISO-8601 UTC, taken verbatim from upstream
}

impl Fact {
    /// Encode to the canonical wire form.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("encoding fact to wire form")
    }

    /// Decode from the canonical wire form.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("decoding fact from wire form")
    }
}

/// One tracked pollutant: a small integer id plus a human label.
/// The set is fixed at deploy time (config file or the built-in default),
/// never discovered from upstream.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrackedParameter {
    pub id: i64,
    pub label: String,
}

impl TrackedParameter {
    pub fn new(id: i64, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
        }
    }

    /// Loose label match: case-insensitive, punctuation ignored, so the
    /// upstream's "pm25" resolves against our "PM2.5".
    pub fn matches_label(&self, name: &str) -> bool {
        fn fold(s: &str) -> String {
            s.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect()
        }
        fold(&self.label) == fold(name)
    }
}

/// Default tracked set when no config file overrides it.
pub fn default_tracked_set() -> Vec<TrackedParameter> {
    vec![
        TrackedParameter::new(2, "PM2.5"),
        TrackedParameter::new(1, "PM10"),
        TrackedParameter::new(11, "NO2"),
        TrackedParameter::new(6, "O3"),
    ]
}
