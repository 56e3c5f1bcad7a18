// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_ingest_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_records_total",
            "Raw records received from the upstream API."
        );
        describe_counter!(
            "ingest_published_total",
            "Facts handed to the message bus (attempted publishes)."
        );
        describe_counter!(
            "ingest_rejected_total",
            "Raw records dropped by the completeness gate."
        );
        describe_counter!("ingest_fetch_errors_total", "Terminal page-fetch errors.");
        describe_counter!(
            "ingest_publish_errors_total",
            "Synchronous or observed publish failures."
        );
        describe_counter!("ingest_cycles_total", "Completed ingestion cycles.");
        describe_gauge!("ingest_last_cycle_ts", "Unix ts of the last finished cycle.");
        describe_histogram!("ingest_page_fetch_ms", "Upstream page fetch time in ms.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. Call once at startup, before the
    /// first cycle runs.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_ingest_metrics_described();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
