//! OpenAQ ingestion service — binary entrypoint.
//! Boots the HTTP trigger surface (`POST /sync`, `/health`, `/metrics`) and,
//! when `INGEST_INTERVAL_SECS` is set, a loop scheduler running one cycle per
//! tick next to it.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use openaq_ingest::api::{create_router, AppState};
use openaq_ingest::client::{LatestFetcher, MeasurementsFetcher, OpenAqClient};
use openaq_ingest::config::{load_tracked_default, FetchSource, IngestConfig};
use openaq_ingest::metrics::Metrics;
use openaq_ingest::paginate::PageFetcher;
use openaq_ingest::publish::PubsubPublisher;
use openaq_ingest::scheduler::spawn_cycle_scheduler;
use openaq_ingest::sweep::SweepOptions;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("openaq_ingest=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = IngestConfig::from_env()?;
    let tracked = load_tracked_default()?;
    tracing::info!(
        tracked = tracked.len(),
        source = ?cfg.source,
        "starting openaq-ingest"
    );

    let metrics = Metrics::init();

    let client = Arc::new(OpenAqClient::new(
        &cfg.api_base,
        cfg.api_key.clone(),
        cfg.request_timeout,
    )?);
    let fetcher: Arc<dyn PageFetcher> = match cfg.source {
        FetchSource::Latest => Arc::new(LatestFetcher::new(client)),
        FetchSource::Measurements => Arc::new(MeasurementsFetcher::new(client, cfg.overlap)),
    };
    let publisher = Arc::new(PubsubPublisher::new(
        &cfg.pubsub_endpoint,
        &cfg.pubsub_project,
        &cfg.pubsub_topic,
        cfg.pubsub_token.clone(),
    ));

    let state = AppState {
        fetcher,
        publisher,
        tracked: Arc::new(tracked),
        options: SweepOptions::incremental(cfg.page_limit, cfg.pacing),
        cycle_deadline: cfg.cycle_deadline,
    };

    if let Some(interval) = cfg.interval {
        tracing::info!(interval_secs = interval.as_secs(), "loop scheduler enabled");
        spawn_cycle_scheduler(state.clone(), interval);
    }

    let router = create_router(state).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, router).await.context("http server")?;
    Ok(())
}
