// src/api.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::fact::TrackedParameter;
use crate::paginate::PageFetcher;
use crate::publish::Publisher;
use crate::sweep::{run_cycle, SweepOptions};

/// Everything one cycle needs, constructed once at startup and reused across
/// cycles. No teardown; clients live for the process.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn PageFetcher>,
    pub publisher: Arc<dyn Publisher>,
    pub tracked: Arc<Vec<TrackedParameter>>,
    pub options: SweepOptions,
    pub cycle_deadline: Option<Duration>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sync", post(sync))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Run one ingestion cycle and answer with the count summary. Partial
/// per-parameter failures are logged inside the sweep, not reflected in the
/// status code; the enclosing scheduler is the retry mechanism.
async fn sync(State(state): State<AppState>) -> String {
    let mut options = state.options;
    options.deadline = state.cycle_deadline.map(|d| Instant::now() + d);

    let report = run_cycle(
        state.fetcher.as_ref(),
        state.publisher.as_ref(),
        &state.tracked,
        options,
    )
    .await;
    report.summary()
}
