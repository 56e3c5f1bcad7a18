// src/sweep.rs
//
// Fans one ingestion cycle across the tracked parameter set. Each parameter
// gets its own pagination run; a failure there is logged and the sweep moves
// on to the next parameter. Nothing persists between cycles — every cycle
// starts from page 1 and leans on the upstream "latest" semantics (or the
// overlap window) for freshness.

use std::time::{Duration, Instant};

use metrics::{counter, gauge};

use crate::fact::TrackedParameter;
use crate::paginate::{PageBudget, PageFetcher, Paginator, PaginatorCfg};
use crate::publish::Publisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Full pagination per parameter, for the one-off historical load.
    Bulk,
    /// One short page per parameter per cycle.
    Incremental,
}

impl SweepMode {
    fn budget(self) -> PageBudget {
        match self {
            SweepMode::Bulk => PageBudget::Unbounded,
            SweepMode::Incremental => PageBudget::Pages(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    pub mode: SweepMode,
    pub page_limit: u32,
    pub pacing: Duration,
    /// External deadline honored between pages.
    pub deadline: Option<Instant>,
}

impl SweepOptions {
    pub fn incremental(page_limit: u32, pacing: Duration) -> Self {
        Self {
            mode: SweepMode::Incremental,
            page_limit,
            pacing,
            deadline: None,
        }
    }

    pub fn bulk(page_limit: u32, pacing: Duration) -> Self {
        Self {
            mode: SweepMode::Bulk,
            page_limit,
            pacing,
            deadline: None,
        }
    }

    fn paginator_cfg(&self) -> PaginatorCfg {
        PaginatorCfg {
            limit: self.page_limit,
            pacing: self.pacing,
            budget: self.mode.budget(),
            deadline: self.deadline,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterOutcome {
    pub parameter_id: i64,
    pub label: String,
    pub published: u64,
    pub pages: u32,
    pub failed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub per_parameter: Vec<ParameterOutcome>,
}

impl SweepReport {
    pub fn published(&self) -> u64 {
        self.per_parameter.iter().map(|p| p.published).sum()
    }

    pub fn failed_parameters(&self) -> usize {
        self.per_parameter.iter().filter(|p| p.failed).count()
    }

    /// The human-readable summary returned by the trigger surface.
    pub fn summary(&self) -> String {
        format!(
            "Successfully sent {} measurements to Pub/Sub.",
            self.published()
        )
    }
}

/// Drain one pagination run: fetch pages, normalize every record, publish
/// every fact. Returns the outcome for that run; `failed` marks a fetch error
/// that cut the run short.
pub async fn drain(
    fetcher: &dyn PageFetcher,
    publisher: &dyn Publisher,
    parameter: &TrackedParameter,
    tracked: &[TrackedParameter],
    cfg: PaginatorCfg,
) -> ParameterOutcome {
    let mut pager = Paginator::new(fetcher, parameter.id, cfg);
    let mut published = 0u64;
    let mut failed = false;

    loop {
        match pager.next_page().await {
            Ok(Some(batch)) => {
                let records = batch.len();
                let mut rejected = 0u64;
                for raw in &batch {
                    let facts = crate::normalize::normalize(raw, parameter.id, tracked);
                    if facts.is_empty() {
                        rejected += 1;
                    }
                    for fact in facts {
                        match publisher.publish(&fact) {
                            Ok(_handle) => {
                                published += 1;
                                counter!("ingest_published_total").increment(1);
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = ?e,
                                    parameter_id = parameter.id,
                                    publisher = publisher.name(),
                                    "publish error"
                                );
                                counter!("ingest_publish_errors_total").increment(1);
                            }
                        }
                    }
                }
                counter!("ingest_rejected_total").increment(rejected);
                tracing::debug!(
                    parameter = %parameter.label,
                    page = pager.pages_fetched(),
                    records,
                    "page processed"
                );
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    parameter_id = parameter.id,
                    parameter = %parameter.label,
                    source = fetcher.name(),
                    "fetch error, parameter sweep aborted for this cycle"
                );
                counter!("ingest_fetch_errors_total").increment(1);
                failed = true;
                break;
            }
        }
    }

    ParameterOutcome {
        parameter_id: parameter.id,
        label: parameter.label.clone(),
        published,
        pages: pager.pages_fetched(),
        failed,
    }
}

/// Sweep every tracked parameter once. Parameters are isolated: one failing
/// never aborts the rest.
pub async fn sweep(
    fetcher: &dyn PageFetcher,
    publisher: &dyn Publisher,
    tracked: &[TrackedParameter],
    options: SweepOptions,
) -> SweepReport {
    let mut report = SweepReport::default();
    for parameter in tracked {
        let outcome = drain(fetcher, publisher, parameter, tracked, options.paginator_cfg()).await;
        tracing::info!(
            parameter = %outcome.label,
            published = outcome.published,
            pages = outcome.pages,
            failed = outcome.failed,
            "parameter swept"
        );
        report.per_parameter.push(outcome);
    }
    report
}

/// One full ingestion cycle, as invoked by the HTTP trigger or the loop
/// scheduler. Per-parameter failures are swallowed here by design; the next
/// cycle is the retry mechanism.
pub async fn run_cycle(
    fetcher: &dyn PageFetcher,
    publisher: &dyn Publisher,
    tracked: &[TrackedParameter],
    options: SweepOptions,
) -> SweepReport {
    crate::metrics::ensure_ingest_metrics_described();

    let report = sweep(fetcher, publisher, tracked, options).await;

    counter!("ingest_cycles_total").increment(1);
    gauge!("ingest_last_cycle_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
    tracing::info!(
        published = report.published(),
        failed_parameters = report.failed_parameters(),
        "ingestion cycle finished"
    );
    report
}
