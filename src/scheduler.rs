// src/scheduler.rs
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::api::AppState;
use crate::sweep::run_cycle;

/// Spawn the loop-mode shell: one ingestion cycle per tick. The first tick
/// fires immediately. Cycle failures never kill the loop; every parameter
/// error has already been swallowed inside the sweep.
pub fn spawn_cycle_scheduler(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let mut options = state.options;
            options.deadline = state.cycle_deadline.map(|d| Instant::now() + d);

            let report = run_cycle(
                state.fetcher.as_ref(),
                state.publisher.as_ref(),
                &state.tracked,
                options,
            )
            .await;

            tracing::info!(
                target: "ingest",
                published = report.published(),
                failed_parameters = report.failed_parameters(),
                "scheduled ingest tick"
            );
        }
    })
}
