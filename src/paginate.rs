// src/paginate.rs
//
// Sequential page cursor over a rate-limited upstream endpoint. Pages start
// at 1 and advance until the upstream returns an empty batch, the page budget
// runs out, the deadline passes, or a fetch fails. A fetch failure is
// terminal for this cursor: the next scheduled cycle is the retry mechanism,
// not this one.

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One bounded fetch against a paged endpoint. Implementations must not
/// retry internally; an `Err` ends the pagination for this cycle.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, parameter_id: i64, page: u32, limit: u32) -> Result<Vec<Value>>;
    fn name(&self) -> &'static str;
}

/// How many pages a single pagination run may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageBudget {
    /// Full drain, for the initial bulk load.
    Unbounded,
    /// At most this many pages, for steady-state polling.
    Pages(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct PaginatorCfg {
    pub limit: u32,
    /// Fixed inter-page delay, applied before every request after the first.
    pub pacing: Duration,
    pub budget: PageBudget,
    /// External deadline, checked between pages only.
    pub deadline: Option<Instant>,
}

impl Default for PaginatorCfg {
    fn default() -> Self {
        Self {
            limit: 100,
            pacing: Duration::from_millis(500),
            budget: PageBudget::Unbounded,
            deadline: None,
        }
    }
}

pub struct Paginator<'a> {
    fetcher: &'a dyn PageFetcher,
    parameter_id: i64,
    cfg: PaginatorCfg,
    page: u32,
    fetched: u32,
    done: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, parameter_id: i64, cfg: PaginatorCfg) -> Self {
        Self {
            fetcher,
            parameter_id,
            cfg,
            page: 1,
            fetched: 0,
            done: false,
        }
    }

    /// Fetch the next page. `Ok(None)` means the sequence is exhausted
    /// (empty batch, budget, or deadline); `Err` means the fetch failed and
    /// the cursor is dead. Both are final: later calls return `Ok(None)`.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.done {
            return Ok(None);
        }
        if let PageBudget::Pages(max) = self.cfg.budget {
            if self.fetched >= max {
                self.done = true;
                return Ok(None);
            }
        }
        if let Some(deadline) = self.cfg.deadline {
            if Instant::now() >= deadline {
                tracing::debug!(
                    parameter_id = self.parameter_id,
                    page = self.page,
                    "pagination deadline reached"
                );
                self.done = true;
                return Ok(None);
            }
        }
        if self.page > 1 && !self.cfg.pacing.is_zero() {
            tokio::time::sleep(self.cfg.pacing).await;
        }

        let batch = match self
            .fetcher
            .fetch_page(self.parameter_id, self.page, self.cfg.limit)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        self.fetched += 1;
        if batch.is_empty() {
            self.done = true;
            return Ok(None);
        }
        self.page += 1;
        Ok(Some(batch))
    }

    /// Number of requests issued so far.
    pub fn pages_fetched(&self) -> u32 {
        self.fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves `pages` in order, then empty batches forever. A page holding a
    /// single `"boom"` marker fails instead.
    struct ScriptedFetcher {
        pages: Vec<Vec<Value>>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<Vec<Value>>) -> Self {
            Self {
                pages,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, _parameter_id: i64, page: u32, _limit: u32) -> Result<Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let batch = self
                .pages
                .get((page - 1) as usize)
                .cloned()
                .unwrap_or_default();
            if batch.first() == Some(&json!("boom")) {
                return Err(anyhow!("injected fetch failure on page {page}"));
            }
            Ok(batch)
        }
        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn no_pacing(budget: PageBudget) -> PaginatorCfg {
        PaginatorCfg {
            limit: 10,
            pacing: Duration::ZERO,
            budget,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn terminates_on_empty_batch_and_conserves_records() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![json!({"a": 1}), json!({"a": 2})],
            vec![json!({"a": 3})],
            vec![],
        ]);
        let mut pager = Paginator::new(&fetcher, 2, no_pacing(PageBudget::Unbounded));

        let mut total = 0usize;
        while let Some(batch) = pager.next_page().await.unwrap() {
            total += batch.len();
        }
        assert_eq!(total, 3);
        assert_eq!(pager.pages_fetched(), 3); // two full pages + the empty one
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);

        // Exhausted cursor stays exhausted without further requests.
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fetch_failure_is_terminal() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![json!({"a": 1})],
            vec![json!("boom")],
            vec![json!({"a": 2})],
        ]);
        let mut pager = Paginator::new(&fetcher, 2, no_pacing(PageBudget::Unbounded));

        assert!(pager.next_page().await.unwrap().is_some());
        assert!(pager.next_page().await.is_err());
        // Dead cursor: no retry, no further fetches.
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn page_budget_caps_requests() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![json!({"a": 1})],
            vec![json!({"a": 2})],
            vec![json!({"a": 3})],
        ]);
        let mut pager = Paginator::new(&fetcher, 2, no_pacing(PageBudget::Pages(1)));

        assert_eq!(pager.next_page().await.unwrap().unwrap().len(), 1);
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_deadline_stops_before_fetching() {
        let fetcher = ScriptedFetcher::new(vec![vec![json!({"a": 1})]]);
        let cfg = PaginatorCfg {
            deadline: Some(Instant::now() - Duration::from_secs(1)),
            ..no_pacing(PageBudget::Unbounded)
        };
        let mut pager = Paginator::new(&fetcher, 2, cfg);
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
