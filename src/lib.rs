// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod client;
pub mod config;
pub mod fact;
pub mod metrics;
pub mod normalize;
pub mod paginate;
pub mod publish;
pub mod scheduler;
pub mod sweep;

// ---- Re-exports for stable public API ----
pub use crate::fact::{Fact, TrackedParameter};
pub use crate::paginate::{PageBudget, PageFetcher, Paginator, PaginatorCfg};
pub use crate::publish::{DeliveryHandle, Publisher};
pub use crate::sweep::{run_cycle, sweep, SweepMode, SweepOptions, SweepReport};
