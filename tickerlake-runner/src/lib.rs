//! tickerlake runner: ingestion orchestration on top of `tickerlake-core`.
//!
//! - `ingest`: incremental (or full) fetch per ticker, raw merge, rebuild
//! - `rebuild`: recompute processed outputs from raw files only
//! - `refresh`: wipe everything and fetch the full range again

pub mod pipeline;
pub mod plan;
pub mod progress;

pub use pipeline::{
    build_panel, ingest, rebuild, refresh, BuildSummary, IngestSummary, RunError, TickerOutcome,
    TickerReport,
};
pub use plan::{plan_fetch, FetchPlan};
pub use progress::{DownloadProgress, SilentProgress, TracingProgress};
