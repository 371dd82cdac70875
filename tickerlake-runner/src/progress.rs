//! Progress callbacks for multi-ticker runs.

use crate::plan::FetchPlan;
use tickerlake_core::data::FetchError;

/// Progress callback for the fetch loop.
pub trait DownloadProgress {
    /// Called before a ticker is fetched (or skipped as up to date).
    fn on_start(&self, ticker: &str, index: usize, total: usize, plan: &FetchPlan);

    /// Called when a ticker finishes. `Ok` carries the number of new bars.
    fn on_complete(
        &self,
        ticker: &str,
        index: usize,
        total: usize,
        result: Result<usize, &FetchError>,
    );

    /// Called once the whole ticker list has been processed.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Reports progress as tracing events.
pub struct TracingProgress;

impl DownloadProgress for TracingProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize, plan: &FetchPlan) {
        tracing::info!("[{}/{}] {ticker}: {plan}", index + 1, total);
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: Result<usize, &FetchError>,
    ) {
        match result {
            Ok(0) => tracing::info!(ticker, "no new bars"),
            Ok(n) => tracing::info!(ticker, new_bars = n, "fetched"),
            Err(e) => tracing::warn!(ticker, error = %e, "fetch failed, skipping"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        if failed == 0 {
            tracing::info!("fetch complete: {succeeded}/{total} succeeded");
        } else {
            tracing::warn!("fetch complete: {succeeded}/{total} succeeded, {failed} failed");
        }
    }
}

/// Discards every event.
pub struct SilentProgress;

impl DownloadProgress for SilentProgress {
    fn on_start(&self, _: &str, _: usize, _: usize, _: &FetchPlan) {}
    fn on_complete(&self, _: &str, _: usize, _: usize, _: Result<usize, &FetchError>) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
}
