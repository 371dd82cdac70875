//! Run orchestration: fetch → raw store → adjust → align → features → outputs.
//!
//! Fetching is per ticker and failure-tolerant. Everything after the raw
//! store is recomputed from disk on every run, so `rebuild` and the tail of
//! `ingest` share one code path.

use crate::plan::{plan_fetch, FetchPlan};
use crate::progress::DownloadProgress;
use std::collections::BTreeMap;
use thiserror::Error;
use tickerlake_core::config::{Config, ConfigError, UpdateMode};
use tickerlake_core::data::{DataProvider, FetchError};
use tickerlake_core::output::{ProcessedSummary, ProcessedWriter};
use tickerlake_core::panel::{Panel, PanelRow};
use tickerlake_core::store::RawStore;
use tickerlake_core::transform::{add_returns, adjust, align, AdjustmentError, AlignmentError};
use tickerlake_core::StoreError;

/// Fatal run errors.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot create data provider: {0}")]
    Provider(FetchError),

    #[error("every ticker failed to fetch ({failed} tickers)")]
    AllFetchesFailed { failed: usize },

    #[error("alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),
}

/// What happened to one ticker during the fetch phase.
#[derive(Debug)]
pub enum TickerOutcome {
    /// New bars were merged into the raw file.
    Updated { added: usize, total: usize },
    /// The request succeeded but returned nothing new.
    NoNewBars,
    /// Stored history already covers the configured range.
    UpToDate,
    /// Fetch failed; the ticker keeps whatever raw history it had.
    Failed(FetchError),
}

impl TickerOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TickerOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct TickerReport {
    pub ticker: String,
    pub plan: FetchPlan,
    pub outcome: TickerOutcome,
}

/// Result of rebuilding processed outputs from raw files.
#[derive(Debug)]
pub struct BuildSummary {
    pub processed: ProcessedSummary,
    /// Configured tickers without any raw history.
    pub missing: Vec<String>,
    pub adjustment_errors: Vec<AdjustmentError>,
}

#[derive(Debug)]
pub struct IngestSummary {
    pub tickers: Vec<TickerReport>,
    pub build: BuildSummary,
}

impl IngestSummary {
    pub fn failed(&self) -> usize {
        self.tickers.iter().filter(|t| t.outcome.is_failure()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.tickers.len() - self.failed()
    }
}

/// Fetch every configured ticker, update raw files, rebuild outputs.
///
/// A failed ticker is reported and skipped. When every ticker fails the run
/// stops with [`RunError::AllFetchesFailed`] before touching processed files.
pub fn ingest(
    config: &Config,
    provider: &dyn DataProvider,
    progress: &dyn DownloadProgress,
) -> Result<IngestSummary, RunError> {
    let store = RawStore::new(&config.paths.raw);
    let tickers = fetch_all(config, provider, &store, progress)?;

    let failed = tickers.iter().filter(|t| t.outcome.is_failure()).count();
    if failed == tickers.len() && failed > 0 {
        return Err(RunError::AllFetchesFailed { failed });
    }

    let build = rebuild(config)?;
    Ok(IngestSummary { tickers, build })
}

/// Wipe raw and processed data, then ingest the full configured range.
pub fn refresh(
    config: &Config,
    provider: &dyn DataProvider,
    progress: &dyn DownloadProgress,
) -> Result<IngestSummary, RunError> {
    let removed = RawStore::new(&config.paths.raw).wipe()?;
    ProcessedWriter::new(&config.paths.processed).wipe()?;
    tracing::info!(removed, "raw and processed data wiped");

    let full = Config {
        update: UpdateMode::Full,
        ..config.clone()
    };
    ingest(&full, provider, progress)
}

fn fetch_all(
    config: &Config,
    provider: &dyn DataProvider,
    store: &RawStore,
    progress: &dyn DownloadProgress,
) -> Result<Vec<TickerReport>, RunError> {
    let total = config.tickers.len();
    let mut reports = Vec::with_capacity(total);

    for (i, ticker) in config.tickers.iter().enumerate() {
        let last = store.last_date(ticker)?;
        let plan = plan_fetch(config.update, last, config.start, config.end);
        progress.on_start(ticker, i, total, &plan);

        let Some((start, end)) = plan.window() else {
            progress.on_complete(ticker, i, total, Ok(0));
            reports.push(TickerReport {
                ticker: ticker.clone(),
                plan,
                outcome: TickerOutcome::UpToDate,
            });
            continue;
        };

        if !provider.is_available() {
            progress.on_complete(ticker, i, total, Err(&FetchError::CircuitBreakerTripped));
            reports.push(TickerReport {
                ticker: ticker.clone(),
                plan,
                outcome: TickerOutcome::Failed(FetchError::CircuitBreakerTripped),
            });
            continue;
        }

        let outcome = match provider.fetch(ticker, start, end, config.interval) {
            Ok(result) => {
                let merged = store.merge_and_write(ticker, result.bars)?;
                progress.on_complete(ticker, i, total, Ok(merged.added));
                if !merged.written {
                    TickerOutcome::NoNewBars
                } else {
                    TickerOutcome::Updated {
                        added: merged.added,
                        total: merged.total,
                    }
                }
            }
            Err(e) => {
                progress.on_complete(ticker, i, total, Err(&e));
                TickerOutcome::Failed(e)
            }
        };

        reports.push(TickerReport {
            ticker: ticker.clone(),
            plan,
            outcome,
        });
    }

    let failed = reports.iter().filter(|r| r.outcome.is_failure()).count();
    progress.on_batch_complete(total - failed, failed, total);
    Ok(reports)
}

/// Recompute processed outputs from the raw files of the configured tickers.
pub fn rebuild(config: &Config) -> Result<BuildSummary, RunError> {
    let store = RawStore::new(&config.paths.raw);
    let (panel, missing, adjustment_errors) = build_panel(config, &store)?;

    for ticker in &missing {
        tracing::warn!(%ticker, "no raw data, left out of processed outputs");
    }
    if !adjustment_errors.is_empty() {
        tracing::warn!(
            rows = adjustment_errors.len(),
            policy = ?config.on_bad_factor,
            "degenerate adjustment factors"
        );
        for e in &adjustment_errors {
            tracing::debug!("{e}");
        }
    }

    let processed = ProcessedWriter::new(&config.paths.processed).write(
        &panel,
        &config.columns,
        config.manifest,
    )?;

    Ok(BuildSummary {
        processed,
        missing,
        adjustment_errors,
    })
}

/// Load, adjust, align and feature every configured ticker.
pub fn build_panel(
    config: &Config,
    store: &RawStore,
) -> Result<(Panel, Vec<String>, Vec<AdjustmentError>), RunError> {
    let mut series: BTreeMap<String, Vec<PanelRow>> = BTreeMap::new();
    let mut missing = Vec::new();
    let mut errors = Vec::new();

    for ticker in &config.tickers {
        let Some(bars) = store.load(ticker)? else {
            missing.push(ticker.clone());
            continue;
        };
        let in_range: Vec<_> = bars
            .into_iter()
            .filter(|b| b.date >= config.start && b.date <= config.end)
            .collect();
        if in_range.is_empty() {
            missing.push(ticker.clone());
            continue;
        }
        let adjusted = adjust(ticker, &in_range, config.on_bad_factor);
        errors.extend(adjusted.errors);
        series.insert(ticker.clone(), adjusted.rows);
    }

    let mut panel = align(series, &config.calendar, config.ffill_limit)?;
    for rows in panel.series.values_mut() {
        add_returns(rows);
    }
    Ok((panel, missing, errors))
}
