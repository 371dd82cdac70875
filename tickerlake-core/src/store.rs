//! Per-ticker raw history on disk.
//!
//! Layout: `{raw_dir}/{TICKER}.parquet`, one file per ticker holding the full
//! canonical history (sorted by date, unique dates). Fresh bars are merged
//! into the existing file and the whole history is rewritten atomically.

use crate::data::canonicalize::{canonicalize, merge};
use crate::data::provider::RawBar;
use crate::parquet::{frame_to_raw_bars, raw_bars_to_frame, read_parquet, write_parquet, StoreError};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// Summary of one raw file, for `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFileStatus {
    pub ticker: String,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub rows: usize,
    pub bytes: u64,
}

/// Outcome of merging fresh bars into a ticker's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Rows in the file after the merge.
    pub total: usize,
    /// Rows whose date was not stored before.
    pub added: usize,
    /// Whether the file was rewritten.
    pub written: bool,
}

pub struct RawStore {
    dir: PathBuf,
}

impl RawStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}.parquet"))
    }

    /// Stored history, or `None` when the ticker has no file yet.
    pub fn load(&self, ticker: &str) -> Result<Option<Vec<RawBar>>, StoreError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let df = read_parquet(&path)?;
        let bars = frame_to_raw_bars(&df).map_err(|e| StoreError::parquet(&path, e))?;
        Ok(Some(canonicalize(bars)))
    }

    /// Last stored date, if any.
    pub fn last_date(&self, ticker: &str) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self
            .load(ticker)?
            .and_then(|bars| bars.last().map(|b| b.date)))
    }

    /// Merge `fresh` into the stored history and rewrite the file.
    ///
    /// Fresh bars win date conflicts. With nothing fresh the file is left
    /// untouched.
    pub fn merge_and_write(
        &self,
        ticker: &str,
        fresh: Vec<RawBar>,
    ) -> Result<MergeOutcome, StoreError> {
        let existing = self.load(ticker)?.unwrap_or_default();
        if fresh.is_empty() {
            return Ok(MergeOutcome {
                total: existing.len(),
                added: 0,
                written: false,
            });
        }

        let before = existing.len();
        let merged = merge(existing, fresh);
        let added = merged.len() - before;

        let path = self.path_for(ticker);
        let mut df = raw_bars_to_frame(&merged).map_err(|e| StoreError::parquet(&path, e))?;
        write_parquet(&mut df, &path)?;
        tracing::debug!(ticker, rows = merged.len(), added, "raw file written");

        Ok(MergeOutcome {
            total: merged.len(),
            added,
            written: true,
        })
    }

    /// Tickers with a raw file, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut tickers = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tickers.push(stem.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }

    pub fn status(&self) -> Result<Vec<RawFileStatus>, StoreError> {
        self.list()?
            .into_iter()
            .map(|ticker| {
                let path = self.path_for(&ticker);
                let bytes = fs::metadata(&path)
                    .map_err(|e| StoreError::io(&path, e))?
                    .len();
                let bars = self.load(&ticker)?.unwrap_or_default();
                Ok(RawFileStatus {
                    first_date: bars.first().map(|b| b.date),
                    last_date: bars.last().map(|b| b.date),
                    rows: bars.len(),
                    bytes,
                    ticker,
                })
            })
            .collect()
    }

    /// Remove every raw file.
    pub fn wipe(&self) -> Result<usize, StoreError> {
        let tickers = self.list()?;
        for ticker in &tickers {
            let path = self.path_for(ticker);
            fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
        }
        Ok(tickers.len())
    }
}
