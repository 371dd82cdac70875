//! CSV import provider.
//!
//! Reads `<dir>/<TICKER>.csv` as exported by Yahoo Finance
//! (`Date,Open,High,Low,Close,Adj Close,Volume`) or with snake_case headers.

use super::canonicalize::canonicalize;
use super::provider::{DataProvider, DataSource, FetchError, FetchResult, Interval, RawBar};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: String,
    #[serde(alias = "Open")]
    open: Option<f64>,
    #[serde(alias = "High")]
    high: Option<f64>,
    #[serde(alias = "Low")]
    low: Option<f64>,
    #[serde(alias = "Close")]
    close: Option<f64>,
    #[serde(alias = "Adj Close", alias = "adjclose")]
    adj_close: Option<f64>,
    #[serde(alias = "Volume")]
    volume: Option<f64>,
}

pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn read_file(path: &Path) -> Result<Vec<RawBar>, FetchError> {
        let import_err = |reason: String| FetchError::Import {
            path: path.display().to_string(),
            reason,
        };

        let mut reader = csv::Reader::from_path(path).map_err(|e| import_err(e.to_string()))?;
        let mut bars = Vec::new();

        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| import_err(format!("row {}: {e}", line + 1)))?;
            // Yahoo exports may carry a time suffix; only the date part matters
            let date_part = row.date.get(..10).unwrap_or(&row.date);
            let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map_err(|e| import_err(format!("row {}: bad date '{}': {e}", line + 1, row.date)))?;
            let close = row.close.unwrap_or(f64::NAN);

            bars.push(RawBar {
                date,
                open: row.open.unwrap_or(f64::NAN),
                high: row.high.unwrap_or(f64::NAN),
                low: row.low.unwrap_or(f64::NAN),
                close,
                // files without an adjusted column are treated as already adjusted
                adj_close: row.adj_close.unwrap_or(close),
                volume: row.volume.map(|v| v.max(0.0).round() as u64).unwrap_or(0),
            });
        }

        Ok(canonicalize(bars))
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _interval: Interval,
    ) -> Result<FetchResult, FetchError> {
        let path = self.file_for(symbol);
        if !path.exists() {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let bars = Self::read_file(&path)?
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();

        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::CsvImport,
        })
    }
}
