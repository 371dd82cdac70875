//! End-to-end ingestion runs against an in-memory provider.

use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use tickerlake_core::config::Config;
use tickerlake_core::data::{
    is_canonical, DataProvider, DataSource, FetchError, FetchResult, Interval, RawBar,
};
use tickerlake_core::output::{LONG_FILE, MANIFEST_FILE, WIDE_FILE};
use tickerlake_core::parquet::{read_dates, read_f64, read_parquet, read_str};
use tickerlake_core::store::RawStore;
use tickerlake_runner::{
    build_panel, ingest, rebuild, refresh, FetchPlan, RunError, SilentProgress, TickerOutcome,
};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn bar(day: u32, close: f64) -> RawBar {
    RawBar {
        date: d(day),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        adj_close: close,
        volume: 1_000,
    }
}

/// Serves fixed bars per ticker and records every request.
struct MockProvider {
    bars: HashMap<String, Vec<RawBar>>,
    failing: Vec<String>,
    block_after_failure: bool,
    blocked: Cell<bool>,
    requests: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            bars: HashMap::new(),
            failing: Vec::new(),
            block_after_failure: false,
            blocked: Cell::new(false),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn with(mut self, ticker: &str, bars: Vec<RawBar>) -> Self {
        self.bars.insert(ticker.to_string(), bars);
        self
    }

    fn failing(mut self, ticker: &str) -> Self {
        self.failing.push(ticker.to_string());
        self
    }
}

impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _interval: Interval,
    ) -> Result<FetchResult, FetchError> {
        self.requests
            .borrow_mut()
            .push((symbol.to_string(), start, end));
        if self.failing.iter().any(|f| f == symbol) {
            if self.block_after_failure {
                self.blocked.set(true);
                return Err(FetchError::CircuitBreakerTripped);
            }
            return Err(FetchError::NetworkUnreachable("mock outage".into()));
        }
        let bars = self
            .bars
            .get(symbol)
            .ok_or_else(|| FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Synthetic,
        })
    }

    fn is_available(&self) -> bool {
        !self.blocked.get()
    }
}

fn config(root: &Path, tickers: &[&str], end: &str) -> Config {
    let list: Vec<String> = tickers.iter().map(|t| format!("\"{t}\"")).collect();
    let doc = format!(
        r#"
source = "synthetic"
tickers = [{}]
start = "2024-01-02"
end = "{end}"
calendar = "B"

[paths]
raw = '{}'
processed = '{}'
"#,
        list.join(", "),
        root.join("raw").display(),
        root.join("processed").display(),
    );
    Config::from_toml_at(&doc, d(31)).unwrap()
}

fn read_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[test]
fn single_ticker_four_business_days() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL"], "2024-01-05");
    let provider = MockProvider::new().with(
        "AAPL",
        vec![bar(2, 185.0), bar(3, 184.0), bar(4, 182.0), bar(5, 181.0)],
    );

    let summary = ingest(&cfg, &provider, &SilentProgress).unwrap();
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.build.processed.long_rows, 4);

    let long = read_parquet(&dir.path().join("processed").join(LONG_FILE)).unwrap();
    let dates: Vec<_> = read_dates(&long, "date").unwrap().into_iter().flatten().collect();
    assert_eq!(dates, vec![d(2), d(3), d(4), d(5)]);
    assert_eq!(
        read_str(&long, "ticker").unwrap(),
        vec![Some("AAPL".to_string()); 4]
    );

    let ret = read_f64(&long, "ret_1d").unwrap();
    assert_eq!(ret[0], None);
    assert!(ret[1..].iter().all(Option::is_some));
    assert!((ret[1].unwrap() - (184.0 - 185.0) / 185.0).abs() < 1e-12);

    let manifest = dir.path().join("processed").join(MANIFEST_FILE);
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(manifest).unwrap()).unwrap();
    assert_eq!(value["AAPL"]["row_count"], 4);
    assert_eq!(value["AAPL"]["max_date"], "2024-01-05");
}

#[test]
fn rerun_without_new_data_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL", "MSFT"], "2024-01-05");
    let provider = MockProvider::new()
        .with("AAPL", vec![bar(2, 185.0), bar(3, 184.0), bar(5, 181.0)])
        .with("MSFT", vec![bar(3, 370.0), bar(4, 368.0), bar(5, 367.0)]);

    ingest(&cfg, &provider, &SilentProgress).unwrap();
    let processed = dir.path().join("processed");
    let files = [
        dir.path().join("raw").join("AAPL.parquet"),
        dir.path().join("raw").join("MSFT.parquet"),
        processed.join(LONG_FILE),
        processed.join(WIDE_FILE),
        processed.join(MANIFEST_FILE),
    ];
    let before: Vec<_> = files.iter().map(|p| read_bytes(p)).collect();

    let second = ingest(&cfg, &provider, &SilentProgress).unwrap();
    assert!(second
        .tickers
        .iter()
        .all(|t| matches!(t.outcome, TickerOutcome::UpToDate)));
    let after: Vec<_> = files.iter().map(|p| read_bytes(p)).collect();
    assert_eq!(before, after);

    // only the first run hit the provider
    assert_eq!(provider.requests.borrow().len(), 2);
}

#[test]
fn incremental_append_requests_only_new_dates() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new().with(
        "AAPL",
        vec![
            bar(2, 1.0),
            bar(3, 2.0),
            bar(4, 3.0),
            bar(5, 4.0),
            bar(8, 5.0),
            bar(9, 6.0),
        ],
    );

    ingest(&config(dir.path(), &["AAPL"], "2024-01-05"), &provider, &SilentProgress).unwrap();
    let summary =
        ingest(&config(dir.path(), &["AAPL"], "2024-01-09"), &provider, &SilentProgress).unwrap();

    assert_eq!(
        summary.tickers[0].plan,
        FetchPlan::Incremental { start: d(6), end: d(9) }
    );
    assert!(matches!(
        summary.tickers[0].outcome,
        TickerOutcome::Updated { added: 2, total: 6 }
    ));
    assert_eq!(provider.requests.borrow()[1], ("AAPL".to_string(), d(6), d(9)));

    let raw = RawStore::new(dir.path().join("raw")).load("AAPL").unwrap().unwrap();
    assert!(is_canonical(&raw));
    assert_eq!(raw.len(), 6);
}

#[test]
fn every_fetch_failing_is_fatal_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL", "MSFT"], "2024-01-05");
    let provider = MockProvider::new().failing("AAPL").failing("MSFT");

    let err = ingest(&cfg, &provider, &SilentProgress).unwrap_err();
    assert!(matches!(err, RunError::AllFetchesFailed { failed: 2 }));
    assert!(!dir.path().join("processed").join(LONG_FILE).exists());
}

#[test]
fn one_failure_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL", "BAD", "MSFT"], "2024-01-05");
    let provider = MockProvider::new()
        .with("AAPL", vec![bar(2, 1.0), bar(3, 2.0)])
        .failing("BAD")
        .with("MSFT", vec![bar(2, 3.0), bar(3, 4.0)]);

    let summary = ingest(&cfg, &provider, &SilentProgress).unwrap();
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.build.missing, vec!["BAD".to_string()]);
    assert_eq!(summary.build.processed.tickers, 2);
}

#[test]
fn tripped_breaker_skips_remaining_tickers() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL", "BLOCK", "MSFT"], "2024-01-05");
    let mut provider = MockProvider::new()
        .with("AAPL", vec![bar(2, 1.0)])
        .failing("BLOCK")
        .with("MSFT", vec![bar(2, 3.0)]);
    provider.block_after_failure = true;

    let summary = ingest(&cfg, &provider, &SilentProgress).unwrap();
    assert!(matches!(
        summary.tickers[2].outcome,
        TickerOutcome::Failed(FetchError::CircuitBreakerTripped)
    ));
    let requested: Vec<String> = provider.requests.borrow().iter().map(|r| r.0.clone()).collect();
    assert_eq!(requested, vec!["AAPL", "BLOCK"]);
}

#[test]
fn rebuild_matches_ingest_output() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL"], "2024-01-05");
    let provider = MockProvider::new().with("AAPL", vec![bar(2, 1.0), bar(3, 2.0), bar(4, 3.0)]);
    ingest(&cfg, &provider, &SilentProgress).unwrap();

    let long_path = dir.path().join("processed").join(LONG_FILE);
    let before = read_bytes(&long_path);
    std::fs::remove_file(&long_path).unwrap();

    let build = rebuild(&cfg).unwrap();
    assert_eq!(build.processed.long_rows, 3);
    assert_eq!(read_bytes(&long_path), before);
}

#[test]
fn refresh_refetches_full_range() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL"], "2024-01-05");
    let provider = MockProvider::new().with("AAPL", vec![bar(2, 1.0), bar(3, 2.0)]);
    ingest(&cfg, &provider, &SilentProgress).unwrap();

    let summary = refresh(&cfg, &provider, &SilentProgress).unwrap();
    assert_eq!(
        summary.tickers[0].plan,
        FetchPlan::Full { start: d(2), end: d(5) }
    );
    assert_eq!(provider.requests.borrow().len(), 2);
}

#[test]
fn degenerate_factor_row_stays_undefined_through_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["AAPL"], "2024-01-04");
    let store = RawStore::new(&cfg.paths.raw);
    let zero_close = RawBar {
        close: 0.0,
        adj_close: 101.0,
        ..bar(3, 101.0)
    };
    store
        .merge_and_write("AAPL", vec![bar(2, 100.0), zero_close, bar(4, 102.0)])
        .unwrap();

    let (panel, missing, errors) = build_panel(&cfg, &store).unwrap();
    assert!(missing.is_empty());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].date, d(3));

    let rows = &panel.series["AAPL"];
    assert_eq!(rows.len(), 3);
    let bad = &rows[1];
    assert_eq!(bad.date, d(3));
    assert_eq!(bad.open, None);
    assert_eq!(bad.high, None);
    assert_eq!(bad.low, None);
    assert_eq!(bad.close, None);
    assert_eq!(bad.volume, None);
    assert_eq!(rows[2].close, Some(102.0));
}
