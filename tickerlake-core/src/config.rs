//! Typed run configuration.
//!
//! The settings document is TOML. It is parsed into a loosely-typed
//! [`SettingsDocument`] and then validated into an immutable [`Config`]:
//! every enum-like value (source, interval, calendar, update mode, bad-factor
//! policy, column names) is resolved here, so an unknown value fails at load
//! time rather than halfway through a run.

use crate::data::provider::Interval;
use crate::panel::Field;
use crate::transform::adjust::BadFactorPolicy;
use crate::transform::calendar::CalendarPolicy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Fatal configuration problems. Raised before any fetch happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// Where bars come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Yahoo,
    Csv,
    Synthetic,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" | "yfinance" | "yahoo_finance" => Ok(SourceKind::Yahoo),
            "csv" => Ok(SourceKind::Csv),
            "synthetic" => Ok(SourceKind::Synthetic),
            other => Err(format!(
                "unknown source '{other}' (expected yahoo, csv or synthetic)"
            )),
        }
    }
}

impl SourceKind {
    /// Whether the source can deliver bars at `interval`.
    ///
    /// CSV files and the synthetic walk are daily only.
    pub fn supports(&self, interval: Interval) -> bool {
        match self {
            SourceKind::Yahoo => true,
            SourceKind::Csv | SourceKind::Synthetic => interval == Interval::Daily,
        }
    }
}

/// How raw history is refreshed on each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Request only bars after the last stored date, merge, rewrite.
    #[default]
    Incremental,
    /// Request the whole configured range every run, merge, rewrite.
    Full,
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(UpdateMode::Incremental),
            "full" => Ok(UpdateMode::Full),
            other => Err(format!(
                "unknown update mode '{other}' (expected incremental or full)"
            )),
        }
    }
}

/// Output and input directories. Threaded explicitly into every component.
#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    pub raw: PathBuf,
    pub processed: PathBuf,
    /// Import directory for `source = "csv"`.
    pub csv: Option<PathBuf>,
}

/// HTTP and circuit-breaker tuning for network providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_base_ms: 500,
            failure_threshold: 3,
            cooldown_secs: 30 * 60,
        }
    }
}

/// Thresholds for the processed-output validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSettings {
    /// Highest tolerated share of nulls per critical column.
    pub max_null_ratio: f64,
    /// Upper bound of the sane price band `(0, max_price]`.
    pub max_price: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_null_ratio: 0.02,
            max_price: 1_000_000.0,
        }
    }
}

/// The settings document as written on disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsDocument {
    #[serde(default = "default_source")]
    pub source: String,
    pub tickers: Vec<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_calendar")]
    pub calendar: String,
    #[serde(default = "default_ffill_limit")]
    pub ffill_limit: i64,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default = "default_update")]
    pub update: String,
    #[serde(default = "default_bad_factor")]
    pub on_bad_factor: String,
    #[serde(default = "default_true")]
    pub manifest: bool,
    pub paths: PathsDocument,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsDocument {
    pub raw: PathBuf,
    pub processed: PathBuf,
    #[serde(default)]
    pub csv: Option<PathBuf>,
}

fn default_source() -> String {
    "yahoo".into()
}
fn default_interval() -> String {
    "1d".into()
}
fn default_calendar() -> String {
    "B".into()
}
fn default_ffill_limit() -> i64 {
    5
}
fn default_update() -> String {
    "incremental".into()
}
fn default_bad_factor() -> String {
    "null".into()
}
fn default_true() -> bool {
    true
}

/// Earliest start used when the document leaves `start` empty ("max" history).
pub const DEFAULT_START: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(d) => d,
    None => panic!("invalid default start"),
};

/// Upper bound for `fetch.max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Validated, immutable snapshot of run parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: SourceKind,
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    pub interval: Interval,
    pub calendar: CalendarPolicy,
    pub ffill_limit: usize,
    /// Output fields of the processed tables, in order.
    pub columns: Vec<Field>,
    pub update: UpdateMode,
    pub on_bad_factor: BadFactorPolicy,
    pub manifest: bool,
    pub paths: Paths,
    pub fetch: FetchSettings,
    pub validation: ValidationSettings,
}

impl Config {
    /// Load and validate a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML settings string. A missing `end` means today.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::from_toml_at(content, chrono::Local::now().date_naive())
    }

    /// Like [`Config::from_toml`] with an explicit "today".
    pub fn from_toml_at(content: &str, today: NaiveDate) -> Result<Self, ConfigError> {
        let doc: SettingsDocument = toml::from_str(content)?;
        Self::from_document(doc, today)
    }

    pub fn from_document(doc: SettingsDocument, today: NaiveDate) -> Result<Self, ConfigError> {
        let source: SourceKind = doc.source.parse().map_err(|e| invalid("source", e))?;
        let tickers = normalize_tickers(&doc.tickers)?;

        let start = parse_date("start", doc.start.as_deref())?.unwrap_or(DEFAULT_START);
        let end = parse_date("end", doc.end.as_deref())?.unwrap_or(today);
        if start > end {
            return Err(invalid("start", format!("start {start} is after end {end}")));
        }

        let interval: Interval = doc.interval.parse().map_err(|e| invalid("interval", e))?;
        if !source.supports(interval) {
            return Err(invalid(
                "interval",
                format!("source '{}' only provides daily bars, got {interval}", doc.source),
            ));
        }
        let calendar = doc.calendar.parse().map_err(|e| invalid("calendar", e))?;

        let ffill_limit = usize::try_from(doc.ffill_limit)
            .map_err(|_| invalid("ffill_limit", format!("{} is negative", doc.ffill_limit)))?;

        let columns = parse_columns(&doc.columns)?;
        let update = doc.update.parse().map_err(|e| invalid("update", e))?;
        let on_bad_factor = doc
            .on_bad_factor
            .parse()
            .map_err(|e| invalid("on_bad_factor", e))?;

        if source == SourceKind::Csv && doc.paths.csv.is_none() {
            return Err(invalid("paths.csv", "required when source = \"csv\""));
        }
        if !(0.0..=1.0).contains(&doc.validation.max_null_ratio) {
            return Err(invalid(
                "validation.max_null_ratio",
                format!("{} is outside [0, 1]", doc.validation.max_null_ratio),
            ));
        }
        if doc.fetch.max_retries > MAX_RETRIES {
            return Err(invalid(
                "fetch.max_retries",
                format!("{} exceeds {MAX_RETRIES}", doc.fetch.max_retries),
            ));
        }
        if doc.validation.max_price.is_nan() || doc.validation.max_price <= 0.0 {
            return Err(invalid("validation.max_price", "must be positive"));
        }

        Ok(Self {
            source,
            tickers,
            start,
            end,
            interval,
            calendar,
            ffill_limit,
            columns,
            update,
            on_bad_factor,
            manifest: doc.manifest,
            paths: Paths {
                raw: doc.paths.raw,
                processed: doc.paths.processed,
                csv: doc.paths.csv,
            },
            fetch: doc.fetch,
            validation: doc.validation,
        })
    }
}

fn parse_date(key: &'static str, value: Option<&str>) -> Result<Option<NaiveDate>, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| invalid(key, format!("'{s}' is not YYYY-MM-DD: {e}"))),
    }
}

/// Upper-case, trim and de-duplicate tickers, keeping first-seen order.
fn normalize_tickers(raw: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for t in raw {
        let t = t.trim().to_ascii_uppercase();
        if t.is_empty() {
            return Err(invalid("tickers", "empty ticker symbol"));
        }
        if t.contains(&['/', '\\'][..]) || t.starts_with('.') {
            return Err(invalid("tickers", format!("'{t}' is not a valid file stem")));
        }
        if !out.contains(&t) {
            out.push(t);
        }
    }
    if out.is_empty() {
        return Err(invalid("tickers", "at least one ticker is required"));
    }
    Ok(out)
}

/// Lower-case and resolve column names. Empty means every field.
fn parse_columns(raw: &[String]) -> Result<Vec<Field>, ConfigError> {
    if raw.is_empty() {
        return Ok(Field::ALL.to_vec());
    }
    let mut out = Vec::with_capacity(raw.len());
    for name in raw {
        let field: Field = name.parse().map_err(|e| invalid("columns", e))?;
        if !out.contains(&field) {
            out.push(field);
        }
    }
    Ok(out)
}
