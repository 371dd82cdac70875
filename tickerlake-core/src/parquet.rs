//! Parquet I/O and DataFrame conversions.
//!
//! Every file is written atomically: the frame goes to `<name>.tmp` first and
//! is renamed into place, so readers never see a half-written file.

use crate::data::provider::RawBar;
use crate::panel::{LongTable, WideTable};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Storage failures. Always fatal for the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error on {path}: {source}")]
    Parquet {
        path: String,
        #[source]
        source: PolarsError,
    },

    #[error("{path}: {reason}")]
    Schema { path: String, reason: String },

    #[error("manifest serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn parquet(path: &Path, source: PolarsError) -> Self {
        StoreError::Parquet {
            path: path.display().to_string(),
            source,
        }
    }
}

pub const RAW_COLUMNS: [&str; 7] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "adj_close",
    "volume",
];

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn to_days(d: NaiveDate) -> i32 {
    (d - epoch()).num_days() as i32
}

fn from_days(days: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(days as i64)
}

fn date_column(name: &str, dates: impl Iterator<Item = NaiveDate>) -> PolarsResult<Column> {
    let days: Vec<i32> = dates.map(to_days).collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}

/// Read a `Date` (or integer days) column as calendar dates.
pub fn read_dates(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = df.column(name)?.cast(&DataType::Int32)?;
    Ok(days.i32()?.into_iter().map(|d| d.map(from_days)).collect())
}

/// Read a numeric column as `f64`, nulls preserved.
pub fn read_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let col = df.column(name)?.cast(&DataType::Float64)?;
    Ok(col.f64()?.into_iter().collect())
}

/// Read a string column, nulls preserved.
pub fn read_str(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let col = df.column(name)?.cast(&DataType::String)?;
    Ok(col.str()?.into_iter().map(|s| s.map(str::to_string)).collect())
}

pub fn raw_bars_to_frame(bars: &[RawBar]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        date_column("date", bars.iter().map(|b| b.date))?,
        Column::new("open".into(), bars.iter().map(|b| b.open).collect::<Vec<_>>()),
        Column::new("high".into(), bars.iter().map(|b| b.high).collect::<Vec<_>>()),
        Column::new("low".into(), bars.iter().map(|b| b.low).collect::<Vec<_>>()),
        Column::new("close".into(), bars.iter().map(|b| b.close).collect::<Vec<_>>()),
        Column::new(
            "adj_close".into(),
            bars.iter().map(|b| b.adj_close).collect::<Vec<_>>(),
        ),
        Column::new("volume".into(), bars.iter().map(|b| b.volume).collect::<Vec<_>>()),
    ])
}

/// Convert a raw frame back to bars. Null prices become NaN, a null volume 0.
pub fn frame_to_raw_bars(df: &DataFrame) -> PolarsResult<Vec<RawBar>> {
    let dates = read_dates(df, "date")?;
    let open = read_f64(df, "open")?;
    let high = read_f64(df, "high")?;
    let low = read_f64(df, "low")?;
    let close = read_f64(df, "close")?;
    let adj_close = read_f64(df, "adj_close")?;
    let volume_col = df.column("volume")?.cast(&DataType::UInt64)?;
    let volume: Vec<Option<u64>> = volume_col.u64()?.into_iter().collect();

    let mut bars = Vec::with_capacity(df.height());
    for (i, date) in dates.into_iter().enumerate() {
        let date = date.ok_or_else(|| {
            PolarsError::ComputeError(format!("null date at row {i}").into())
        })?;
        bars.push(RawBar {
            date,
            open: open[i].unwrap_or(f64::NAN),
            high: high[i].unwrap_or(f64::NAN),
            low: low[i].unwrap_or(f64::NAN),
            close: close[i].unwrap_or(f64::NAN),
            adj_close: adj_close[i].unwrap_or(f64::NAN),
            volume: volume[i].unwrap_or(0),
        });
    }
    Ok(bars)
}

/// `date, ticker, <fields>` in table order.
pub fn long_to_frame(table: &LongTable) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(table.columns.len() + 2);
    columns.push(date_column("date", table.rows.iter().map(|r| r.date))?);
    columns.push(Column::new(
        "ticker".into(),
        table.rows.iter().map(|r| r.ticker.as_str()).collect::<Vec<_>>(),
    ));
    for (j, field) in table.columns.iter().enumerate() {
        let values: Vec<Option<f64>> = table.rows.iter().map(|r| r.values[j]).collect();
        columns.push(Column::new(field.name().into(), values));
    }
    DataFrame::new(columns)
}

/// `date, {field}_{TICKER}...` in table order.
pub fn wide_to_frame(table: &WideTable) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(table.columns.len() + 1);
    columns.push(date_column("date", table.dates.iter().copied())?);
    for col in &table.columns {
        columns.push(Column::new(col.name.as_str().into(), col.values.clone()));
    }
    DataFrame::new(columns)
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Write a frame to `path` atomically.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let tmp = tmp_path(path);
    let file = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(e) = ParquetWriter::new(file).finish(df) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::parquet(path, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

pub fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::io(path, e))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::parquet(path, e))
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
