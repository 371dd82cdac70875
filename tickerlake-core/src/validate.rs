//! Structural checks over the processed long table.
//!
//! The validator never mutates anything. Every problem it finds becomes a
//! [`ValidationError`] in the report; only an unreadable file is an error.

use crate::config::ValidationSettings;
use crate::parquet::{read_dates, read_f64, read_parquet, read_str, StoreError};
use crate::panel::Field;
use chrono::NaiveDate;
use polars::prelude::{DataFrame, PolarsError};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Columns whose null share is bounded.
const CRITICAL: [Field; 6] = [
    Field::Open,
    Field::High,
    Field::Low,
    Field::Close,
    Field::AdjClose,
    Field::Volume,
];

/// One failed check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing key column '{0}'")]
    MissingKeyColumn(String),

    #[error("{count} rows share key ({date}, {ticker})")]
    DuplicateKey {
        date: NaiveDate,
        ticker: String,
        count: usize,
    },

    #[error("{ticker}: dates go backwards at row {row} ({previous} then {date})")]
    NonMonotonicDates {
        ticker: String,
        row: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("null keys in {column}: {count} rows")]
    NullKey { column: String, count: usize },

    #[error("too many nulls in {column}: {:.2}% > {:.2}%", .ratio * 100.0, .max * 100.0)]
    NullRatio { column: String, ratio: f64, max: f64 },

    #[error("negative volume in {count} rows")]
    NegativeVolume { count: usize },

    #[error("{count} values of {column} outside (0, {max_price}]")]
    PriceOutOfBand {
        column: String,
        count: usize,
        max_price: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    pub rows: usize,
    pub tickers: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub violations: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct Validator {
    settings: ValidationSettings,
}

impl Validator {
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    pub fn check_file(&self, path: &Path) -> Result<ValidationReport, StoreError> {
        let df = read_parquet(path)?;
        self.check_frame(&df).map_err(|e| StoreError::parquet(path, e))
    }

    pub fn check_frame(&self, df: &DataFrame) -> Result<ValidationReport, PolarsError> {
        let mut report = ValidationReport {
            rows: df.height(),
            ..Default::default()
        };

        let present = |name: &str| df.get_column_index(name).is_some();
        for key in ["date", "ticker"] {
            if !present(key) {
                report.violations.push(ValidationError::MissingKeyColumn(key.into()));
            }
        }
        if !report.passed() {
            return Ok(report);
        }

        let dates = read_dates(df, "date")?;
        let tickers = read_str(df, "ticker")?;
        self.check_keys(&dates, &tickers, &mut report);

        for field in CRITICAL {
            if !present(field.name()) {
                continue;
            }
            let values = read_f64(df, field.name())?;
            self.check_nulls(field, &values, &mut report);
            if field == Field::Volume {
                let count = values.iter().flatten().filter(|v| **v < 0.0).count();
                if count > 0 {
                    report.violations.push(ValidationError::NegativeVolume { count });
                }
            }
        }

        for field in Field::PRICES {
            if !present(field.name()) {
                continue;
            }
            let values = read_f64(df, field.name())?;
            let max_price = self.settings.max_price;
            let count = values
                .iter()
                .flatten()
                .filter(|v| !v.is_nan() && !(**v > 0.0 && **v <= max_price))
                .count();
            if count > 0 {
                report.violations.push(ValidationError::PriceOutOfBand {
                    column: field.name().into(),
                    count,
                    max_price,
                });
            }
        }

        Ok(report)
    }

    fn check_keys(
        &self,
        dates: &[Option<NaiveDate>],
        tickers: &[Option<String>],
        report: &mut ValidationReport,
    ) {
        for (column, nulls) in [
            ("date", dates.iter().filter(|d| d.is_none()).count()),
            ("ticker", tickers.iter().filter(|t| t.is_none()).count()),
        ] {
            if nulls > 0 {
                report.violations.push(ValidationError::NullKey {
                    column: column.into(),
                    count: nulls,
                });
            }
        }

        let keyed: Vec<(usize, NaiveDate, &str)> = dates
            .iter()
            .zip(tickers)
            .enumerate()
            .filter_map(|(i, (d, t))| Some((i, (*d)?, t.as_deref()?)))
            .collect();

        report.min_date = keyed.iter().map(|k| k.1).min();
        report.max_date = keyed.iter().map(|k| k.1).max();

        let mut counts: BTreeMap<(NaiveDate, &str), usize> = BTreeMap::new();
        for (_, date, ticker) in &keyed {
            *counts.entry((*date, *ticker)).or_default() += 1;
        }
        for ((date, ticker), count) in counts {
            if count > 1 {
                report.violations.push(ValidationError::DuplicateKey {
                    date,
                    ticker: ticker.to_string(),
                    count,
                });
            }
        }

        // first backwards step per ticker, in file order
        let mut last_seen: HashMap<&str, NaiveDate> = HashMap::new();
        let mut flagged: BTreeMap<&str, ValidationError> = BTreeMap::new();
        for (row, date, ticker) in &keyed {
            if let Some(previous) = last_seen.insert(*ticker, *date) {
                if *date < previous && !flagged.contains_key(ticker) {
                    flagged.insert(
                        *ticker,
                        ValidationError::NonMonotonicDates {
                            ticker: ticker.to_string(),
                            row: *row,
                            previous,
                            date: *date,
                        },
                    );
                }
            }
        }
        report.tickers = last_seen.len();
        report.violations.extend(flagged.into_values());
    }

    fn check_nulls(&self, field: Field, values: &[Option<f64>], report: &mut ValidationReport) {
        if values.is_empty() {
            return;
        }
        let nulls = values.iter().filter(|v| v.map_or(true, f64::is_nan)).count();
        let ratio = nulls as f64 / values.len() as f64;
        if ratio > self.settings.max_null_ratio {
            report.violations.push(ValidationError::NullRatio {
                column: field.name().into(),
                ratio,
                max: self.settings.max_null_ratio,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame(dates: &[u32], tickers: &[&str], close: &[Option<f64>], volume: &[f64]) -> DataFrame {
        let days: Vec<i32> = dates
            .iter()
            .map(|d| {
                (NaiveDate::from_ymd_opt(2024, 1, *d).unwrap() - NaiveDate::default()).num_days()
                    as i32
            })
            .collect();
        DataFrame::new(vec![
            Column::new("date".into(), days).cast(&DataType::Date).unwrap(),
            Column::new("ticker".into(), tickers.to_vec()),
            Column::new("close".into(), close.to_vec()),
            Column::new("volume".into(), volume.to_vec()),
        ])
        .unwrap()
    }

    fn validator() -> Validator {
        Validator::new(ValidationSettings::default())
    }

    #[test]
    fn clean_frame_passes() {
        let df = frame(
            &[2, 2, 3, 3],
            &["AAPL", "MSFT", "AAPL", "MSFT"],
            &[Some(1.0), Some(2.0), Some(1.1), Some(2.1)],
            &[10.0, 20.0, 11.0, 21.0],
        );
        let report = validator().check_frame(&df).unwrap();
        assert!(report.passed(), "{:?}", report.violations);
        assert_eq!(report.rows, 4);
        assert_eq!(report.tickers, 2);
        assert_eq!(report.min_date, NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn one_duplicate_key_is_one_violation() {
        let df = frame(
            &[2, 3, 3],
            &["AAPL", "AAPL", "AAPL"],
            &[Some(1.0), Some(1.1), Some(1.1)],
            &[10.0, 11.0, 11.0],
        );
        let report = validator().check_frame(&df).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert!(matches!(
            &report.violations[0],
            ValidationError::DuplicateKey { ticker, count: 2, .. } if ticker == "AAPL"
        ));
    }

    #[test]
    fn backwards_dates_flagged_once_per_ticker() {
        let df = frame(
            &[4, 3, 2],
            &["AAPL", "AAPL", "AAPL"],
            &[Some(1.0), Some(1.0), Some(1.0)],
            &[1.0, 1.0, 1.0],
        );
        let report = validator().check_frame(&df).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert!(matches!(
            report.violations[0],
            ValidationError::NonMonotonicDates { row: 1, .. }
        ));
    }

    #[test]
    fn null_ratio_and_ranges() {
        let df = frame(
            &[2, 3, 4, 5],
            &["X", "X", "X", "X"],
            &[None, Some(-1.0), Some(2e6), Some(1.0)],
            &[1.0, -5.0, 1.0, 1.0],
        );
        let report = validator().check_frame(&df).unwrap();
        assert_eq!(report.violations.len(), 3, "{:?}", report.violations);
        assert!(matches!(report.violations[0], ValidationError::NullRatio { .. }));
        assert!(matches!(report.violations[1], ValidationError::NegativeVolume { count: 1 }));
        assert!(matches!(
            report.violations[2],
            ValidationError::PriceOutOfBand { count: 2, .. }
        ));
    }

    #[test]
    fn missing_key_column_stops_the_run() {
        let df = DataFrame::new(vec![Column::new("close".into(), vec![1.0f64])]).unwrap();
        let report = validator().check_frame(&df).unwrap();
        assert_eq!(
            report.violations,
            vec![
                ValidationError::MissingKeyColumn("date".into()),
                ValidationError::MissingKeyColumn("ticker".into()),
            ]
        );
    }
}
