//! Split/dividend adjustment.
//!
//! factor = adj_close / close. Prices scale by the factor; volume scales by
//! its inverse because it is denominated in pre-adjustment share counts.

use crate::data::provider::RawBar;
use crate::panel::PanelRow;
use chrono::NaiveDate;
use std::str::FromStr;
use thiserror::Error;

/// A row whose adjustment factor is zero, negative or undefined.
///
/// Recoverable: the row is resolved per [`BadFactorPolicy`] and the error is
/// reported alongside the adjusted series.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{ticker} {date}: degenerate adjustment factor ({reason})")]
pub struct AdjustmentError {
    pub ticker: String,
    pub date: NaiveDate,
    pub reason: String,
}

/// What to do with rows whose factor cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadFactorPolicy {
    /// Keep the row with undefined adjusted fields.
    #[default]
    Null,
    /// Remove the row.
    Drop,
    /// Keep the raw values as if the factor were 1.
    Passthrough,
}

impl FromStr for BadFactorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(BadFactorPolicy::Null),
            "drop" => Ok(BadFactorPolicy::Drop),
            "passthrough" => Ok(BadFactorPolicy::Passthrough),
            other => Err(format!(
                "unknown bad-factor policy '{other}' (expected null, drop or passthrough)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Adjusted {
    pub rows: Vec<PanelRow>,
    pub errors: Vec<AdjustmentError>,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// The adjustment factor of a bar, or why it has none.
pub fn factor(bar: &RawBar) -> Result<f64, String> {
    if !bar.close.is_finite() {
        return Err("close is missing".into());
    }
    if !bar.adj_close.is_finite() {
        return Err("adj_close is missing".into());
    }
    if bar.close == 0.0 {
        return Err("close is zero".into());
    }
    let f = bar.adj_close / bar.close;
    if !f.is_finite() || f <= 0.0 {
        return Err(format!("factor {f} is not positive"));
    }
    Ok(f)
}

fn scaled(bar: &RawBar, f: f64) -> PanelRow {
    PanelRow {
        date: bar.date,
        open: finite(bar.open * f),
        high: finite(bar.high * f),
        low: finite(bar.low * f),
        close: finite(bar.close * f),
        adj_close: finite(bar.adj_close),
        volume: finite((bar.volume as f64 / f).round()),
        ret_1d: None,
    }
}

/// Adjust one ticker's raw bars.
pub fn adjust(ticker: &str, bars: &[RawBar], policy: BadFactorPolicy) -> Adjusted {
    let mut out = Adjusted {
        rows: Vec::with_capacity(bars.len()),
        errors: Vec::new(),
    };

    for bar in bars {
        match factor(bar) {
            Ok(f) => out.rows.push(scaled(bar, f)),
            Err(reason) => {
                out.errors.push(AdjustmentError {
                    ticker: ticker.to_string(),
                    date: bar.date,
                    reason,
                });
                match policy {
                    BadFactorPolicy::Null => out.rows.push(PanelRow {
                        adj_close: finite(bar.adj_close),
                        ..PanelRow::empty(bar.date)
                    }),
                    BadFactorPolicy::Drop => {}
                    BadFactorPolicy::Passthrough => out.rows.push(scaled(bar, 1.0)),
                }
            }
        }
    }

    out
}
