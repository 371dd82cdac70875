//! The canonical in-memory table and its two projections.
//!
//! A [`Panel`] holds every ticker's aligned, featured rows. The long and wide
//! tables are pure projections of it; serialization lives in [`crate::output`].

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A processed output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
    Ret1d,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::AdjClose,
        Field::Volume,
        Field::Ret1d,
    ];

    /// Price fields subject to the adjustment factor and the price band check.
    pub const PRICES: [Field; 5] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::AdjClose,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::AdjClose => "adj_close",
            Field::Volume => "volume",
            Field::Ret1d => "ret_1d",
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.name() == lower)
            .ok_or_else(|| {
                let known: Vec<&str> = Field::ALL.iter().map(|f| f.name()).collect();
                format!("unknown column '{lower}' (known: {})", known.join(", "))
            })
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One processed bar. `None` means undefined (null on disk).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PanelRow {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub ret_1d: Option<f64>,
}

impl PanelRow {
    /// A row with every field undefined.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::AdjClose => self.adj_close,
            Field::Volume => self.volume,
            Field::Ret1d => self.ret_1d,
        }
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        let slot = match field {
            Field::Open => &mut self.open,
            Field::High => &mut self.high,
            Field::Low => &mut self.low,
            Field::Close => &mut self.close,
            Field::AdjClose => &mut self.adj_close,
            Field::Volume => &mut self.volume,
            Field::Ret1d => &mut self.ret_1d,
        };
        *slot = value;
    }
}

/// Every ticker's rows on the common calendar.
///
/// Each series is a date-ordered subsequence of `calendar` (leading dates
/// before a ticker's first valid close are trimmed).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    pub calendar: Vec<NaiveDate>,
    pub series: BTreeMap<String, Vec<PanelRow>>,
}

/// One row of the long table.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub date: NaiveDate,
    pub ticker: String,
    /// Values in the order of [`LongTable::columns`].
    pub values: Vec<Option<f64>>,
}

/// Rows keyed by (date, ticker), sorted by date then ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub columns: Vec<Field>,
    pub rows: Vec<LongRow>,
}

impl LongTable {
    pub fn column_index(&self, field: Field) -> Option<usize> {
        self.columns.iter().position(|f| *f == field)
    }
}

/// Rows keyed by date, one column per (field, ticker).
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub dates: Vec<NaiveDate>,
    /// `{field}_{TICKER}` columns, field-major, tickers ascending.
    pub columns: Vec<WideColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideColumn {
    pub name: String,
    pub field: Field,
    pub ticker: String,
    pub values: Vec<Option<f64>>,
}

pub fn wide_column_name(field: Field, ticker: &str) -> String {
    format!("{}_{ticker}", field.name())
}

impl Panel {
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn row_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Project onto the long table with the given output columns.
    pub fn to_long(&self, columns: &[Field]) -> LongTable {
        let mut rows: Vec<LongRow> = self
            .series
            .iter()
            .flat_map(|(ticker, series)| {
                series.iter().map(move |row| LongRow {
                    date: row.date,
                    ticker: ticker.clone(),
                    values: columns.iter().map(|f| row.get(*f)).collect(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));

        LongTable {
            columns: columns.to_vec(),
            rows,
        }
    }

    /// Project onto the wide table with the given output columns.
    ///
    /// The date axis is every date that has at least one long row; a cell is
    /// `None` exactly when the ticker has no row on that date or the field is
    /// undefined there.
    pub fn to_wide(&self, columns: &[Field]) -> WideTable {
        let dates: Vec<NaiveDate> = self
            .series
            .values()
            .flat_map(|s| s.iter().map(|r| r.date))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let lookups: BTreeMap<&str, BTreeMap<NaiveDate, &PanelRow>> = self
            .series
            .iter()
            .map(|(t, s)| (t.as_str(), s.iter().map(|r| (r.date, r)).collect()))
            .collect();

        let mut out = Vec::with_capacity(columns.len() * lookups.len());
        for field in columns {
            for (ticker, by_date) in &lookups {
                let values = dates
                    .iter()
                    .map(|d| by_date.get(d).and_then(|r| r.get(*field)))
                    .collect();
                out.push(WideColumn {
                    name: wide_column_name(*field, ticker),
                    field: *field,
                    ticker: ticker.to_string(),
                    values,
                });
            }
        }

        WideTable {
            dates,
            columns: out,
        }
    }
}
