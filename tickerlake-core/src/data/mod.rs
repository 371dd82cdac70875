//! Bar sources and raw-series hygiene.

pub mod canonicalize;
pub mod circuit_breaker;
pub mod csv_import;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use canonicalize::{canonicalize, is_canonical, merge};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_import::CsvProvider;
pub use provider::{DataProvider, DataSource, FetchError, FetchResult, Interval, RawBar};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;

use crate::config::{Config, SourceKind};

/// The provider selected by `config.source`.
pub fn build_provider(config: &Config) -> Result<Box<dyn DataProvider>, FetchError> {
    match config.source {
        SourceKind::Yahoo => Ok(Box::new(YahooProvider::new(&config.fetch)?)),
        SourceKind::Csv => {
            let dir = config.paths.csv.clone().ok_or_else(|| {
                FetchError::Other("paths.csv is required for the csv source".into())
            })?;
            Ok(Box::new(CsvProvider::new(dir)))
        }
        SourceKind::Synthetic => Ok(Box::new(SyntheticProvider::new())),
    }
}
