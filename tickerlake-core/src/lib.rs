//! tickerlake core: market-data ingestion building blocks.
//!
//! Everything a run needs except orchestration:
//! - typed configuration ([`config`])
//! - bar providers and the raw per-ticker store ([`data`], [`store`])
//! - adjustment, calendar alignment and features ([`transform`])
//! - the canonical [`panel::Panel`] and its long/wide projections
//! - Parquet output, manifest, validator and SQL query layer
//!
//! Components take paths as explicit arguments; nothing reads global state.

pub mod config;
pub mod data;
pub mod manifest;
pub mod output;
pub mod panel;
pub mod parquet;
pub mod query;
pub mod store;
pub mod transform;
pub mod validate;

pub use config::{Config, ConfigError};
pub use panel::{Field, Panel, PanelRow};
pub use parquet::StoreError;
