//! Coverage manifest: per-ticker date range, row count and content hash.
//!
//! Carries no run timestamp, so an unchanged dataset yields a byte-identical
//! manifest.

use crate::parquet::{write_atomic, StoreError};
use crate::panel::LongTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub row_count: usize,
    /// BLAKE3 over the ticker's processed rows.
    pub data_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Summarize a long table.
    pub fn from_long(table: &LongTable) -> Self {
        let mut hashers: BTreeMap<&str, (blake3::Hasher, ManifestEntry)> = BTreeMap::new();

        for row in &table.rows {
            let (hasher, entry) = hashers.entry(row.ticker.as_str()).or_insert_with(|| {
                (
                    blake3::Hasher::new(),
                    ManifestEntry {
                        min_date: row.date,
                        max_date: row.date,
                        row_count: 0,
                        data_hash: String::new(),
                    },
                )
            });
            entry.min_date = entry.min_date.min(row.date);
            entry.max_date = entry.max_date.max(row.date);
            entry.row_count += 1;

            hasher.update(row.date.to_string().as_bytes());
            for v in &row.values {
                match v {
                    Some(x) => {
                        hasher.update(&[1]);
                        hasher.update(&x.to_le_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
        }

        let entries = hashers
            .into_iter()
            .map(|(ticker, (hasher, mut entry))| {
                entry.data_hash = hasher.finalize().to_hex().to_string();
                (ticker.to_string(), entry)
            })
            .collect();
        Self { entries }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let mut json = self.to_json()?;
        json.push('\n');
        write_atomic(path, json.as_bytes())
    }

    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}
