//! Processed outputs: long table, wide table, manifest.

use crate::manifest::Manifest;
use crate::panel::{Field, Panel};
use crate::parquet::{long_to_frame, wide_to_frame, write_parquet, StoreError};
use std::path::{Path, PathBuf};

pub const LONG_FILE: &str = "prices_daily.parquet";
pub const WIDE_FILE: &str = "prices_daily_wide.parquet";
pub const MANIFEST_FILE: &str = "_manifest.json";

/// What a write produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSummary {
    pub tickers: usize,
    pub long_rows: usize,
    pub wide_rows: usize,
    pub wide_columns: usize,
    pub manifest: Option<Manifest>,
}

pub struct ProcessedWriter {
    dir: PathBuf,
}

impl ProcessedWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn long_path(&self) -> PathBuf {
        self.dir.join(LONG_FILE)
    }

    pub fn wide_path(&self) -> PathBuf {
        self.dir.join(WIDE_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Project the panel and replace every processed file.
    pub fn write(
        &self,
        panel: &Panel,
        columns: &[Field],
        with_manifest: bool,
    ) -> Result<ProcessedSummary, StoreError> {
        let long = panel.to_long(columns);
        let wide = panel.to_wide(columns);

        let long_path = self.long_path();
        let mut long_df = long_to_frame(&long).map_err(|e| StoreError::parquet(&long_path, e))?;
        write_parquet(&mut long_df, &long_path)?;

        let wide_path = self.wide_path();
        let mut wide_df = wide_to_frame(&wide).map_err(|e| StoreError::parquet(&wide_path, e))?;
        write_parquet(&mut wide_df, &wide_path)?;

        let manifest = if with_manifest {
            let manifest = Manifest::from_long(&long);
            manifest.write(&self.manifest_path())?;
            Some(manifest)
        } else {
            remove_if_present(&self.manifest_path())?;
            None
        };

        tracing::info!(
            long_rows = long.rows.len(),
            wide_rows = wide.dates.len(),
            dir = %self.dir.display(),
            "processed outputs written"
        );

        Ok(ProcessedSummary {
            tickers: panel.series.len(),
            long_rows: long.rows.len(),
            wide_rows: wide.dates.len(),
            wide_columns: wide.columns.len(),
            manifest,
        })
    }

    /// Remove processed files. Missing files are ignored.
    pub fn wipe(&self) -> Result<(), StoreError> {
        for path in [self.long_path(), self.wide_path(), self.manifest_path()] {
            remove_if_present(&path)?;
        }
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
