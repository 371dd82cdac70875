//! Read-only SQL over the Parquet outputs.
//!
//! Tables: `prices` (long), `prices_wide` (wide) and `raw_<ticker>` for each
//! raw file, all registered as lazy Parquet scans.

use crate::output::{LONG_FILE, WIDE_FILE};
use crate::parquet::StoreError;
use crate::store::RawStore;
use polars::prelude::*;
use polars::sql::SQLContext;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("only SELECT or WITH statements are allowed, got: {0}")]
    NotReadOnly(String),

    #[error("empty query")]
    Empty,

    #[error("no tables to query (run ingest first)")]
    NoTables,

    #[error("SQL error: {0}")]
    Sql(#[from] PolarsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accept a single `SELECT`/`WITH` statement.
pub fn ensure_read_only(sql: &str) -> Result<(), QueryError> {
    let code = mask_sql(sql);
    let body = code.trim().trim_end_matches(';').trim();
    if body.is_empty() {
        return Err(QueryError::Empty);
    }
    if body.contains(';') {
        return Err(QueryError::NotReadOnly("multiple statements".into()));
    }
    let keyword: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    match keyword.as_str() {
        "select" | "with" => Ok(()),
        _ => Err(QueryError::NotReadOnly(keyword.to_ascii_uppercase())),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Lexeme {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Statement text with comments dropped and quoted contents blanked.
///
/// `'` and `"` literals keep their delimiters; a doubled quote inside a
/// literal closes and reopens it, which leaves the mask unchanged.
fn mask_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut state = Lexeme::Code;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Lexeme::Code => match c {
                '\'' | '"' => {
                    out.push(c);
                    state = Lexeme::Quoted(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = Lexeme::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push(' ');
                    state = Lexeme::BlockComment;
                }
                _ => out.push(c),
            },
            Lexeme::Quoted(q) => {
                if c == q {
                    out.push(c);
                    state = Lexeme::Code;
                } else {
                    out.push('_');
                }
            }
            Lexeme::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = Lexeme::Code;
                }
            }
            Lexeme::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = Lexeme::Code;
                }
            }
        }
    }
    out
}

pub struct QueryEngine {
    ctx: SQLContext,
    tables: Vec<String>,
}

impl QueryEngine {
    /// Register every available table under `processed` and `raw`.
    pub fn open(processed: &Path, raw: &Path) -> Result<Self, QueryError> {
        let mut engine = Self {
            ctx: SQLContext::new(),
            tables: Vec::new(),
        };

        engine.register_if_present("prices", processed.join(LONG_FILE))?;
        engine.register_if_present("prices_wide", processed.join(WIDE_FILE))?;

        let store = RawStore::new(raw);
        for ticker in store.list()? {
            let name = format!("raw_{}", ticker.to_ascii_lowercase());
            engine.register_if_present(&name, store.path_for(&ticker))?;
        }

        if engine.tables.is_empty() {
            return Err(QueryError::NoTables);
        }
        Ok(engine)
    }

    fn register_if_present(&mut self, name: &str, path: PathBuf) -> Result<(), QueryError> {
        if !path.exists() {
            return Ok(());
        }
        let lf = LazyFrame::scan_parquet(&path, Default::default())?;
        self.ctx.register(name, lf);
        self.tables.push(name.to_string());
        tracing::debug!(table = name, path = %path.display(), "registered");
        Ok(())
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn execute(&mut self, sql: &str) -> Result<DataFrame, QueryError> {
        ensure_read_only(sql)?;
        Ok(self.ctx.execute(sql)?.collect()?)
    }
}
