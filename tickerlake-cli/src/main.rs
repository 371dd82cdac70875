//! tickerlake CLI: ingest, validate, rebuild, refresh, query and status.
//!
//! Commands:
//! - `ingest`: fetch configured tickers (incremental by default) and rebuild outputs
//! - `validate`: check the processed long table; exit 1 on any violation
//! - `rebuild`: recompute processed outputs from raw files, no network
//! - `refresh`: wipe raw and processed data, then fetch the full range
//! - `query`: run a read-only SQL statement over the Parquet outputs
//! - `status`: list raw files with date ranges, row counts and sizes

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tickerlake_core::config::Config;
use tickerlake_core::data::build_provider;
use tickerlake_core::output::ProcessedWriter;
use tickerlake_core::query::QueryEngine;
use tickerlake_core::store::RawStore;
use tickerlake_core::validate::Validator;
use tickerlake_runner::{
    ingest, rebuild, refresh, BuildSummary, IngestSummary, RunError, TickerOutcome,
    TracingProgress,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tickerlake",
    about = "Daily market-data ingestion into Parquet",
    version
)]
struct Cli {
    /// Settings file (TOML).
    #[arg(long, global = true, default_value = "config/settings.toml")]
    config: PathBuf,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch configured tickers and rebuild processed outputs.
    Ingest,
    /// Check the processed long table.
    Validate {
        /// File to check. Defaults to the configured processed long table.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Recompute processed outputs from raw files without fetching.
    Rebuild,
    /// Wipe raw and processed data, then fetch the full configured range.
    Refresh,
    /// Run a read-only SQL statement (tables: prices, prices_wide, raw_<ticker>).
    Query {
        /// SELECT or WITH statement.
        sql: String,
    },
    /// List raw files.
    Status,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Ingest => run_ingest(&config, false),
        Commands::Refresh => run_ingest(&config, true),
        Commands::Rebuild => run_rebuild(&config),
        Commands::Validate { path } => run_validate(&config, path.as_deref()),
        Commands::Query { sql } => run_query(&config, &sql),
        Commands::Status => run_status(&config),
    }
}

fn run_ingest(config: &Config, wipe_first: bool) -> Result<()> {
    let provider = build_provider(config).map_err(RunError::Provider)?;
    tracing::info!(
        provider = provider.name(),
        tickers = config.tickers.len(),
        start = %config.start,
        end = %config.end,
        "starting run"
    );

    let progress = TracingProgress;
    let summary = if wipe_first {
        refresh(config, provider.as_ref(), &progress)?
    } else {
        ingest(config, provider.as_ref(), &progress)?
    };

    print_ingest_summary(&summary);
    Ok(())
}

fn run_rebuild(config: &Config) -> Result<()> {
    let build = rebuild(config)?;
    print_build_summary(&build);
    Ok(())
}

fn run_validate(config: &Config, path: Option<&Path>) -> Result<()> {
    let default_path = ProcessedWriter::new(&config.paths.processed).long_path();
    let path = path.unwrap_or(&default_path);

    let report = Validator::new(config.validation.clone())
        .check_file(path)
        .with_context(|| format!("reading {}", path.display()))?;

    if !report.passed() {
        for v in &report.violations {
            eprintln!("[FAIL] {v}");
        }
        eprintln!("{} violation(s) in {}", report.violations.len(), path.display());
        std::process::exit(1);
    }

    match (report.min_date, report.max_date) {
        (Some(lo), Some(hi)) => println!(
            "[OK] {} looks sane. Range: {lo} to {hi}, rows={}, tickers={}",
            path.display(),
            report.rows,
            report.tickers
        ),
        _ => println!("[OK] {} is empty", path.display()),
    }
    Ok(())
}

fn run_query(config: &Config, sql: &str) -> Result<()> {
    let mut engine = QueryEngine::open(&config.paths.processed, &config.paths.raw)?;
    tracing::debug!(tables = ?engine.tables(), "query tables");
    let df = engine.execute(sql)?;
    println!("{df}");
    Ok(())
}

fn run_status(config: &Config) -> Result<()> {
    let store = RawStore::new(&config.paths.raw);
    let rows = store.status()?;
    if rows.is_empty() {
        println!("No raw files in {}", store.dir().display());
        return Ok(());
    }

    let total: u64 = rows.iter().map(|r| r.bytes).sum();
    println!("Raw: {}", store.dir().display());
    println!("Tickers: {}", rows.len());
    println!("Total size: {}", format_size(total));
    println!();
    println!("{:<10} {:<25} {:>8} {:>10}", "Ticker", "Date Range", "Rows", "Size");
    println!("{}", "-".repeat(56));
    for r in &rows {
        let range = match (r.first_date, r.last_date) {
            (Some(a), Some(b)) => format!("{a} to {b}"),
            _ => "(empty)".to_string(),
        };
        println!(
            "{:<10} {:<25} {:>8} {:>10}",
            r.ticker,
            range,
            r.rows,
            format_size(r.bytes)
        );
    }
    Ok(())
}

fn print_ingest_summary(summary: &IngestSummary) {
    println!();
    println!("=== Fetch ===");
    for t in &summary.tickers {
        let status = match &t.outcome {
            TickerOutcome::Updated { added, total } => format!("+{added} bars ({total} stored)"),
            TickerOutcome::NoNewBars => "no new bars".to_string(),
            TickerOutcome::UpToDate => "up to date".to_string(),
            TickerOutcome::Failed(e) => format!("FAILED: {e}"),
        };
        println!("{:<10} {:<36} {status}", t.ticker, t.plan.to_string());
    }
    println!(
        "{}/{} succeeded",
        summary.succeeded(),
        summary.tickers.len()
    );
    print_build_summary(&summary.build);
}

fn print_build_summary(build: &BuildSummary) {
    let p = &build.processed;
    println!();
    println!("=== Processed ===");
    println!("Tickers:        {}", p.tickers);
    println!("Long rows:      {}", p.long_rows);
    println!("Wide rows:      {} ({} value columns)", p.wide_rows, p.wide_columns);
    if !build.missing.is_empty() {
        println!("Missing:        {}", build.missing.join(", "));
    }
    if !build.adjustment_errors.is_empty() {
        println!("Bad factors:    {} rows", build.adjustment_errors.len());
    }
    if let Some(m) = &p.manifest {
        println!("Manifest:       {} tickers", m.entries.len());
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
