//! KRX Lab CLI: backfill, refresh and inspect the KOSPI/KOSDAQ store.
//!
//! Commands:
//! - `init`: backfill N years of prices, indicators, indices and breadth
//! - `update`: refresh the last N trading days
//! - `sample`: short backfill over the built-in eight-instrument universe
//! - `status`: row counts and the latest stored trading date
//! - `universe`: print a universe TOML template

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use krxlab_core::data::Universe;
use krxlab_runner::{
    ListingSource, Orchestrator, PipelineConfig, PriceSource, RunSummary, Sources, Store,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "krxlab",
    about = "KRX Lab: KOSPI/KOSDAQ daily price ingestion and enrichment"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Pipeline config (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Static universe TOML instead of the live exchange listing.
    #[arg(long, global = true)]
    universe: Option<PathBuf>,

    /// Read prices from `<dir>/<symbol>.csv` instead of the network.
    #[arg(long, global = true, conflicts_with = "synthetic")]
    csv_dir: Option<PathBuf>,

    /// Use deterministic synthetic prices (offline demo).
    #[arg(long, global = true, default_value_t = false)]
    synthetic: bool,

    /// Run as of this date (YYYY-MM-DD) instead of today.
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    /// Print the run summary as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Backfill years of history for every listed instrument.
    Init {
        /// Years of history. Defaults to `run.default_years`.
        #[arg(long)]
        years: Option<u32>,
    },
    /// Refresh the trailing trading days.
    Update {
        /// Trading days. Defaults to `run.default_days`.
        #[arg(long)]
        days: Option<u32>,
    },
    /// Backfill the built-in sample universe.
    Sample {
        /// Calendar days of history.
        #[arg(long, default_value_t = 180)]
        days: u32,
    },
    /// Show store row counts and freshness.
    Status,
    /// Print the sample universe as a TOML template.
    Universe,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Init { years } => {
            let years = years.unwrap_or(config.run.default_years);
            let as_of = cli.global.as_of;
            let listing = listing_source(&cli.global, &config);
            run_pipeline(&cli.global, &config, listing, |o| match as_of {
                Some(date) => o.initialize_at(years, date),
                None => o.initialize(years),
            })
        }
        Commands::Update { days } => {
            let days = days.unwrap_or(config.run.default_days);
            let as_of = cli.global.as_of;
            let listing = listing_source(&cli.global, &config);
            run_pipeline(&cli.global, &config, listing, |o| match as_of {
                Some(date) => o.update_at(days, date),
                None => o.update(days),
            })
        }
        Commands::Sample { days } => {
            let as_of = cli
                .global
                .as_of
                .unwrap_or_else(|| chrono::Local::now().date_naive());
            run_pipeline(&cli.global, &config, ListingSource::Sample, |o| {
                o.sample_at(days, as_of)
            })
        }
        Commands::Status => run_status(&config, cli.global.json),
        Commands::Universe => {
            print!("{}", Universe::sample_krx().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(global: &GlobalArgs) -> Result<PipelineConfig> {
    let mut config = match &global.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(db) = &global.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

fn listing_source(global: &GlobalArgs, config: &PipelineConfig) -> ListingSource {
    match &global.universe {
        Some(path) => ListingSource::UniverseFile(path.clone()),
        None => ListingSource::from_config(config),
    }
}

fn price_source(global: &GlobalArgs) -> PriceSource {
    match (&global.csv_dir, global.synthetic) {
        (Some(dir), _) => PriceSource::Csv(dir.clone()),
        (None, true) => PriceSource::Synthetic,
        (None, false) => PriceSource::Live,
    }
}

fn run_pipeline<F>(
    global: &GlobalArgs,
    config: &PipelineConfig,
    listing: ListingSource,
    run: F,
) -> Result<()>
where
    F: FnOnce(&mut Orchestrator) -> Result<RunSummary, krxlab_runner::PipelineError>,
{
    let sources = Sources::build(config, &listing, &price_source(global))?;
    let store = Store::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    let mut orchestrator = Orchestrator::new(config, sources.listing, sources.prices, store)?;

    let summary = run(&mut orchestrator)?;

    if global.json {
        println!("{}", summary.to_json_pretty()?);
    } else {
        print_summary(&summary);
    }

    if summary.is_degraded() {
        std::process::exit(2);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Run:        {} over {}", summary.mode, summary.range);
    println!("State:      {}", summary.state);
    println!(
        "Symbols:    {} processed, {} succeeded, {} failed ({:.1}%)",
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.failure_ratio() * 100.0
    );
    println!(
        "Rows:       {} prices, {} indicators, {} index bars, {} stats",
        summary.price_rows, summary.indicator_rows, summary.index_rows, summary.stat_rows
    );
    if summary.new_instruments > 0 || summary.delisted > 0 {
        println!(
            "Listing:    {} new, {} no longer listed",
            summary.new_instruments, summary.delisted
        );
    }
    if !summary.failures.is_empty() {
        println!();
        println!("{:<12} {:>8}  Error", "Symbol", "Attempts");
        println!("{}", "-".repeat(60));
        for f in &summary.failures {
            println!("{:<12} {:>8}  {}", f.symbol, f.attempts, f.error);
        }
    }
    if !summary.failed_indices.is_empty() {
        println!("Indices not updated: {}", summary.failed_indices.join(", "));
    }
    println!("Elapsed:    {:.1}s", summary.elapsed_ms as f64 / 1000.0);
}

fn run_status(config: &PipelineConfig, json: bool) -> Result<()> {
    let path = &config.database_path;
    if !path.exists() {
        println!("Database does not exist: {}", path.display());
        return Ok(());
    }
    let status = Store::open(path)?.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let latest = status
        .latest_price_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "(none)".into());
    println!("Database: {}", path.display());
    println!("Latest trading date: {latest}");
    println!();
    println!("{:<22} {:>12}", "Table", "Rows");
    println!("{}", "-".repeat(35));
    for (table, rows) in [
        ("instruments", status.instruments),
        ("  active", status.active_instruments),
        ("daily_prices", status.daily_prices),
        ("technical_indicators", status.technical_indicators),
        ("market_indices", status.market_indices),
        ("market_stats", status.market_stats),
    ] {
        println!("{table:<22} {rows:>12}");
    }
    Ok(())
}
