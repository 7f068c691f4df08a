//! Quantbridge CLI: fetch, update, align, and master store commands.
//!
//! Commands:
//! - `fetch`: one-off download, normalized, optionally exported
//! - `update`: incremental update of a master store record
//! - `align`: align two arbitrary Parquet files
//! - `align-pair`: align two store records resampled to one timeframe
//! - `store status|remove|clear|export-all`: master store maintenance

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use quantbridge_core::config::AppConfig;
use quantbridge_core::data::align::{AlignOptions, AlignOutcome, FillTarget};
use quantbridge_core::data::export::{export_aligned, export_series, ExportFormat};
use quantbridge_core::data::validate::{validate_code, validate_date_range};
use quantbridge_core::data::{
    AlignmentEngine, CryptoClient, FetchError, FetchRequest, MasterStore, SourceRouter,
    UpdateRequest, YahooClient,
};
use quantbridge_core::domain::{AssetClass, Series, SeriesKey, Timeframe};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "quantbridge",
    about = "Quantbridge CLI: OHLCV retrieval, master store, and alignment"
)]
struct Cli {
    /// Path to the TOML config file. Defaults apply if it does not exist.
    #[arg(long, global = true, default_value = "quantbridge.toml")]
    config: PathBuf,

    /// Debug logging (RUST_LOG takes precedence).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by `fetch` and `update`.
#[derive(Args)]
struct SourceArgs {
    /// Asset class: malaysia-stock, us-stock, global-futures, bursa-futures, crypto.
    #[arg(long)]
    asset: AssetClass,

    /// Timeframe: 1m, 5m, 15m, 1h, 1d, 1w, 1M.
    #[arg(long, default_value = "1d")]
    timeframe: Timeframe,

    /// End (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS). Defaults to now.
    #[arg(long)]
    end: Option<String>,

    /// Crypto venue label or id (e.g. binance). Defaults to the configured venue.
    #[arg(long)]
    exchange: Option<String>,

    /// Proxy URL for all provider traffic. Overrides the config file.
    #[arg(long)]
    proxy: Option<String>,

    /// Drop bars inside the midday break for markets that have one.
    #[arg(long, default_value_t = false)]
    session_filter: bool,

    /// Also export the result: csv or parquet.
    #[arg(long)]
    export: Option<ExportFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one series without touching the master store.
    Fetch {
        /// Instrument code (e.g. 1155, AAPL, GC=F, FCPO1!, BTC/USDT).
        code: String,

        /// Start (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS). Defaults to the configured lookback.
        #[arg(long)]
        start: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Incrementally update a master store record.
    Update {
        /// Instrument code; the store record is keyed by it.
        symbol: String,

        /// Start of the first full fetch. Ignored once a record exists.
        #[arg(long)]
        start: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Align two Parquet files on a shared time axis.
    Align {
        /// Asset A (base) file, named {symbol}_{timeframe}.parquet.
        file_a: PathBuf,

        /// Asset B (reference) file.
        file_b: PathBuf,

        /// Disable forward fill.
        #[arg(long, default_value_t = false)]
        no_ffill: bool,

        /// Side to forward fill: a, b, or both.
        #[arg(long, default_value = "b")]
        fill: FillTarget,

        /// Output file name inside the processed directory.
        #[arg(long)]
        output: Option<String>,

        /// Also export the aligned dataset: csv or parquet.
        #[arg(long)]
        export: Option<ExportFormat>,
    },
    /// Align two master store records resampled to one timeframe.
    AlignPair {
        base: String,
        target: String,

        #[arg(long, default_value = "15m")]
        timeframe: Timeframe,

        /// Output file name inside the processed directory.
        #[arg(long)]
        output: Option<String>,
    },
    /// Master store maintenance.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// List records with row count, last timestamp, and size.
    Status {
        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete one record.
    Remove { symbol: String, timeframe: Timeframe },
    /// Delete every record.
    Clear {
        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
    /// Convert every record to CSV.
    ExportAll {
        /// Output directory. Defaults to the configured export directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Fetch { code, start, source } => run_fetch(&config, &code, start, source),
        Commands::Update { symbol, start, source } => run_update(&config, &symbol, start, source),
        Commands::Align {
            file_a,
            file_b,
            no_ffill,
            fill,
            output,
            export,
        } => {
            let opts = AlignOptions {
                forward_fill: !no_ffill,
                fill_target: fill,
                output_name: output,
            };
            run_align(&config, &file_a, &file_b, &opts, export)
        }
        Commands::AlignPair {
            base,
            target,
            timeframe,
            output,
        } => run_align_pair(&config, &base, &target, timeframe, output.as_deref()),
        Commands::Store { action } => match action {
            StoreAction::Status { json } => run_store_status(&config, json),
            StoreAction::Remove { symbol, timeframe } => {
                run_store_remove(&config, &symbol, timeframe)
            }
            StoreAction::Clear { confirm } => run_store_clear(&config, confirm),
            StoreAction::ExportAll { dir } => run_store_export(&config, dir),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(t);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN))
}

fn build_router(config: &AppConfig) -> Result<SourceRouter> {
    let timeout = config.network.timeout();
    Ok(SourceRouter::default()
        .with_equity(YahooClient::new(timeout)?)
        .with_crypto(CryptoClient::new(timeout)?)
        .with_timezone(config.timezone_standardizer()?)
        .with_session_window(config.session)
        .with_default_venue(config.crypto.default_venue.clone()))
}

/// Print a fetch failure with its hint and bail.
fn report_failure(e: FetchError) -> Result<()> {
    eprintln!("Error: {e}");
    eprintln!("  disposition: {:?}", e.disposition());
    bail!("request failed")
}

fn print_series(series: &Series) {
    match (series.first_timestamp(), series.last_timestamp()) {
        (Some(first), Some(last)) => {
            println!("{}: {} rows, {first} .. {last}", series.key, series.len())
        }
        _ => println!("{}: no rows", series.key),
    }
}

fn run_fetch(
    config: &AppConfig,
    code: &str,
    start: Option<String>,
    args: SourceArgs,
) -> Result<()> {
    let now = Local::now().naive_local();
    let end = args.end.as_deref().map(parse_datetime).transpose()?.unwrap_or(now);
    let start = match start.as_deref() {
        Some(s) => parse_datetime(s)?,
        None => end - Duration::days(config.default_lookback_days),
    };

    let code = code.trim();
    validate_code(code, args.asset)?;
    validate_date_range(start, end, now)?;

    let router = build_router(config)?;
    let request = FetchRequest {
        asset_class: args.asset,
        code: code.to_string(),
        timeframe: args.timeframe,
        start,
        end,
        exchange: args.exchange,
        proxy: args.proxy.or_else(|| config.network.proxy.clone()),
        session_filter: args.session_filter,
    };

    let series = match router.fetch(&request) {
        Ok(series) => series,
        Err(e) => return report_failure(e),
    };
    print_series(&series);
    report_gap(config, &series, start, end);

    if let Some(format) = args.export {
        let path = export_series(&series, &config.export_dir, start.date(), format)?;
        println!("Exported to {}", path.display());
    }
    Ok(())
}

fn report_gap(config: &AppConfig, series: &Series, start: NaiveDateTime, end: NaiveDateTime) {
    let report = config.gap_analyzer().analyze(series, start, end);
    if report.has_warning {
        eprintln!("Warning: {}", report.message);
    } else {
        println!("{}", report.message);
    }
}

fn run_update(
    config: &AppConfig,
    symbol: &str,
    start: Option<String>,
    args: SourceArgs,
) -> Result<()> {
    let now = Local::now().naive_local();
    let end = args.end.as_deref().map(parse_datetime).transpose()?.unwrap_or(now);
    let start = start.as_deref().map(parse_datetime).transpose()?;

    let symbol = symbol.trim();
    validate_code(symbol, args.asset)?;
    if let Some(start) = start {
        validate_date_range(start, end, now)?;
    }

    let router = build_router(config)?;
    let store =
        MasterStore::new(&config.store_dir).with_lookback_days(config.default_lookback_days);
    let request = UpdateRequest {
        symbol: symbol.to_string(),
        timeframe: args.timeframe,
        asset_class: args.asset,
        start,
        end,
        exchange: args.exchange,
        proxy: args.proxy.or_else(|| config.network.proxy.clone()),
        session_filter: args.session_filter,
    };

    let series = match store.update(&request, &router) {
        Ok(series) => series,
        Err(e) => return report_failure(e),
    };
    print_series(&series);
    println!("Stored at {}", store.path_for(&request.key()).display());
    if let Some(start) = start {
        report_gap(config, &series, start, end);
    }

    if let Some(format) = args.export {
        let export_start = start.or_else(|| series.first_timestamp()).unwrap_or(end);
        let path = export_series(&series, &config.export_dir, export_start.date(), format)?;
        println!("Exported to {}", path.display());
    }
    Ok(())
}

fn print_alignment(outcome: &AlignOutcome) {
    let stats = &outcome.stats;
    println!("Aligned dataset: {}", outcome.path.display());
    println!("  rows:     {}", stats.rows);
    if let (Some(first), Some(last)) = (stats.first, stats.last) {
        println!("  range:    {first} .. {last} ({} days)", stats.span_days);
    }
    if let Some(c) = stats.coverage_a {
        println!("  A close:  {c:.1}%");
    }
    if let Some(c) = stats.coverage_b {
        println!("  B close:  {c:.1}%");
    }
    println!("  overlap:  {:.1}%", stats.overlap_pct);
    println!("  preview:  {} rows", outcome.preview.len());
}

fn run_align(
    config: &AppConfig,
    file_a: &Path,
    file_b: &Path,
    opts: &AlignOptions,
    export: Option<ExportFormat>,
) -> Result<()> {
    let engine = AlignmentEngine::new(&config.store_dir, &config.processed_dir);
    let outcome = engine.align_files(file_a, file_b, opts)?;
    print_alignment(&outcome);

    if let Some(format) = export {
        let stem = outcome
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("aligned");
        let path = config.export_dir.join(format!("{stem}.{}", format.extension()));
        export_aligned(&outcome.full, &path, format)?;
        println!("Exported to {}", path.display());
    }
    Ok(())
}

fn run_align_pair(
    config: &AppConfig,
    base: &str,
    target: &str,
    timeframe: Timeframe,
    output: Option<&str>,
) -> Result<()> {
    let engine = AlignmentEngine::new(&config.store_dir, &config.processed_dir);
    let outcome = engine.align_datasets(base, target, timeframe, output)?;
    print_alignment(&outcome);
    Ok(())
}

fn run_store_status(config: &AppConfig, json: bool) -> Result<()> {
    let store = MasterStore::new(&config.store_dir);
    let entries = store.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("Store is empty: {}", config.store_dir.display());
        return Ok(());
    }

    println!("{:<16} {:>4} {:>8} {:>20} {:>10}", "Symbol", "TF", "Rows", "Last", "Size");
    let mut total = 0u64;
    for e in &entries {
        total += e.size_bytes;
        println!(
            "{:<16} {:>4} {:>8} {:>20} {:>8.1}KB",
            e.symbol,
            e.timeframe,
            e.rows.map(|r| r.to_string()).unwrap_or_else(|| "corrupt".into()),
            e.last_timestamp.map(|t| t.to_string()).unwrap_or_default(),
            e.size_bytes as f64 / 1024.0,
        );
    }
    println!("{} records, {:.2} MB", entries.len(), total as f64 / (1024.0 * 1024.0));
    Ok(())
}

fn run_store_remove(config: &AppConfig, symbol: &str, timeframe: Timeframe) -> Result<()> {
    let store = MasterStore::new(&config.store_dir);
    let key = SeriesKey::new(symbol.trim(), timeframe);
    if store.remove(&key)? {
        println!("Removed {key}");
        Ok(())
    } else {
        bail!("no store record for {key}")
    }
}

fn run_store_clear(config: &AppConfig, confirm: bool) -> Result<()> {
    let store = MasterStore::new(&config.store_dir);
    if !confirm {
        let entries = store.status()?;
        println!("Would remove {} records:", entries.len());
        for e in &entries {
            println!("  {}", e.path.display());
        }
        println!("Run with --confirm to delete.");
        return Ok(());
    }
    let removed = store.clear()?;
    println!("Removed {removed} records");
    Ok(())
}

fn run_store_export(config: &AppConfig, dir: Option<PathBuf>) -> Result<()> {
    let store = MasterStore::new(&config.store_dir);
    let out_dir = dir.unwrap_or_else(|| config.export_dir.clone());
    let outcomes = store.export_all_csv(&out_dir)?;

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => println!("  ok    {}", path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("  fail  {}: {e}", outcome.source.display());
            }
        }
    }
    println!("Exported {} of {} records", outcomes.len() - failed, outcomes.len());
    if failed > 0 {
        bail!("{failed} records could not be exported");
    }
    Ok(())
}
