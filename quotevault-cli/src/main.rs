//! quotevault CLI: download, status, prune and ledger commands.
//!
//! Commands:
//! - `download`: incrementally fetch, augment and store daily price history
//! - `status`: report stored symbols, date ranges, row counts and sizes
//! - `prune`: remove datasets whose last row is older than a cutoff
//! - `ledger show|reset`: inspect or clear the download progress ledger

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use quotevault_core::data::{
    CircuitBreaker, DatasetFormat, DatasetStore, FileStore, ThreadSleeper, YahooProvider,
};
use quotevault_core::domain::Interval;
use quotevault_runner::{
    collect_symbols, JsonLedgerStore, LedgerStore, PipelineConfig, Scheduler, StdoutProgress,
    Universe,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "quotevault",
    about = "quotevault: incremental equity price history with indicators",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new rows for each symbol, add indicators and merge into the store.
    Download(DownloadArgs),

    /// Report stored symbols, date ranges, row counts and sizes.
    Status {
        /// Dataset directory. Defaults to ./data/prices.
        #[arg(long, default_value = "data/prices")]
        data_dir: PathBuf,

        /// Dataset file format.
        #[arg(long, default_value = "csv")]
        format: DatasetFormat,

        /// Bar interval of the datasets to list.
        #[arg(long, default_value = "1d")]
        interval: Interval,
    },

    /// Remove datasets whose last row is older than the given number of days.
    Prune {
        /// Datasets ending more than this many days ago are stale.
        #[arg(long)]
        stale_days: u32,

        /// Dataset directory. Defaults to ./data/prices.
        #[arg(long, default_value = "data/prices")]
        data_dir: PathBuf,

        #[arg(long, default_value = "csv")]
        format: DatasetFormat,

        #[arg(long, default_value = "1d")]
        interval: Interval,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },

    /// Inspect or clear the download progress ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(clap::Args)]
struct DownloadArgs {
    /// Symbols to download (e.g., AAPL MSFT SPY).
    symbols: Vec<String>,

    /// Universe TOML file with `[sectors]` ticker lists.
    #[arg(long)]
    universe: Option<PathBuf>,

    /// Pipeline config TOML. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start date (YYYY-MM-DD) for symbols without stored data.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Bar interval: 1d, 1wk or 1mo.
    #[arg(long)]
    interval: Option<Interval>,

    /// Ignore stored data and re-request the whole initial window.
    #[arg(long, default_value_t = false)]
    full_refresh: bool,

    /// Also skip symbols that failed in an earlier run.
    #[arg(long, default_value_t = false)]
    skip_failed: bool,

    #[arg(long)]
    call_delay_ms: Option<u64>,

    #[arg(long)]
    symbol_delay_ms: Option<u64>,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    base_delay_ms: Option<u64>,

    #[arg(long)]
    format: Option<DatasetFormat>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Ledger file. Defaults to ./data/download_progress.json.
    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Print completed and failed symbols.
    Show {
        #[arg(long, default_value = "data/download_progress.json")]
        ledger: PathBuf,
    },
    /// Forget all recorded progress.
    Reset {
        #[arg(long, default_value = "data/download_progress.json")]
        ledger: PathBuf,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("quotevault={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Download(args) => run_download(args),
        Commands::Status {
            data_dir,
            format,
            interval,
        } => run_status(&FileStore::new(&data_dir, format).with_interval(interval)),
        Commands::Prune {
            stale_days,
            data_dir,
            format,
            interval,
            confirm,
        } => run_prune(
            &FileStore::new(&data_dir, format).with_interval(interval),
            stale_days,
            confirm,
        ),
        Commands::Ledger { action } => match action {
            LedgerAction::Show { ledger } => run_ledger_show(&ledger),
            LedgerAction::Reset { ledger } => run_ledger_reset(&ledger),
        },
    }
}

/// File config (or defaults) with command-line overrides applied.
fn resolve_config(args: &DownloadArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if args.start.is_some() {
        config.window.start = args.start;
    }
    if args.end.is_some() {
        config.window.end = args.end;
    }
    if let Some(interval) = args.interval {
        config.window.interval = interval;
    }
    config.window.full_refresh |= args.full_refresh;
    config.schedule.skip_failed |= args.skip_failed;
    if let Some(ms) = args.call_delay_ms {
        config.fetch.call_delay_ms = ms;
    }
    if let Some(ms) = args.symbol_delay_ms {
        config.schedule.symbol_delay_ms = ms;
    }
    if let Some(n) = args.max_retries {
        config.fetch.retry.max_retries = n;
    }
    if let Some(ms) = args.base_delay_ms {
        config.fetch.retry.base_delay_ms = ms;
    }
    if let Some(format) = args.format {
        config.storage.format = format;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(path) = &args.ledger {
        config.storage.ledger_path = path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run_download(args: DownloadArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    let universe = args
        .universe
        .as_deref()
        .map(Universe::from_file)
        .transpose()?;
    let symbols = collect_symbols(&args.symbols, universe.as_ref());
    if symbols.is_empty() {
        bail!("no symbols given (pass symbols or --universe)");
    }

    let breaker = Arc::new(CircuitBreaker::default());
    let provider = YahooProvider::new(breaker).context("build HTTP client")?;
    let store = FileStore::new(&config.storage.data_dir, config.storage.format)
        .with_interval(config.window.interval);
    let ledger_store = JsonLedgerStore::new(&config.storage.ledger_path);
    let ledger = ledger_store.load().with_context(|| {
        format!(
            "load ledger (run `quotevault ledger reset --ledger {}` to start over)",
            config.storage.ledger_path.display()
        )
    })?;

    info!(
        symbols = symbols.len(),
        completed = ledger.completed_count(),
        failed = ledger.failed_count(),
        data_dir = %config.storage.data_dir.display(),
        "download starting"
    );

    let sleeper = ThreadSleeper;
    let progress = StdoutProgress;
    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config)
        .with_progress(&progress);
    let (report, _ledger) = scheduler.run(&symbols, &config.window, ledger);

    println!("Data saved in: {}", config.storage.data_dir.display());
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(store: &FileStore) -> Result<()> {
    let data_dir = store.root();
    if !data_dir.exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let symbols = store.symbols()?;
    let mut total_size = 0u64;
    let mut rows = Vec::new();

    for symbol in &symbols {
        let size = std::fs::metadata(store.dataset_path(symbol))
            .map(|m| m.len())
            .unwrap_or(0);
        total_size += size;

        let (range, count) = match store.meta(symbol) {
            Some(meta) => (
                format!("{} to {}", meta.start_date, meta.end_date),
                meta.row_count.to_string(),
            ),
            None => match store.load(symbol)? {
                Some(ds) => match (ds.first_date(), ds.last_date()) {
                    (Some(first), Some(last)) => (format!("{first} to {last}"), ds.len().to_string()),
                    _ => ("(empty)".into(), "0".into()),
                },
                None => ("(unreadable)".into(), "-".into()),
            },
        };
        rows.push((symbol.clone(), range, count, size));
    }

    println!(
        "Data: {} ({}, {})",
        data_dir.display(),
        store.format(),
        store.interval()
    );
    println!("Symbols: {}", symbols.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<10} {:<25} {:<10} {:>10}", "Symbol", "Date Range", "Rows", "Size");
    println!("{}", "-".repeat(58));
    for (sym, range, count, size) in &rows {
        println!("{:<10} {:<25} {:<10} {:>10}", sym, range, count, format_size(*size));
    }

    Ok(())
}

fn run_prune(store: &FileStore, stale_days: u32, confirm: bool) -> Result<()> {
    let data_dir = store.root();
    if !data_dir.exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(i64::from(stale_days));
    let stale = store.prune_stale(cutoff, confirm)?;

    if stale.is_empty() {
        println!("No datasets ending before {cutoff}.");
        return Ok(());
    }

    println!("Found {} dataset(s) ending before {cutoff}:", stale.len());
    for (symbol, last) in &stale {
        match last {
            Some(d) => println!("  {symbol} (last row {d})"),
            None => println!("  {symbol} (no rows)"),
        }
    }

    if confirm {
        println!("Done. Removed {} dataset(s).", stale.len());
    } else {
        println!();
        println!("Dry run, pass --confirm to actually delete.");
    }
    Ok(())
}

fn run_ledger_show(path: &Path) -> Result<()> {
    let ledger = JsonLedgerStore::new(path).load()?;
    println!("Ledger: {}", path.display());
    println!("Completed: {}", ledger.completed_count());
    println!("Failed: {}", ledger.failed_count());

    let failed = ledger.failed();
    for record in failed.iter().take(20) {
        println!("  {}: {}", record.symbol, record.error);
    }
    if failed.len() > 20 {
        println!("  ... and {} more", failed.len() - 20);
    }
    Ok(())
}

fn run_ledger_reset(path: &Path) -> Result<()> {
    JsonLedgerStore::new(path).reset()?;
    println!("Ledger cleared: {}", path.display());
    Ok(())
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
