//! User-facing progress for a batch run.
//!
//! Structured events go through `tracing`; this trait is for the plain
//! per-symbol lines a person watches on stdout.

use crate::report::{RunReport, SymbolUpdate};
use crate::scheduler::PipelineError;

/// Progress callback for multi-symbol runs.
pub trait DownloadProgress: Send + Sync {
    /// Called before a symbol enters the pipeline.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called for a symbol the ledger says to leave alone.
    fn on_skip(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol reaches a terminal outcome.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<SymbolUpdate, PipelineError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, report: &RunReport);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_skip(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] {symbol} already done, skipping", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<SymbolUpdate, PipelineError>,
    ) {
        match result {
            Ok(update) if update.low_quality => println!(
                "  OK: {symbol} ({} rows, too short for indicators)",
                update.total_rows
            ),
            Ok(update) => {
                println!(
                    "  OK: {symbol} (+{} new, {} revised, {} rows)",
                    update.stats.inserted, update.stats.updated, update.total_rows
                );
                if !update.failed_indicators.is_empty() {
                    let names: Vec<&str> =
                        update.failed_indicators.iter().map(|c| c.name()).collect();
                    println!("  WARN: {symbol}: indicators left empty: {}", names.join(", "));
                }
            }
            Err(e) => println!("  FAIL: {symbol}: {}", e.short_reason()),
        }
    }

    fn on_batch_complete(&self, report: &RunReport) {
        println!(
            "\nDownload complete: {} succeeded, {} failed, {} skipped, {} low quality",
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len(),
            report.low_quality.len()
        );
        if !report.indicator_failures.is_empty() {
            println!("Indicator failures:");
            for (symbol, columns) in &report.indicator_failures {
                println!("  {symbol}: {}", columns.join(", "));
            }
        }
        if !report.events_missing.is_empty() {
            println!("Without dividends/splits: {}", report.events_missing.join(", "));
        }
        if report.has_failures() {
            println!("Failed symbols:");
            for (symbol, reason) in &report.failed {
                println!("  {symbol}: {reason}");
            }
        }
    }
}

/// Discards all progress.
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_skip(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(
        &self,
        _symbol: &str,
        _index: usize,
        _total: usize,
        _result: &Result<SymbolUpdate, PipelineError>,
    ) {
    }
    fn on_batch_complete(&self, _report: &RunReport) {}
}
