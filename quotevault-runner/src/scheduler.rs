//! Symbol batch scheduler.
//!
//! Walks the symbol list strictly in order, one symbol at a time:
//! load → plan window → fetch → augment → merge → atomic write.
//! A symbol's failure is recorded and the batch moves on; the ledger is
//! persisted after every symbol that reached a terminal outcome.

use crate::config::{PipelineConfig, ScheduleConfig};
use crate::ledger::{LedgerStore, ProgressLedger};
use crate::progress::{DownloadProgress, NoProgress};
use crate::report::{RunReport, SymbolUpdate};
use chrono::NaiveDate;
use quotevault_core::data::{
    merge, DatasetStore, FetchClient, FetchConfig, FetchError, QuoteProvider, Sleeper,
    StorageError,
};
use quotevault_core::domain::{FetchWindow, WindowPolicy};
use quotevault_core::indicators::Augmenter;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Ledger reasons longer than this are cut.
const MAX_REASON_LEN: usize = 160;

/// Why one symbol failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("no data returned for {symbol}")]
    NoData { symbol: String },
}

impl PipelineError {
    /// One-line reason stored in the ledger.
    pub fn short_reason(&self) -> String {
        let reason = match self {
            PipelineError::Fetch(FetchError::RateLimited { .. }) => "rate limited".to_string(),
            PipelineError::Fetch(FetchError::NotFound { .. }) => "not found".to_string(),
            PipelineError::Fetch(FetchError::Transient(msg)) => format!("transient: {msg}"),
            PipelineError::Storage(e) => format!("storage: {e}"),
            PipelineError::NoData { .. } => "no data".to_string(),
        };
        truncate(reason)
    }
}

fn truncate(mut s: String) -> String {
    if s.len() > MAX_REASON_LEN {
        let mut cut = MAX_REASON_LEN;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

pub struct Scheduler<'a> {
    provider: &'a dyn QuoteProvider,
    store: &'a dyn DatasetStore,
    ledger_store: &'a dyn LedgerStore,
    sleeper: &'a dyn Sleeper,
    progress: &'a dyn DownloadProgress,
    augmenter: Augmenter,
    fetch: FetchConfig,
    schedule: ScheduleConfig,
    today: NaiveDate,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        provider: &'a dyn QuoteProvider,
        store: &'a dyn DatasetStore,
        ledger_store: &'a dyn LedgerStore,
        sleeper: &'a dyn Sleeper,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            provider,
            store,
            ledger_store,
            sleeper,
            progress: &NoProgress,
            augmenter: Augmenter::new(config.indicators.clone()),
            fetch: config.fetch.clone(),
            schedule: config.schedule.clone(),
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn DownloadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Pin "today" (the default end of every window).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Run the batch. Returns the report and the updated ledger.
    pub fn run(
        &self,
        symbols: &[String],
        policy: &WindowPolicy,
        mut ledger: ProgressLedger,
    ) -> (RunReport, ProgressLedger) {
        let mut seen = HashSet::new();
        let queue: Vec<&str> = symbols
            .iter()
            .map(String::as_str)
            .filter(|s| seen.insert(*s))
            .collect();
        let total = queue.len();
        let mut report = RunReport::default();
        let mut pipelined = 0usize;

        info!(symbols = total, interval = %policy.interval, "starting batch");

        for (index, symbol) in queue.into_iter().enumerate() {
            if !ledger.should_process(symbol, self.schedule.skip_failed) {
                debug!(symbol, "recorded in ledger, skipping");
                report.record_skip(symbol);
                self.progress.on_skip(symbol, index, total);
                continue;
            }

            if pipelined > 0 {
                debug!(delay_ms = self.schedule.symbol_delay_ms, "pacing before next symbol");
                self.sleeper.sleep(self.schedule.symbol_delay());
            }
            pipelined += 1;
            self.wait_for_cooldown(symbol);

            self.progress.on_start(symbol, index, total);
            let result = self.process_symbol(symbol, policy);

            match &result {
                Ok(update) => {
                    info!(
                        symbol,
                        inserted = update.stats.inserted,
                        updated = update.stats.updated,
                        rows = update.total_rows,
                        low_quality = update.low_quality,
                        "symbol updated"
                    );
                    ledger.record_success(symbol);
                    report.record_success(symbol, update);
                }
                Err(e) => {
                    let reason = e.short_reason();
                    warn!(symbol, error = %e, "symbol failed");
                    ledger.record_failure(symbol, reason.clone());
                    report.record_failure(symbol, &reason);
                }
            }
            self.progress.on_complete(symbol, index, total, &result);

            if let Err(e) = self.ledger_store.save(&ledger) {
                warn!(symbol, error = %e, "could not persist ledger, continuing");
            }
        }

        report.log_summary();
        self.progress.on_batch_complete(&report);
        (report, ledger)
    }

    /// Wait out an open circuit breaker before touching the provider.
    fn wait_for_cooldown(&self, symbol: &str) {
        let remaining = self.provider.cooldown_remaining();
        if !remaining.is_zero() {
            info!(symbol, wait_secs = remaining.as_secs(), "provider cooling down, waiting");
            self.sleeper.sleep(remaining);
        }
    }

    fn process_symbol(&self, symbol: &str, policy: &WindowPolicy) -> Result<SymbolUpdate, PipelineError> {
        let existing = self.store.load(symbol)?;
        let window = FetchWindow::plan(symbol, existing.as_ref(), policy, self.today);
        debug!(%window, stored = existing.as_ref().map_or(0, |ds| ds.len()), "planned fetch window");

        let client = FetchClient::new(self.provider, self.sleeper, self.fetch.clone());
        let fetched = client.fetch(&window, policy.interval)?;
        if fetched.report.has_anomalies() {
            warn!(symbol, report = ?fetched.report, "provider data anomalies");
        }

        if fetched.rows.is_empty() {
            return match existing {
                Some(ds) => {
                    debug!(symbol, "nothing new upstream");
                    Ok(SymbolUpdate {
                        stats: Default::default(),
                        total_rows: ds.len(),
                        low_quality: false,
                        failed_indicators: Vec::new(),
                        events_missing: fetched.events_missing,
                    })
                }
                None => Err(PipelineError::NoData {
                    symbol: symbol.to_string(),
                }),
            };
        }

        // The augmenter cuts history at the first fetched date itself: the
        // stored overlap day stays in the series when upstream omits it.
        let augmented = {
            let history = existing.as_ref().map_or(&[][..], |ds| &ds.rows[..]);
            self.augmenter.augment_with_history(history, fetched.rows)
        };
        let low_quality = augmented.is_low_quality();
        let failed_indicators = augmented.failures.iter().map(|f| f.column).collect();

        let merged = merge(symbol, existing, augmented.rows);
        if merged.stats.changed() {
            self.store.write(&merged.dataset)?;
        }

        Ok(SymbolUpdate {
            stats: merged.stats,
            total_rows: merged.dataset.len(),
            low_quality,
            failed_indicators,
            events_missing: fetched.events_missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn short_reasons() {
        let e = PipelineError::from(FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        });
        assert_eq!(e.short_reason(), "rate limited");

        let e = PipelineError::from(FetchError::NotFound {
            symbol: "XYZ".into(),
        });
        assert_eq!(e.short_reason(), "not found");

        let e = PipelineError::NoData {
            symbol: "XYZ".into(),
        };
        assert_eq!(e.short_reason(), "no data");
    }

    #[test]
    fn long_reasons_are_cut() {
        let e = PipelineError::from(FetchError::Transient("x".repeat(500)));
        let reason = e.short_reason();
        assert!(reason.len() <= MAX_REASON_LEN + 3);
        assert!(reason.ends_with("..."));
    }
}
