//! Integration tests for the batch scheduler.
//!
//! A fake provider serves a deterministic daily series per symbol; datasets go
//! to a temp directory, the ledger to memory, and waits to a recording sleeper.

use chrono::{Duration as Days, NaiveDate};
use quotevault_core::data::{
    DatasetFormat, DatasetStore, FetchError, FileStore, ProviderSeries, QuoteProvider, RawBar,
    RecordingSleeper, RetryPolicy,
};
use quotevault_core::domain::{IndicatorColumn, Interval, WindowPolicy};
use quotevault_core::indicators::{AugmentConfig, Augmenter};
use quotevault_runner::{
    LedgerStore, MemoryLedgerStore, PipelineConfig, ProgressLedger, Scheduler,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// What the fake upstream does for a symbol.
#[derive(Clone)]
enum Script {
    /// This many consecutive daily bars starting at `first_day()`.
    Days(usize),
    Fail(FetchError),
}

struct FakeProvider {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    /// Dates upstream leaves out of its answer.
    gaps: Mutex<Vec<NaiveDate>>,
    cooldown: Duration,
}

impl FakeProvider {
    fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(s, script)| (s.to_string(), script.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
            gaps: Mutex::new(Vec::new()),
            cooldown: Duration::ZERO,
        }
    }

    fn fetched_symbols(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect()
    }
}

impl QuoteProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _interval: Interval,
    ) -> Result<ProviderSeries, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), start, end));
        let days = match self.scripts.get(symbol) {
            Some(Script::Days(n)) => *n,
            Some(Script::Fail(e)) => return Err(e.clone()),
            None => {
                return Err(FetchError::NotFound {
                    symbol: symbol.to_string(),
                })
            }
        };
        let gaps = self.gaps.lock().unwrap().clone();
        let bars = (0..days)
            .map(|i| (first_day() + Days::days(i as i64), i))
            .filter(|(date, _)| *date >= start && *date <= end && !gaps.contains(date))
            .map(|(date, i)| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 5.0;
                RawBar {
                    timestamp: date.and_hms_opt(14, 30, 0).unwrap().and_utc().timestamp(),
                    open: Some(close - 0.5),
                    high: Some(close + 1.0),
                    low: Some(close - 1.0),
                    close: Some(close),
                    volume: Some(10_000 + i as u64),
                }
            })
            .collect();
        Ok(ProviderSeries {
            symbol: symbol.to_string(),
            bars,
            gmt_offset_secs: 0,
        })
    }

    fn cooldown_remaining(&self) -> Duration {
        self.cooldown
    }
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.fetch.include_events = false;
    config.fetch.retry = RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1_000,
        ..RetryPolicy::default()
    };
    config
}

fn policy() -> WindowPolicy {
    WindowPolicy {
        start: Some(first_day()),
        ..WindowPolicy::default()
    }
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn today(days: i64) -> NaiveDate {
    first_day() + Days::days(days - 1)
}

#[test]
fn resume_skips_completed_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("AAPL", Script::Days(150)), ("MSFT", Script::Days(150))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let mut ledger = ProgressLedger::new();
    ledger.record_success("AAPL");

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(150));
    let (report, ledger) = scheduler.run(&symbols(&["AAPL", "MSFT"]), &policy(), ledger);

    assert_eq!(provider.fetched_symbols(), vec!["MSFT"]);
    assert_eq!(report.skipped, vec!["AAPL"]);
    assert_eq!(report.succeeded, vec!["MSFT"]);
    assert!(ledger.is_completed("AAPL"));
    assert!(ledger.is_completed("MSFT"));
    assert!(sleeper.waits().is_empty());
}

#[test]
fn one_failure_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("GOOD", Script::Days(150))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(150));
    let (report, ledger) =
        scheduler.run(&symbols(&["BAD", "GOOD"]), &policy(), ProgressLedger::new());

    assert!(report.has_failures());
    assert_eq!(report.failed.get("BAD").map(String::as_str), Some("not found"));
    assert_eq!(report.succeeded, vec!["GOOD"]);
    assert_eq!(ledger.failure_for("BAD").unwrap().error, "not found");
    assert!(ledger.is_completed("GOOD"));

    let stored = store.load("GOOD").unwrap().unwrap();
    assert_eq!(stored.len(), 150);
    assert!(stored.rows[149].indicators.get(IndicatorColumn::Rsi24).is_some());
    // NotFound is not retried: the only wait is the pacing before GOOD.
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(3)]);
}

#[test]
fn ledger_is_persisted_after_every_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("A", Script::Days(120)), ("C", Script::Days(120))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let mut ledger = ProgressLedger::new();
    ledger.record_success("SKIP");

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(120));
    let (_, ledger) = scheduler.run(&symbols(&["A", "SKIP", "B", "C"]), &policy(), ledger);

    // A, B and C reached a terminal outcome; SKIP did not.
    assert_eq!(ledger_store.save_count(), 3);
    assert_eq!(ledger_store.load().unwrap(), ledger);
}

#[test]
fn pacing_only_between_pipelined_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[
        ("A", Script::Days(110)),
        ("B", Script::Days(110)),
        ("C", Script::Days(110)),
    ]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let mut ledger = ProgressLedger::new();
    ledger.record_success("B");

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(110));
    scheduler.run(&symbols(&["A", "B", "C"]), &policy(), ledger);

    assert_eq!(sleeper.waits(), vec![Duration::from_secs(3)]);
}

#[test]
fn rate_limited_symbol_backs_off_then_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[
        ("HOT", Script::Fail(FetchError::RateLimited { retry_after: None })),
        ("OK", Script::Days(110)),
    ]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(110));
    let (report, _) = scheduler.run(&symbols(&["HOT", "OK"]), &policy(), ProgressLedger::new());

    assert_eq!(provider.fetched_symbols(), vec!["HOT", "HOT", "HOT", "OK"]);
    assert_eq!(
        sleeper.waits(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3)
        ]
    );
    assert_eq!(report.failed.get("HOT").map(String::as_str), Some("rate limited"));
    assert!(store.load("HOT").unwrap().is_none());
}

#[test]
fn ledger_save_failure_does_not_abort() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("A", Script::Days(110)), ("B", Script::Days(110))]);
    let ledger_store = MemoryLedgerStore::failing();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(110));
    let (report, ledger) = scheduler.run(&symbols(&["A", "B"]), &policy(), ProgressLedger::new());

    assert_eq!(report.succeeded, vec!["A", "B"]);
    assert!(ledger.is_completed("A") && ledger.is_completed("B"));
    assert_eq!(ledger_store.save_count(), 2);
}

#[test]
fn short_history_is_stored_raw_and_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("NEWCO", Script::Days(30))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(30));
    let (report, ledger) = scheduler.run(&symbols(&["NEWCO"]), &policy(), ProgressLedger::new());

    assert_eq!(report.low_quality, vec!["NEWCO"]);
    assert!(ledger.is_completed("NEWCO"));
    let stored = store.load("NEWCO").unwrap().unwrap();
    assert_eq!(stored.len(), 30);
    assert!(stored.rows.iter().all(|r| r.indicators.is_empty()));
}

#[test]
fn new_symbol_without_data_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("EMPTY", Script::Days(0))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(30));
    let (report, _) = scheduler.run(&symbols(&["EMPTY"]), &policy(), ProgressLedger::new());

    assert_eq!(report.failed.get("EMPTY").map(String::as_str), Some("no data"));
}

#[test]
fn duplicate_symbols_are_processed_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("A", Script::Days(110))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(110));
    let (report, _) = scheduler.run(&symbols(&["A", "A"]), &policy(), ProgressLedger::new());

    assert_eq!(provider.fetched_symbols(), vec!["A"]);
    assert_eq!(report.succeeded, vec!["A"]);
}

#[test]
fn failed_symbols_retried_unless_skip_failed() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("A", Script::Days(110))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let mut ledger = ProgressLedger::new();
    ledger.record_failure("A", "rate limited");

    let mut skipping = config();
    skipping.schedule.skip_failed = true;
    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &skipping)
        .with_today(today(110));
    let (report, ledger) = scheduler.run(&symbols(&["A"]), &policy(), ledger);
    assert_eq!(report.skipped, vec!["A"]);
    assert!(provider.fetched_symbols().is_empty());

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(110));
    let (report, ledger) = scheduler.run(&symbols(&["A"]), &policy(), ledger);
    assert_eq!(report.succeeded, vec!["A"]);
    assert!(!ledger.is_failed("A"));
}

#[test]
fn second_run_fetches_only_from_last_stored_day() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("A", Script::Days(130))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(120));
    scheduler.run(&symbols(&["A"]), &policy(), ProgressLedger::new());
    assert_eq!(store.load("A").unwrap().unwrap().len(), 120);

    // A fresh ledger: the dataset on disk decides the window.
    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(130));
    let (report, _) = scheduler.run(&symbols(&["A"]), &policy(), ProgressLedger::new());

    let calls = provider.calls.lock().unwrap().clone();
    assert_eq!(calls[1].1, today(120));
    assert_eq!(calls[1].2, today(130));
    assert_eq!(report.rows_written, 11);

    let stored = store.load("A").unwrap().unwrap();
    assert_eq!(stored.len(), 130);
    assert!(stored.is_canonical());
    assert!(stored.rows[129].indicators.get(IndicatorColumn::Macd).is_some());
}

#[test]
fn open_breaker_is_waited_out_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let mut provider = FakeProvider::new(&[("A", Script::Days(110))]);
    provider.cooldown = Duration::from_secs(90);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(110));
    scheduler.run(&symbols(&["A"]), &policy(), ProgressLedger::new());

    assert_eq!(sleeper.waits(), vec![Duration::from_secs(90)]);
}

#[test]
fn omitted_overlap_day_keeps_stored_row_in_lookback() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("A", Script::Days(133))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(130));
    scheduler.run(&symbols(&["A"]), &policy(), ProgressLedger::new());

    // The re-requested last stored day is missing from the second answer.
    provider.gaps.lock().unwrap().push(today(130));
    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(133));
    let (report, _) = scheduler.run(&symbols(&["A"]), &policy(), ProgressLedger::new());
    assert_eq!(report.succeeded, vec!["A"]);

    let stored = store.load("A").unwrap().unwrap();
    assert_eq!(stored.len(), 133);

    let raw = stored
        .rows
        .iter()
        .map(|r| {
            let mut r = r.clone();
            r.indicators = Default::default();
            r
        })
        .collect();
    let rebuilt = Augmenter::new(AugmentConfig::default()).augment(raw);
    for i in 130..133 {
        assert_eq!(stored.rows[i].indicators, rebuilt.rows[i].indicators, "row {i}");
    }
    let expected: f64 = stored.rows[126..=130].iter().map(|r| r.close).sum::<f64>() / 5.0;
    let sma5 = stored.rows[130].indicators.get(IndicatorColumn::Sma5).unwrap();
    assert!((sma5 - expected).abs() < 0.006, "sma5 {sma5} vs {expected}");
}

#[test]
fn storage_failure_is_recorded_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);
    let provider = FakeProvider::new(&[("A", Script::Days(130)), ("B", Script::Days(130))]);
    let ledger_store = MemoryLedgerStore::default();
    let sleeper = RecordingSleeper::new();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(120));
    scheduler.run(&symbols(&["A"]), &policy(), ProgressLedger::new());
    let path = store.dataset_path("A");
    let before = std::fs::read(&path).unwrap();

    // A directory squatting on the temp path makes the next write of A fail.
    std::fs::create_dir(dir.path().join("A.csv.tmp")).unwrap();

    let scheduler = Scheduler::new(&provider, &store, &ledger_store, &sleeper, &config())
        .with_today(today(130));
    let (report, ledger) = scheduler.run(&symbols(&["A", "B"]), &policy(), ProgressLedger::new());

    let reason = ledger.failure_for("A").unwrap().error.clone();
    assert!(reason.starts_with("storage:"), "{reason}");
    assert_eq!(report.failed.get("A"), Some(&reason));
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(report.succeeded, vec!["B"]);
    assert!(ledger.is_completed("B"));
    assert_eq!(store.load("B").unwrap().unwrap().len(), 130);
}
