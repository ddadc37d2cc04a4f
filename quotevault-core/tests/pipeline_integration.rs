//! Integration tests for one symbol's trip through fetch → augment → merge → store.

use chrono::NaiveDate;
use quotevault_core::data::{
    merge, DatasetFormat, DatasetStore, FetchClient, FetchConfig, FetchError, FileStore,
    ProviderSeries, QuoteProvider, RawBar, RecordingSleeper, RetryPolicy,
};
use quotevault_core::domain::{
    FetchWindow, IndicatorColumn, Interval, PriceRow, SymbolDataset, WindowPolicy,
};
use quotevault_core::indicators::{AugmentConfig, Augmenter};
use std::sync::Mutex;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Provider serving a fixed close series, one bar per calendar day from `first`.
struct DailyProvider {
    first: NaiveDate,
    closes: Vec<f64>,
    requests: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl QuoteProvider for DailyProvider {
    fn name(&self) -> &str {
        "daily"
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _interval: Interval,
    ) -> Result<ProviderSeries, FetchError> {
        self.requests.lock().unwrap().push((start, end));
        let bars = self
            .closes
            .iter()
            .enumerate()
            .map(|(i, &close)| (self.first + chrono::Duration::days(i as i64), close))
            .filter(|(date, _)| *date >= start && *date <= end)
            .map(|(date, close)| RawBar {
                timestamp: date.and_hms_opt(20, 0, 0).unwrap().and_utc().timestamp(),
                open: Some(close),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
                volume: Some(1_000),
            })
            .collect();
        Ok(ProviderSeries {
            symbol: symbol.to_string(),
            bars,
            gmt_offset_secs: -4 * 3600,
        })
    }
}

fn raw(symbol: &str, date: NaiveDate, close: f64) -> PriceRow {
    PriceRow::new(symbol, date, close, close, close, close, 1_000)
}

#[test]
fn overlap_day_revision_keeps_stored_indicator() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path(), DatasetFormat::Csv);

    let mut stored_rows: Vec<PriceRow> =
        (2..=9).map(|day| raw("TEST", d(2024, 1, day), 99.0)).collect();
    let mut last = raw("TEST", d(2024, 1, 10), 100.00);
    last.indicators.set(IndicatorColumn::Ema5, Some(98.50));
    stored_rows.push(last);
    store.write(&SymbolDataset::from_rows("TEST", stored_rows)).unwrap();

    let existing = store.load("TEST").unwrap();
    let window = FetchWindow::plan(
        "TEST",
        existing.as_ref(),
        &WindowPolicy::default(),
        d(2024, 1, 12),
    );
    assert_eq!(window.start, d(2024, 1, 10));

    let incoming = vec![
        raw("TEST", d(2024, 1, 10), 100.50),
        raw("TEST", d(2024, 1, 11), 101.00),
        raw("TEST", d(2024, 1, 12), 102.00),
    ];
    let merged = merge("TEST", existing, incoming);
    store.write(&merged.dataset).unwrap();

    let reloaded = store.load("TEST").unwrap().unwrap();
    let jan10 = reloaded.rows.iter().find(|r| r.date == d(2024, 1, 10)).unwrap();
    assert_eq!(jan10.close, 100.50);
    assert_eq!(jan10.indicators.get(IndicatorColumn::Ema5), Some(98.50));
    assert_eq!(reloaded.last_date(), Some(d(2024, 1, 12)));
    assert_eq!(reloaded.len(), 11);
}

#[test]
fn incremental_run_matches_full_rebuild() {
    let closes: Vec<f64> = (0..160)
        .map(|i| 50.0 + (i as f64 * 0.17).sin() * 4.0 + i as f64 * 0.05)
        .collect();
    let first = d(2023, 1, 1);
    let provider = DailyProvider {
        first,
        closes,
        requests: Mutex::new(Vec::new()),
    };
    let sleeper = RecordingSleeper::new();
    let config = FetchConfig {
        include_events: false,
        retry: RetryPolicy::none(),
        ..FetchConfig::default()
    };
    let client = FetchClient::new(&provider, &sleeper, config);
    let augmenter = Augmenter::new(AugmentConfig::default());
    let policy = WindowPolicy {
        start: Some(first),
        ..WindowPolicy::default()
    };

    let run = |existing: Option<SymbolDataset>, today: NaiveDate| {
        let window = FetchWindow::plan("TEST", existing.as_ref(), &policy, today);
        let fetched = client.fetch(&window, Interval::Daily).unwrap();
        let history = existing.as_ref().map(|ds| ds.rows.clone()).unwrap_or_default();
        let augmented = augmenter.augment_with_history(&history, fetched.rows);
        merge("TEST", existing, augmented.rows).dataset
    };

    // Two incremental runs vs one run over the whole range.
    let day_120 = first + chrono::Duration::days(119);
    let day_160 = first + chrono::Duration::days(159);
    let partial = run(None, day_120);
    assert_eq!(partial.len(), 120);
    let incremental = run(Some(partial), day_160);
    let full = run(None, day_160);

    assert_eq!(incremental.len(), 160);
    assert_eq!(incremental, full);

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests[1], (day_120, day_160));
    assert!(sleeper.waits().is_empty());
}
