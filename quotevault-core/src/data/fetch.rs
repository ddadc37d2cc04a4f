//! Rate-limited fetch client.
//!
//! Wraps a [`QuoteProvider`] with the retry policy and call pacing. A symbol
//! fetch is two upstream calls: price history, then corporate events. The
//! pacing delay between them is applied whatever happened to the first call's
//! retries.

use super::normalize::{normalize, NormalizeReport};
use super::pacing::Sleeper;
use super::provider::{CorporateEvent, EventKind, FetchError, QuoteProvider};
use super::retry::RetryPolicy;
use crate::domain::{FetchWindow, Interval, PriceRow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub retry: RetryPolicy,
    /// Pause between the history call and the events call.
    pub call_delay_ms: u64,
    pub include_events: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_delay_ms: 500,
            include_events: true,
        }
    }
}

impl FetchConfig {
    pub fn call_delay(&self) -> Duration {
        Duration::from_millis(self.call_delay_ms)
    }
}

/// Rows for one symbol's window, normalized and annotated with events.
#[derive(Debug, Clone)]
pub struct FetchedSeries {
    pub window: FetchWindow,
    pub rows: Vec<PriceRow>,
    pub report: NormalizeReport,
    /// Events were requested but could not be fetched.
    pub events_missing: bool,
}

pub struct FetchClient<'a> {
    provider: &'a dyn QuoteProvider,
    sleeper: &'a dyn Sleeper,
    config: FetchConfig,
}

impl<'a> FetchClient<'a> {
    pub fn new(provider: &'a dyn QuoteProvider, sleeper: &'a dyn Sleeper, config: FetchConfig) -> Self {
        Self {
            provider,
            sleeper,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch and normalize the rows inside `window`.
    ///
    /// History errors are the symbol's failure. Event errors degrade to "no
    /// events" with a warning.
    pub fn fetch(&self, window: &FetchWindow, interval: Interval) -> Result<FetchedSeries, FetchError> {
        let symbol = window.symbol.as_str();
        debug!(provider = self.provider.name(), %window, %interval, "fetching history");

        let series = self.config.retry.run(self.sleeper, "history", |_| {
            self.provider
                .fetch_ohlcv(symbol, window.start, window.end, interval)
        })?;

        let (mut rows, report) = normalize(&series);
        rows.retain(|r| window.contains(r.date));

        let mut events_missing = false;
        if self.config.include_events {
            self.sleeper.sleep(self.config.call_delay());
            let events = self.config.retry.run(self.sleeper, "events", |_| {
                self.provider.fetch_events(symbol, window.start, window.end)
            });
            match events {
                Ok(events) => apply_events(&mut rows, &events),
                Err(e) => {
                    warn!(symbol, error = %e, "events unavailable, continuing without them");
                    events_missing = true;
                }
            }
        }

        Ok(FetchedSeries {
            window: window.clone(),
            rows,
            report,
            events_missing,
        })
    }
}

/// Attach dividends and splits to the rows of matching dates.
///
/// Events on dates with no row are ignored. Rows are ascending by date.
pub fn apply_events(rows: &mut [PriceRow], events: &[CorporateEvent]) {
    for event in events {
        let Ok(idx) = rows.binary_search_by_key(&event.date, |r| r.date) else {
            debug!(date = %event.date, kind = ?event.kind, "event on a date without a bar");
            continue;
        };
        match event.kind {
            EventKind::Dividend(amount) => rows[idx].dividend = Some(amount),
            EventKind::Split(ratio) => rows[idx].split_ratio = Some(ratio),
        }
    }
}
