//! Quote provider trait and structured fetch errors.
//!
//! The QuoteProvider trait abstracts over the upstream source so the fetch
//! client, the scheduler and the tests can swap a mock in for Yahoo.

use crate::domain::Interval;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One provider bar before normalization. Any field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    /// Seconds since the Unix epoch (UTC).
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl RawBar {
    /// True when the provider sent no prices at all (holidays, halted days).
    pub fn is_void(&self) -> bool {
        self.open.is_none() && self.high.is_none() && self.low.is_none() && self.close.is_none()
    }
}

/// Price history as returned by one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSeries {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    /// Exchange offset from GMT, used to recover the local trading date.
    pub gmt_offset_secs: i32,
}

impl ProviderSeries {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bars: Vec::new(),
            gmt_offset_secs: 0,
        }
    }
}

/// Dividend or split reported for a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Dividend(f64),
    /// New shares per old share (2-for-1 is 2.0).
    Split(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorporateEvent {
    pub date: NaiveDate,
    pub kind: EventKind,
}

/// Coarse error class, used by the retry policy to pick what to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    NotFound,
    Transient,
}

/// Why a provider call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("rate limited by provider{}", fmt_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    #[error("transient provider error: {0}")]
    Transient(String),
}

fn fmt_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::RateLimited { .. } => ErrorKind::RateLimited,
            FetchError::NotFound { .. } => ErrorKind::NotFound,
            FetchError::Transient(_) => ErrorKind::Transient,
        }
    }

    /// Provider-supplied minimum wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Trait for upstream quote sources.
///
/// Implementations make exactly one request per call. Retrying and pacing
/// live in [`FetchClient`](super::fetch::FetchClient).
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Price history for `symbol` over the inclusive range.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<ProviderSeries, FetchError>;

    /// Dividends and splits over the inclusive range.
    fn fetch_events(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<CorporateEvent>, FetchError> {
        Ok(Vec::new())
    }

    /// How long the provider refuses requests for (circuit breaker open).
    fn cooldown_remaining(&self) -> Duration {
        Duration::ZERO
    }
}
