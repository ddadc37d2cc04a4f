//! Yahoo Finance quote provider.
//!
//! Talks to the v8 chart API with a blocking client. Each call is a single
//! request: retry and pacing are the fetch client's job. The circuit breaker
//! is consulted before every request and fed with every 403/429/5xx.
//!
//! Yahoo has no official API and is subject to unannounced format changes;
//! parse failures surface as transient errors so they get retried and logged.

use super::circuit_breaker::CircuitBreaker;
use super::normalize::exchange_date;
use super::provider::{
    CorporateEvent, EventKind, FetchError, ProviderSeries, QuoteProvider, RawBar,
};
use crate::domain::Interval;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
    events: Option<ChartEvents>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

/// Yahoo Finance provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            circuit_breaker,
        })
    }

    fn chart_url(
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
        events: bool,
    ) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive; run to the end of the last requested day.
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + 86_399;
        let mut url = format!(
            "{BASE_URL}/{symbol}?period1={start_ts}&period2={end_ts}&interval={interval}"
        );
        if events {
            url.push_str("&events=div%2Csplits");
        }
        url
    }

    /// One GET with circuit-breaker bookkeeping and status mapping.
    fn request(&self, symbol: &str, url: &str) -> Result<ChartResponse, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(FetchError::RateLimited {
                retry_after: Some(self.circuit_breaker.remaining_cooldown()),
            });
        }

        debug!(symbol, url, "GET chart");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transient(format!("request failed for {symbol}: {e}")))?;

        let status = resp.status();
        match status {
            StatusCode::FORBIDDEN => {
                self.circuit_breaker.trip();
                return Err(FetchError::RateLimited {
                    retry_after: Some(self.circuit_breaker.remaining_cooldown()),
                });
            }
            StatusCode::TOO_MANY_REQUESTS => {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Err(FetchError::RateLimited { retry_after });
            }
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                return Err(FetchError::NotFound {
                    symbol: symbol.to_string(),
                });
            }
            s if s.is_server_error() => {
                self.circuit_breaker.record_failure();
                return Err(FetchError::Transient(format!("HTTP {s} for {symbol}")));
            }
            s if !s.is_success() => {
                return Err(FetchError::Transient(format!("HTTP {s} for {symbol}")));
            }
            _ => {}
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            FetchError::Transient(format!("failed to parse response for {symbol}: {e}"))
        })?;
        self.circuit_breaker.record_success();
        Ok(chart)
    }
}

fn first_result(symbol: &str, resp: ChartResponse) -> Result<Option<ChartData>, FetchError> {
    match (resp.chart.result, resp.chart.error) {
        (Some(results), _) => Ok(results.into_iter().next()),
        (None, Some(err)) if err.code == "Not Found" => Err(FetchError::NotFound {
            symbol: symbol.to_string(),
        }),
        (None, Some(err)) => Err(FetchError::Transient(format!(
            "{}: {}",
            err.code, err.description
        ))),
        (None, None) => Err(FetchError::Transient(
            "empty result with no error".into(),
        )),
    }
}

/// Chart response → raw bars. A result with no timestamps is an empty series.
fn parse_series(symbol: &str, resp: ChartResponse) -> Result<ProviderSeries, FetchError> {
    let Some(data) = first_result(symbol, resp)? else {
        return Ok(ProviderSeries::empty(symbol));
    };
    let gmt_offset_secs = data.meta.gmtoffset;
    let Some(timestamps) = data.timestamp else {
        return Ok(ProviderSeries {
            symbol: symbol.to_string(),
            bars: Vec::new(),
            gmt_offset_secs,
        });
    };

    let quote = data
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .ok_or_else(|| FetchError::Transient(format!("no quote data for {symbol}")))?;

    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();
    let bars = timestamps
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| RawBar {
            timestamp,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close: at(&quote.close, i),
            volume: quote.volume.get(i).copied().flatten(),
        })
        .collect();

    Ok(ProviderSeries {
        symbol: symbol.to_string(),
        bars,
        gmt_offset_secs,
    })
}

fn parse_events(symbol: &str, resp: ChartResponse) -> Result<Vec<CorporateEvent>, FetchError> {
    let Some(data) = first_result(symbol, resp)? else {
        return Ok(Vec::new());
    };
    let offset = data.meta.gmtoffset;
    let events = data.events.unwrap_or_default();

    let dividends = events.dividends.values().filter_map(|d| {
        Some(CorporateEvent {
            date: exchange_date(d.date, offset)?,
            kind: EventKind::Dividend(d.amount),
        })
    });
    let splits = events.splits.values().filter_map(|s| {
        if s.denominator == 0.0 {
            return None;
        }
        Some(CorporateEvent {
            date: exchange_date(s.date, offset)?,
            kind: EventKind::Split(s.numerator / s.denominator),
        })
    });

    let mut out: Vec<CorporateEvent> = dividends.chain(splits).collect();
    out.sort_by_key(|e| e.date);
    Ok(out)
}

impl QuoteProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<ProviderSeries, FetchError> {
        let url = Self::chart_url(symbol, start, end, interval, false);
        parse_series(symbol, self.request(symbol, &url)?)
    }

    fn fetch_events(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CorporateEvent>, FetchError> {
        let url = Self::chart_url(symbol, start, end, Interval::Daily, true);
        parse_events(symbol, self.request(symbol, &url)?)
    }

    fn cooldown_remaining(&self) -> Duration {
        self.circuit_breaker.remaining_cooldown()
    }
}
