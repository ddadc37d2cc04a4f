//! Provider bars → price rows.
//!
//! Converts timestamps to exchange-local dates, drops void and partial bars,
//! rounds prices to cents, sorts and de-duplicates. Of several bars on one
//! date the one with the latest timestamp wins. Zero-volume, volume-less and
//! inverted bars are kept but counted and logged.

use super::provider::{ProviderSeries, RawBar};
use crate::domain::{round_dp, PriceRow};
use chrono::{DateTime, Duration, NaiveDate};
use tracing::{debug, warn};

/// What normalization found in one provider series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub input_bars: usize,
    pub void_dropped: usize,
    pub partial_dropped: usize,
    pub duplicates_removed: usize,
    /// Bars without a volume; stored with volume 0.
    pub volume_missing: usize,
    pub zero_volume: usize,
    pub inverted: usize,
}

impl NormalizeReport {
    pub fn has_anomalies(&self) -> bool {
        self.partial_dropped > 0
            || self.duplicates_removed > 0
            || self.volume_missing > 0
            || self.inverted > 0
    }
}

/// Exchange-local calendar date of a UTC timestamp.
pub fn exchange_date(timestamp: i64, gmt_offset_secs: i32) -> Option<NaiveDate> {
    let utc = DateTime::from_timestamp(timestamp, 0)?;
    let local = utc.naive_utc() + Duration::seconds(i64::from(gmt_offset_secs));
    Some(local.date())
}

fn to_row(symbol: &str, bar: &RawBar, gmt_offset_secs: i32) -> Option<PriceRow> {
    let date = exchange_date(bar.timestamp, gmt_offset_secs)?;
    let (open, high, low, close) = (bar.open?, bar.high?, bar.low?, bar.close?);
    if ![open, high, low, close].iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(PriceRow::new(
        symbol,
        date,
        round_dp(open, 2),
        round_dp(high, 2),
        round_dp(low, 2),
        round_dp(close, 2),
        bar.volume.unwrap_or(0),
    ))
}

/// Normalize a provider series into ascending, unique-dated rows.
pub fn normalize(series: &ProviderSeries) -> (Vec<PriceRow>, NormalizeReport) {
    let mut report = NormalizeReport {
        input_bars: series.bars.len(),
        ..NormalizeReport::default()
    };

    let mut stamped = Vec::with_capacity(series.bars.len());
    for bar in &series.bars {
        if bar.is_void() {
            report.void_dropped += 1;
            continue;
        }
        match to_row(&series.symbol, bar, series.gmt_offset_secs) {
            Some(row) => {
                if bar.volume.is_none() {
                    report.volume_missing += 1;
                }
                stamped.push((bar.timestamp, row));
            }
            None => report.partial_dropped += 1,
        }
    }

    // Latest timestamp last within a date: Yahoo appends the live bar after the close.
    stamped.sort_by_key(|(timestamp, row)| (row.date, *timestamp));
    let before = stamped.len();
    let mut deduped: Vec<PriceRow> = Vec::with_capacity(stamped.len());
    for (_, row) in stamped {
        match deduped.last_mut() {
            Some(last) if last.date == row.date => *last = row,
            _ => deduped.push(row),
        }
    }
    report.duplicates_removed = before - deduped.len();

    for row in &deduped {
        if row.volume == 0 {
            report.zero_volume += 1;
        }
        if !row.is_sane() {
            report.inverted += 1;
            warn!(symbol = %row.symbol, date = %row.date, high = row.high, low = row.low, "insane OHLC bar kept");
        }
    }

    if report.has_anomalies() {
        warn!(symbol = %series.symbol, ?report, "provider data anomalies");
    } else {
        debug!(symbol = %series.symbol, rows = deduped.len(), "normalized");
    }

    (deduped, report)
}
