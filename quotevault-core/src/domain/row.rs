//! PriceRow and SymbolDataset: the persisted market data units.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::columns::IndicatorSet;

/// Round to `dp` decimal places, half away from zero.
pub fn round_dp(value: f64, dp: usize) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}

/// One trading day for one symbol.
///
/// Raw OHLC is stored at 2 decimal places. The date is the exchange-local
/// calendar day; no time component survives normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(default)]
    pub indicators: IndicatorSet,
    #[serde(default)]
    pub dividend: Option<f64>,
    #[serde(default)]
    pub split_ratio: Option<f64>,
}

impl PriceRow {
    /// Raw row with no indicators or events.
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
            indicators: IndicatorSet::default(),
            dividend: None,
            split_ratio: None,
        }
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Merge a fresher copy of the same (symbol, date) into this row.
    ///
    /// Raw OHLCV always comes from `incoming`. Indicator and event values are
    /// only replaced where `incoming` carries one. Returns the number of
    /// indicator values kept from `self`.
    pub fn absorb(&mut self, incoming: &PriceRow) -> usize {
        debug_assert_eq!(self.date, incoming.date);
        self.open = incoming.open;
        self.high = incoming.high;
        self.low = incoming.low;
        self.close = incoming.close;
        self.volume = incoming.volume;
        if incoming.dividend.is_some() {
            self.dividend = incoming.dividend;
        }
        if incoming.split_ratio.is_some() {
            self.split_ratio = incoming.split_ratio;
        }
        self.indicators.overlay(&incoming.indicators)
    }
}

/// All persisted rows for one symbol, ascending by date with unique dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDataset {
    pub symbol: String,
    pub rows: Vec<PriceRow>,
}

impl SymbolDataset {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            rows: Vec::new(),
        }
    }

    /// Build from arbitrary rows: sorted by date, later duplicates win.
    pub fn from_rows(symbol: impl Into<String>, mut rows: Vec<PriceRow>) -> Self {
        // Stable sort keeps input order within a date, so the last copy is the freshest.
        rows.sort_by_key(|r| r.date);
        let mut deduped: Vec<PriceRow> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(last) if last.date == row.date => *last = row,
                _ => deduped.push(row),
            }
        }
        Self {
            symbol: symbol.into(),
            rows: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    /// Strictly ascending dates and every row carries this dataset's symbol.
    pub fn is_canonical(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].date < w[1].date)
            && self.rows.iter().all(|r| r.symbol == self.symbol)
    }

    /// BLAKE3 digest over the serialized rows, hex-encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        for row in &self.rows {
            hasher.update(row.date.to_string().as_bytes());
            for v in [row.open, row.high, row.low, row.close] {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(&row.volume.to_le_bytes());
            for (_, value) in row.indicators.iter() {
                match value {
                    Some(v) => hasher.update(&v.to_le_bytes()),
                    None => hasher.update(b"-"),
                };
            }
            for event in [row.dividend, row.split_ratio] {
                match event {
                    Some(v) => hasher.update(&v.to_le_bytes()),
                    None => hasher.update(b"-"),
                };
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
