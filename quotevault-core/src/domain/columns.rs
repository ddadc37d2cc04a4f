//! The closed catalog of derived indicator columns.
//!
//! Every dataset carries exactly these columns after the raw OHLCV fields, in
//! this order. Keeping the set closed lets the merge engine and the storage
//! formats work on a fixed-size array instead of a name → value map.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One derived column of a [`PriceRow`](super::PriceRow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorColumn {
    Macd,
    MacdSignal,
    MacdHist,
    Ema5,
    Ema10,
    Ema20,
    Ema30,
    Ema60,
    Sma5,
    Sma10,
    Sma20,
    Sma30,
    Sma60,
    Rsi6,
    Rsi12,
    Rsi24,
    Boll,
    BollUpper,
    BollLower,
    Atr14,
    Obv,
}

impl IndicatorColumn {
    pub const COUNT: usize = 21;

    /// All columns in on-disk order.
    pub const ALL: [IndicatorColumn; Self::COUNT] = [
        Self::Macd,
        Self::MacdSignal,
        Self::MacdHist,
        Self::Ema5,
        Self::Ema10,
        Self::Ema20,
        Self::Ema30,
        Self::Ema60,
        Self::Sma5,
        Self::Sma10,
        Self::Sma20,
        Self::Sma30,
        Self::Sma60,
        Self::Rsi6,
        Self::Rsi12,
        Self::Rsi24,
        Self::Boll,
        Self::BollUpper,
        Self::BollLower,
        Self::Atr14,
        Self::Obv,
    ];

    /// Column header used in dataset files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Macd => "macd",
            Self::MacdSignal => "macds",
            Self::MacdHist => "macdh",
            Self::Ema5 => "ema_5",
            Self::Ema10 => "ema_10",
            Self::Ema20 => "ema_20",
            Self::Ema30 => "ema_30",
            Self::Ema60 => "ema_60",
            Self::Sma5 => "sma_5",
            Self::Sma10 => "sma_10",
            Self::Sma20 => "sma_20",
            Self::Sma30 => "sma_30",
            Self::Sma60 => "sma_60",
            Self::Rsi6 => "rsi_6",
            Self::Rsi12 => "rsi_12",
            Self::Rsi24 => "rsi_24",
            Self::Boll => "boll",
            Self::BollUpper => "boll_ub",
            Self::BollLower => "boll_lb",
            Self::Atr14 => "atr_14",
            Self::Obv => "obv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Decimal places kept on disk. OBV is a running volume total, so it keeps
    /// integer semantics; everything else is price-derived.
    pub fn precision(self) -> usize {
        match self {
            Self::Obv => 0,
            _ => 2,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for IndicatorColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values for every catalog column of one row. `None` means "not computed".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    values: [Option<f64>; IndicatorColumn::COUNT],
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: IndicatorColumn) -> Option<f64> {
        self.values[column.index()]
    }

    pub fn set(&mut self, column: IndicatorColumn, value: Option<f64>) {
        self.values[column.index()] = value;
    }

    /// Builder-style setter, handy in fixtures.
    pub fn with(mut self, column: IndicatorColumn, value: f64) -> Self {
        self.set(column, Some(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (IndicatorColumn, Option<f64>)> + '_ {
        IndicatorColumn::ALL
            .iter()
            .map(move |&c| (c, self.values[c.index()]))
    }

    /// Number of columns holding a value.
    pub fn present(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present() == 0
    }

    /// Take every value present in `incoming`; keep ours where `incoming` has none.
    ///
    /// Returns how many of our values survived because `incoming` lacked them.
    pub fn overlay(&mut self, incoming: &IndicatorSet) -> usize {
        let mut kept = 0;
        for (ours, theirs) in self.values.iter_mut().zip(incoming.values.iter()) {
            match theirs {
                Some(v) => *ours = Some(*v),
                None if ours.is_some() => kept += 1,
                None => {}
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_roundtrip() {
        let mut seen = std::collections::HashSet::new();
        for column in IndicatorColumn::ALL {
            assert!(seen.insert(column.name()), "duplicate name {column}");
            assert_eq!(IndicatorColumn::from_name(column.name()), Some(column));
        }
        assert_eq!(IndicatorColumn::from_name("vwap"), None);
    }

    #[test]
    fn all_is_in_discriminant_order() {
        for (i, column) in IndicatorColumn::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
        }
    }

    #[test]
    fn obv_has_integer_precision() {
        assert_eq!(IndicatorColumn::Obv.precision(), 0);
        assert_eq!(IndicatorColumn::Ema5.precision(), 2);
    }

    #[test]
    fn overlay_keeps_values_missing_from_incoming() {
        let mut existing = IndicatorSet::new()
            .with(IndicatorColumn::Ema5, 98.5)
            .with(IndicatorColumn::Rsi6, 40.0);
        let incoming = IndicatorSet::new().with(IndicatorColumn::Rsi6, 55.0);

        let kept = existing.overlay(&incoming);

        assert_eq!(kept, 1);
        assert_eq!(existing.get(IndicatorColumn::Ema5), Some(98.5));
        assert_eq!(existing.get(IndicatorColumn::Rsi6), Some(55.0));
        assert_eq!(existing.present(), 2);
    }

    #[test]
    fn overlay_onto_empty_takes_everything() {
        let mut existing = IndicatorSet::new();
        let incoming = IndicatorSet::new().with(IndicatorColumn::Obv, 1200.0);
        assert_eq!(existing.overlay(&incoming), 0);
        assert_eq!(existing, incoming);
    }
}
