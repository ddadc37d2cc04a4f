//! Indicator augmentation stage.
//!
//! Fills the catalog columns of freshly fetched rows. Each indicator runs
//! independently: one failing leaves its column empty and is reported, the
//! rest proceed. Raw OHLCV is never touched.

use super::{catalog, Indicator, IndicatorError};
use crate::domain::{round_dp, IndicatorColumn, PriceRow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Series shorter than this get no indicators and are flagged low quality.
    pub min_rows: usize,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self { min_rows: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Ok,
    LowQuality { rows: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFailure {
    pub column: IndicatorColumn,
    pub error: IndicatorError,
}

#[derive(Debug, Clone)]
pub struct Augmented {
    pub rows: Vec<PriceRow>,
    pub quality: Quality,
    pub failures: Vec<IndicatorFailure>,
}

impl Augmented {
    pub fn is_low_quality(&self) -> bool {
        matches!(self.quality, Quality::LowQuality { .. })
    }
}

pub struct Augmenter {
    indicators: Vec<Box<dyn Indicator>>,
    config: AugmentConfig,
}

impl Augmenter {
    /// Augmenter over the full catalog.
    pub fn new(config: AugmentConfig) -> Self {
        Self::with_indicators(catalog(), config)
    }

    pub fn with_indicators(indicators: Vec<Box<dyn Indicator>>, config: AugmentConfig) -> Self {
        Self { indicators, config }
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// Augment a self-contained series.
    pub fn augment(&self, rows: Vec<PriceRow>) -> Augmented {
        self.augment_with_history(&[], rows)
    }

    /// Augment `incoming` using `history` for lookback.
    ///
    /// Only history rows dated before the first incoming row are used; only
    /// the incoming rows are returned.
    pub fn augment_with_history(&self, history: &[PriceRow], mut incoming: Vec<PriceRow>) -> Augmented {
        let Some(first) = incoming.first().map(|r| r.date) else {
            return Augmented {
                rows: incoming,
                quality: Quality::Ok,
                failures: Vec::new(),
            };
        };
        let history = &history[..history.partition_point(|r| r.date < first)];
        let total = history.len() + incoming.len();

        if total < self.config.min_rows {
            debug!(rows = total, min_rows = self.config.min_rows, "series too short for indicators");
            return Augmented {
                rows: incoming,
                quality: Quality::LowQuality { rows: total },
                failures: Vec::new(),
            };
        }

        let series: Vec<PriceRow> = history.iter().chain(incoming.iter()).cloned().collect();
        let offset = history.len();
        let mut failures = Vec::new();

        for indicator in &self.indicators {
            let column = indicator.column();
            let values = match indicator.compute(&series) {
                Ok(v) if v.len() == series.len() => v,
                Ok(v) => {
                    let error = IndicatorError::LengthMismatch {
                        column,
                        expected: series.len(),
                        actual: v.len(),
                    };
                    warn!(%column, error = %error, "indicator skipped");
                    failures.push(IndicatorFailure { column, error });
                    continue;
                }
                Err(error) => {
                    warn!(%column, error = %error, "indicator skipped");
                    failures.push(IndicatorFailure { column, error });
                    continue;
                }
            };

            // Rows inside the warmup stay empty even if the series is finite there.
            let warmup = indicator.lookback();
            for (i, (row, &value)) in incoming.iter_mut().zip(&values[offset..]).enumerate() {
                let value = (offset + i >= warmup && value.is_finite())
                    .then(|| round_dp(value, column.precision()));
                row.indicators.set(column, value);
            }
        }

        Augmented {
            rows: incoming,
            quality: Quality::Ok,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_rows, Sma};

    fn closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.21).sin() * 3.0).collect()
    }

    struct Broken;

    impl Indicator for Broken {
        fn column(&self) -> IndicatorColumn {
            IndicatorColumn::Rsi6
        }
        fn lookback(&self) -> usize {
            0
        }
        fn compute(&self, _rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
            Err(IndicatorError::InvalidInput {
                column: IndicatorColumn::Rsi6,
                reason: "boom".into(),
            })
        }
    }

    struct Short;

    impl Indicator for Short {
        fn column(&self) -> IndicatorColumn {
            IndicatorColumn::Obv
        }
        fn lookback(&self) -> usize {
            0
        }
        fn compute(&self, _rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
            Ok(vec![1.0])
        }
    }

    #[test]
    fn full_catalog_fills_late_rows() {
        let aug = Augmenter::new(AugmentConfig::default());
        let out = aug.augment(make_rows(&closes(150)));
        assert_eq!(out.quality, Quality::Ok);
        assert!(out.failures.is_empty());
        let last = out.rows.last().unwrap();
        for (column, value) in last.indicators.iter() {
            assert!(value.is_some(), "{column} missing on last row");
        }
        assert_eq!(out.rows[0].indicators.get(IndicatorColumn::Sma5), None);
        assert_eq!(out.rows[0].indicators.get(IndicatorColumn::Obv), Some(0.0));
    }

    #[test]
    fn values_are_rounded_to_column_precision() {
        let aug = Augmenter::new(AugmentConfig::default());
        let out = aug.augment(make_rows(&closes(120)));
        let v = out.rows[119].indicators.get(IndicatorColumn::Ema20).unwrap();
        assert_eq!(v, round_dp(v, 2));
    }

    #[test]
    fn failing_indicator_is_isolated() {
        let aug = Augmenter::with_indicators(
            vec![
                Box::new(Broken),
                Box::new(Short),
                Box::new(Sma::new(IndicatorColumn::Sma5, 5)),
            ],
            AugmentConfig { min_rows: 10 },
        );
        let rows = make_rows(&closes(20));
        let out = aug.augment(rows.clone());

        assert_eq!(out.failures.len(), 2);
        assert_eq!(out.failures[0].column, IndicatorColumn::Rsi6);
        assert!(matches!(
            out.failures[1].error,
            IndicatorError::LengthMismatch { expected: 20, actual: 1, .. }
        ));
        assert!(out.rows.iter().all(|r| r.indicators.get(IndicatorColumn::Rsi6).is_none()));
        assert!(out.rows[19].indicators.get(IndicatorColumn::Sma5).is_some());
        for (a, b) in out.rows.iter().zip(&rows) {
            assert_eq!((a.open, a.high, a.low, a.close, a.volume), (b.open, b.high, b.low, b.close, b.volume));
        }
    }

    #[test]
    fn short_series_is_low_quality_and_untouched() {
        let aug = Augmenter::new(AugmentConfig::default());
        let rows = make_rows(&closes(99));
        let out = aug.augment(rows.clone());
        assert_eq!(out.quality, Quality::LowQuality { rows: 99 });
        assert_eq!(out.rows, rows);
    }

    #[test]
    fn history_supplies_lookback_for_incremental_rows() {
        let all = make_rows(&closes(130));
        let aug = Augmenter::new(AugmentConfig::default());
        let full = aug.augment(all.clone());

        // Only the last 3 rows are new; history overlaps the first incoming day
        // and must be cut there.
        let out = aug.augment_with_history(&all[..128], all[127..].to_vec());

        assert_eq!(out.quality, Quality::Ok);
        assert_eq!(out.rows.len(), 3);
        for (inc, reference) in out.rows.iter().zip(&full.rows[127..]) {
            assert_eq!(inc.indicators, reference.indicators);
        }
    }

    /// Finite everywhere, but claims a warmup of three rows.
    struct Eager;

    impl Indicator for Eager {
        fn column(&self) -> IndicatorColumn {
            IndicatorColumn::Sma5
        }
        fn lookback(&self) -> usize {
            3
        }
        fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
            Ok(vec![1.0; rows.len()])
        }
    }

    #[test]
    fn warmup_rows_stay_empty() {
        let config = AugmentConfig { min_rows: 1 };
        let augmenter = Augmenter::with_indicators(vec![Box::new(Eager)], config);
        let rows = make_rows(&closes(6));

        let out = augmenter.augment(rows.clone());
        let filled: Vec<bool> = out
            .rows
            .iter()
            .map(|r| r.indicators.get(IndicatorColumn::Sma5).is_some())
            .collect();
        assert_eq!(filled, vec![false, false, false, true, true, true]);

        // With enough history every incoming row is past the warmup.
        let out = augmenter.augment_with_history(&rows[..4], rows[4..].to_vec());
        assert!(out
            .rows
            .iter()
            .all(|r| r.indicators.get(IndicatorColumn::Sma5).is_some()));
    }

    #[test]
    fn empty_incoming_is_a_no_op() {
        let aug = Augmenter::new(AugmentConfig::default());
        let out = aug.augment(Vec::new());
        assert!(out.rows.is_empty());
        assert_eq!(out.quality, Quality::Ok);
    }
}
