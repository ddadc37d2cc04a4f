//! Technical indicators and the augmentation stage.
//!
//! Every catalog column is produced by one `Indicator` instance. Indicators
//! are pure functions over a row series: rows in, one value per row out,
//! `f64::NAN` during warmup. Multi-output indicators (MACD, Bollinger) are
//! exposed as one instance per output line, keeping the trait single-series.

pub mod atr;
pub mod augment;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use augment::{AugmentConfig, Augmented, Augmenter, IndicatorFailure, Quality};
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use macd::{Macd, MacdLine};
pub use obv::Obv;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::{IndicatorColumn, PriceRow};
use thiserror::Error;

/// Failure of a single indicator. Scoped to its column; never fatal to a symbol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("{column}: invalid input: {reason}")]
    InvalidInput {
        column: IndicatorColumn,
        reason: String,
    },

    #[error("{column}: produced {actual} values for {expected} rows")]
    LengthMismatch {
        column: IndicatorColumn,
        expected: usize,
        actual: usize,
    },
}

/// Trait for indicators.
///
/// # Look-ahead guard
/// No value at row t may depend on rows after t: computing over a truncated
/// series must give the same prefix as computing over the full one.
pub trait Indicator: Send + Sync {
    /// The dataset column this indicator fills.
    fn column(&self) -> IndicatorColumn;

    /// Rows needed before the first valid output.
    fn lookback(&self) -> usize;

    /// One value per input row; `NaN` where undefined.
    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError>;
}

/// Close prices, rejecting non-finite values.
pub(crate) fn closes(rows: &[PriceRow], column: IndicatorColumn) -> Result<Vec<f64>, IndicatorError> {
    rows.iter()
        .map(|r| {
            if r.close.is_finite() {
                Ok(r.close)
            } else {
                Err(IndicatorError::InvalidInput {
                    column,
                    reason: format!("non-finite close on {}", r.date),
                })
            }
        })
        .collect()
}

/// The full indicator catalog, one instance per column, in column order.
pub fn catalog() -> Vec<Box<dyn Indicator>> {
    use IndicatorColumn as C;
    let mut out: Vec<Box<dyn Indicator>> = vec![
        Box::new(Macd::new(MacdLine::Macd)),
        Box::new(Macd::new(MacdLine::Signal)),
        Box::new(Macd::new(MacdLine::Histogram)),
    ];
    for (column, period) in [(C::Ema5, 5), (C::Ema10, 10), (C::Ema20, 20), (C::Ema30, 30), (C::Ema60, 60)] {
        out.push(Box::new(Ema::new(column, period)));
    }
    for (column, period) in [(C::Sma5, 5), (C::Sma10, 10), (C::Sma20, 20), (C::Sma30, 30), (C::Sma60, 60)] {
        out.push(Box::new(Sma::new(column, period)));
    }
    for (column, period) in [(C::Rsi6, 6), (C::Rsi12, 12), (C::Rsi24, 24)] {
        out.push(Box::new(Rsi::new(column, period)));
    }
    out.push(Box::new(Bollinger::new(BollingerBand::Middle, 20, 2.0)));
    out.push(Box::new(Bollinger::new(BollingerBand::Upper, 20, 2.0)));
    out.push(Box::new(Bollinger::new(BollingerBand::Lower, 20, 2.0)));
    out.push(Box::new(Atr::new(C::Atr14, 14)));
    out.push(Box::new(Obv));
    out
}

/// Synthetic rows from close prices for testing.
///
/// open = prev close (or close for the first row), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_rows(closes: &[f64]) -> Vec<PriceRow> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceRow::new(
                "TEST",
                base_date + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_column_once_in_order() {
        let columns: Vec<IndicatorColumn> = catalog().iter().map(|i| i.column()).collect();
        assert_eq!(columns, IndicatorColumn::ALL.to_vec());
    }

    #[test]
    fn catalog_has_no_lookahead() {
        let closes: Vec<f64> = (0..150)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 5.0 + i as f64 * 0.1)
            .collect();
        let full = make_rows(&closes);
        let truncated = &full[..120];
        for indicator in catalog() {
            let a = indicator.compute(&full).unwrap();
            let b = indicator.compute(truncated).unwrap();
            for i in 0..truncated.len() {
                if b[i].is_nan() {
                    assert!(a[i].is_nan(), "{} differs at {i}", indicator.column());
                } else {
                    assert_approx(a[i], b[i], 1e-9);
                }
            }
        }
    }

    #[test]
    fn first_value_lands_at_lookback() {
        let closes: Vec<f64> = (0..150)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 5.0)
            .collect();
        let rows = make_rows(&closes);
        for indicator in catalog() {
            let out = indicator.compute(&rows).unwrap();
            let first = out.iter().position(|v| !v.is_nan());
            assert_eq!(first, Some(indicator.lookback()), "{}", indicator.column());
        }
    }

    #[test]
    fn catalog_outputs_match_input_length() {
        let rows = make_rows(&[10.0; 30]);
        for indicator in catalog() {
            assert_eq!(indicator.compute(&rows).unwrap().len(), 30);
        }
    }

    #[test]
    fn non_finite_close_is_invalid_input() {
        let mut rows = make_rows(&[10.0, 11.0, 12.0]);
        rows[1].close = f64::NAN;
        let err = closes(&rows, IndicatorColumn::Sma5).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidInput { .. }));
    }
}
