//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1]
//! Seed: EMA[period-1] = SMA of first `period` close values.
//! Lookback: period - 1.

use super::{closes, Indicator, IndicatorError};
use crate::domain::{IndicatorColumn, PriceRow};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    column: IndicatorColumn,
}

impl Ema {
    pub fn new(column: IndicatorColumn, period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period, column }
    }
}

impl Indicator for Ema {
    fn column(&self) -> IndicatorColumn {
        self.column
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
        Ok(ema_of_series(&closes(rows, self.column)?, self.period))
    }
}

/// EMA of an arbitrary series, SMA-seeded. NaN inputs are skipped until a
/// full seed window of valid values exists, so a series with a NaN warmup
/// (like the MACD line) can be smoothed directly.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    let Some(first) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    let seed_end = first + period;
    if seed_end > n {
        return result;
    }
    let seed_window = &values[first..seed_end];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            // NaN taints everything after it
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }

    result
}
