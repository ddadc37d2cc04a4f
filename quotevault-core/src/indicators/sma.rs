//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

use super::{closes, Indicator, IndicatorError};
use crate::domain::{IndicatorColumn, PriceRow};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    column: IndicatorColumn,
}

impl Sma {
    pub fn new(column: IndicatorColumn, period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period, column }
    }
}

impl Indicator for Sma {
    fn column(&self) -> IndicatorColumn {
        self.column
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
        Ok(sma_of_series(&closes(rows, self.column)?, self.period))
    }
}

/// Rolling mean over finite values.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = sum / period as f64;
    for i in period..n {
        sum += values[i] - values[i - period];
        result[i] = sum / period as f64;
    }
    result
}
