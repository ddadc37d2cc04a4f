//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! Lookback: period (TR[0] has no previous close and is excluded from the seed).

use super::{Indicator, IndicatorError};
use crate::domain::{IndicatorColumn, PriceRow};

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    column: IndicatorColumn,
}

impl Atr {
    pub fn new(column: IndicatorColumn, period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period, column }
    }
}

/// True Range series. TR[0] = high[0] - low[0].
pub fn true_range(rows: &[PriceRow]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let hl = row.high - row.low;
        if i == 0 {
            tr.push(hl);
            continue;
        }
        let pc = rows[i - 1].close;
        tr.push(hl.max((row.high - pc).abs()).max((row.low - pc).abs()));
    }
    tr
}

/// Wilder smoothing from `start`: seed = mean of `values[start..start+period]`.
pub fn wilder_smooth(values: &[f64], start: usize, period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let seed_end = start + period;
    if period == 0 || seed_end > n {
        return result;
    }

    let seed = values[start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

impl Indicator for Atr {
    fn column(&self) -> IndicatorColumn {
        self.column
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
        if let Some(bad) = rows
            .iter()
            .find(|r| !(r.high.is_finite() && r.low.is_finite() && r.close.is_finite()))
        {
            return Err(IndicatorError::InvalidInput {
                column: self.column,
                reason: format!("non-finite price on {}", bad.date),
            });
        }
        Ok(wilder_smooth(&true_range(rows), 1, self.period))
    }
}
