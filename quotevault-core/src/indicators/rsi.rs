//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0; flat → 50.

use super::{closes, Indicator, IndicatorError};
use crate::domain::{IndicatorColumn, PriceRow};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    column: IndicatorColumn,
}

impl Rsi {
    pub fn new(column: IndicatorColumn, period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self { period, column }
    }
}

impl Indicator for Rsi {
    fn column(&self) -> IndicatorColumn {
        self.column
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
        let closes = closes(rows, self.column)?;
        let n = closes.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return Ok(result);
        }

        // Seed: plain average of the first `period` changes
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=self.period {
            let ch = closes[i] - closes[i - 1];
            if ch > 0.0 {
                avg_gain += ch;
            } else {
                avg_loss -= ch;
            }
        }
        avg_gain /= self.period as f64;
        avg_loss /= self.period as f64;
        result[self.period] = compute_rsi(avg_gain, avg_loss);

        let alpha = 1.0 / self.period as f64;
        for i in (self.period + 1)..n {
            let ch = closes[i] - closes[i - 1];
            avg_gain = alpha * ch.max(0.0) + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * (-ch).max(0.0) + (1.0 - alpha) * avg_loss;
            result[i] = compute_rsi(avg_gain, avg_loss);
        }

        Ok(result)
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
