//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: SMA(close, period) → `boll`
//! - Upper: middle + mult * stddev(close, period) → `boll_ub`
//! - Lower: middle - mult * stddev(close, period) → `boll_lb`
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use super::{closes, Indicator, IndicatorError};
use crate::domain::{IndicatorColumn, PriceRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
}

impl Bollinger {
    pub fn new(band: BollingerBand, period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            band,
        }
    }
}

impl Indicator for Bollinger {
    fn column(&self) -> IndicatorColumn {
        match self.band {
            BollingerBand::Middle => IndicatorColumn::Boll,
            BollingerBand::Upper => IndicatorColumn::BollUpper,
            BollingerBand::Lower => IndicatorColumn::BollLower,
        }
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
        let closes = closes(rows, self.column())?;
        let n = closes.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return Ok(result);
        }

        for i in (self.period - 1)..n {
            let window = &closes[i + 1 - self.period..=i];
            let mean = window.iter().sum::<f64>() / self.period as f64;
            result[i] = match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper | BollingerBand::Lower => {
                    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>()
                        / self.period as f64;
                    let width = self.multiplier * variance.sqrt();
                    if self.band == BollingerBand::Upper {
                        mean + width
                    } else {
                        mean - width
                    }
                }
            };
        }

        Ok(result)
    }
}
