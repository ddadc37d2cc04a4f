//! MACD (12, 26, 9).
//!
//! Three lines (separate Indicator instances):
//! - MACD: EMA(close, 12) - EMA(close, 26)
//! - Signal: EMA(MACD, 9), seeded once 9 MACD values exist
//! - Histogram: MACD - Signal
//!
//! Lookback: 25 for the MACD line, 33 for signal and histogram.

use super::ema::ema_of_series;
use super::{closes, Indicator, IndicatorError};
use crate::domain::{IndicatorColumn, PriceRow};

pub const FAST: usize = 12;
pub const SLOW: usize = 26;
pub const SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    line: MacdLine,
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(line: MacdLine) -> Self {
        Self::with_periods(line, FAST, SLOW, SIGNAL)
    }

    pub fn with_periods(line: MacdLine, fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && fast < slow, "MACD needs 1 <= fast < slow");
        assert!(signal >= 1, "MACD signal period must be >= 1");
        Self {
            line,
            fast,
            slow,
            signal,
        }
    }
}

/// MACD, signal and histogram series over `closes`.
pub fn macd_lines(closes: &[f64], fast: usize, slow: usize, signal: usize) -> [Vec<f64>; 3] {
    let fast_ema = ema_of_series(closes, fast);
    let slow_ema = ema_of_series(closes, slow);
    let macd: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let sig = ema_of_series(&macd, signal);
    let hist = macd.iter().zip(&sig).map(|(m, s)| m - s).collect();
    [macd, sig, hist]
}

impl Indicator for Macd {
    fn column(&self) -> IndicatorColumn {
        match self.line {
            MacdLine::Macd => IndicatorColumn::Macd,
            MacdLine::Signal => IndicatorColumn::MacdSignal,
            MacdLine::Histogram => IndicatorColumn::MacdHist,
        }
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Macd => self.slow - 1,
            MacdLine::Signal | MacdLine::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
        let closes = closes(rows, self.column())?;
        let [macd, sig, hist] = macd_lines(&closes, self.fast, self.slow, self.signal);
        Ok(match self.line {
            MacdLine::Macd => macd,
            MacdLine::Signal => sig,
            MacdLine::Histogram => hist,
        })
    }
}
