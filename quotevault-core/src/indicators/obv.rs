//! On-Balance Volume (OBV).
//!
//! OBV[0] = 0; each later row adds its volume on an up close, subtracts it on
//! a down close, and carries the total on an unchanged close.
//! Lookback: 0.

use super::{closes, Indicator, IndicatorError};
use crate::domain::{IndicatorColumn, PriceRow};

#[derive(Debug, Clone, Copy, Default)]
pub struct Obv;

impl Indicator for Obv {
    fn column(&self) -> IndicatorColumn {
        IndicatorColumn::Obv
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, rows: &[PriceRow]) -> Result<Vec<f64>, IndicatorError> {
        let closes = closes(rows, IndicatorColumn::Obv)?;
        let mut result = Vec::with_capacity(rows.len());
        let mut total: i64 = 0;
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                let volume = i64::try_from(row.volume).map_err(|_| overflow(row))?;
                total = if closes[i] > closes[i - 1] {
                    total.checked_add(volume)
                } else if closes[i] < closes[i - 1] {
                    total.checked_sub(volume)
                } else {
                    Some(total)
                }
                .ok_or_else(|| overflow(row))?;
            }
            result.push(total as f64);
        }
        Ok(result)
    }
}

fn overflow(row: &PriceRow) -> IndicatorError {
    IndicatorError::InvalidInput {
        column: IndicatorColumn::Obv,
        reason: format!("volume overflow on {}", row.date),
    }
}
