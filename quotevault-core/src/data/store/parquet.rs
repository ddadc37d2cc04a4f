//! Parquet dataset codec (polars).
//!
//! Same logical columns as the CSV layout: `date` is a Date column, prices
//! and indicators are nullable Float64, `volume` is UInt64. A null volume
//! reads as 0 and is logged.

use super::StorageError;
use crate::domain::{IndicatorColumn, IndicatorSet, PriceRow, SymbolDataset};
use chrono::NaiveDate;
use polars::prelude::*;
use std::io::Write;
use std::path::Path;
use tracing::warn;

fn polars_err(context: &str) -> impl Fn(PolarsError) -> StorageError + '_ {
    move |e| StorageError::Parquet(format!("{context}: {e}"))
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Dataset → DataFrame.
pub fn to_dataframe(dataset: &SymbolDataset) -> Result<DataFrame, StorageError> {
    let rows = &dataset.rows;
    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.date - epoch()).num_days() as i32)
        .collect();
    let tics: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();

    let mut columns = vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(polars_err("date cast"))?,
        Column::new("tic".into(), tics),
        Column::new("open".into(), rows.iter().map(|r| r.open).collect::<Vec<f64>>()),
        Column::new("high".into(), rows.iter().map(|r| r.high).collect::<Vec<f64>>()),
        Column::new("low".into(), rows.iter().map(|r| r.low).collect::<Vec<f64>>()),
        Column::new("close".into(), rows.iter().map(|r| r.close).collect::<Vec<f64>>()),
        Column::new("volume".into(), rows.iter().map(|r| r.volume).collect::<Vec<u64>>()),
    ];
    for column in IndicatorColumn::ALL {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.indicators.get(column)).collect();
        columns.push(Column::new(column.name().into(), values));
    }
    columns.push(Column::new(
        "dividend".into(),
        rows.iter().map(|r| r.dividend).collect::<Vec<Option<f64>>>(),
    ));
    columns.push(Column::new(
        "split_ratio".into(),
        rows.iter().map(|r| r.split_ratio).collect::<Vec<Option<f64>>>(),
    ));

    DataFrame::new(columns).map_err(polars_err("dataframe creation"))
}

pub fn write_parquet<W: Write>(dataset: &SymbolDataset, out: W) -> Result<(), StorageError> {
    let mut df = to_dataframe(dataset)?;
    ParquetWriter::new(out)
        .finish(&mut df)
        .map_err(polars_err("write parquet"))?;
    Ok(())
}

fn opt_f64(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>, StorageError> {
    match df.column(name) {
        Err(_) => Ok(None),
        Ok(col) => {
            let ca = col.f64().map_err(polars_err(name))?;
            Ok(Some(ca.into_iter().collect()))
        }
    }
}

fn req_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, StorageError> {
    opt_f64(df, name)?.ok_or_else(|| StorageError::Corrupt(format!("missing column '{name}'")))
}

/// DataFrame → dataset. Prices must be non-null.
pub fn from_dataframe(symbol: &str, df: &DataFrame) -> Result<SymbolDataset, StorageError> {
    let dates = df
        .column("date")
        .map_err(|_| StorageError::Corrupt("missing column 'date'".into()))?
        .date()
        .map_err(polars_err("date column type"))?;
    let volume = df
        .column("volume")
        .map_err(|_| StorageError::Corrupt("missing column 'volume'".into()))?
        .u64()
        .map_err(polars_err("volume column type"))?;
    let tics = match df.column("tic") {
        Ok(col) => Some(col.str().map_err(polars_err("tic column type"))?),
        Err(_) => None,
    };
    let open = req_f64(df, "open")?;
    let high = req_f64(df, "high")?;
    let low = req_f64(df, "low")?;
    let close = req_f64(df, "close")?;
    let dividend = opt_f64(df, "dividend")?;
    let split_ratio = opt_f64(df, "split_ratio")?;
    let mut indicator_cols = Vec::new();
    for column in IndicatorColumn::ALL {
        if let Some(values) = opt_f64(df, column.name())? {
            indicator_cols.push((column, values));
        }
    }

    let price = |values: &[Option<f64>], i: usize, what: &str| {
        values[i].ok_or_else(|| StorageError::Corrupt(format!("null {what} at row {i}")))
    };

    let volume_missing = volume.null_count();
    if volume_missing > 0 {
        warn!(symbol, rows = volume_missing, "null volumes read as 0");
    }

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = dates
            .get(i)
            .ok_or_else(|| StorageError::Corrupt(format!("null date at row {i}")))?;
        let mut indicators = IndicatorSet::new();
        for (column, values) in &indicator_cols {
            indicators.set(*column, values[i]);
        }
        rows.push(PriceRow {
            date: epoch() + chrono::Duration::days(i64::from(days)),
            symbol: tics
                .and_then(|t| t.get(i))
                .unwrap_or(symbol)
                .to_string(),
            open: price(&open, i, "open")?,
            high: price(&high, i, "high")?,
            low: price(&low, i, "low")?,
            close: price(&close, i, "close")?,
            volume: volume.get(i).unwrap_or(0),
            indicators,
            dividend: dividend.as_ref().and_then(|v| v[i]),
            split_ratio: split_ratio.as_ref().and_then(|v| v[i]),
        });
    }

    Ok(SymbolDataset::from_rows(symbol, rows))
}

pub fn read_parquet(symbol: &str, path: &Path) -> Result<SymbolDataset, StorageError> {
    let file = std::fs::File::open(path)?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(polars_err("read parquet"))?;
    from_dataframe(symbol, &df)
}
