//! CSV dataset codec.
//!
//! Header: `date,tic,open,high,low,close,volume,<indicator columns>,dividend,split_ratio`.
//! Empty cells are nulls. Indicator columns are located by name on read, so
//! files with a subset of the catalog (or extra columns) still load. An empty
//! volume cell reads as 0 and is logged.

use super::StorageError;
use crate::domain::{IndicatorColumn, IndicatorSet, PriceRow, SymbolDataset};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{Read, Write};
use tracing::warn;

const RAW_COLUMNS: [&str; 7] = ["date", "tic", "open", "high", "low", "close", "volume"];

pub fn header() -> Vec<&'static str> {
    let mut cols: Vec<&'static str> = RAW_COLUMNS.to_vec();
    cols.extend(IndicatorColumn::ALL.iter().map(|c| c.name()));
    cols.push("dividend");
    cols.push("split_ratio");
    cols
}

fn fmt_opt(value: Option<f64>, dp: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.dp$}"),
        _ => String::new(),
    }
}

pub fn write_csv<W: Write>(dataset: &SymbolDataset, out: W) -> Result<(), StorageError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(header())?;

    for row in &dataset.rows {
        let mut record: Vec<String> = Vec::with_capacity(RAW_COLUMNS.len() + IndicatorColumn::COUNT + 2);
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.push(row.symbol.clone());
        for price in [row.open, row.high, row.low, row.close] {
            record.push(format!("{price:.2}"));
        }
        record.push(row.volume.to_string());
        for (column, value) in row.indicators.iter() {
            record.push(fmt_opt(value, column.precision()));
        }
        // Dividends can carry sub-cent amounts.
        record.push(fmt_opt(row.dividend, 4));
        record.push(fmt_opt(row.split_ratio, 4));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn parse_f64(cell: &str, what: &str, line: usize) -> Result<f64, StorageError> {
    cell.trim()
        .parse::<f64>()
        .map_err(|e| StorageError::Corrupt(format!("line {line}: bad {what} '{cell}': {e}")))
}

fn parse_opt(cell: Option<&str>, what: &str, line: usize) -> Result<Option<f64>, StorageError> {
    match cell.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("nan") => Ok(None),
        Some(s) => parse_f64(s, what, line).map(Some),
    }
}

/// `None` for an empty cell.
fn parse_volume(cell: &str, line: usize) -> Result<Option<u64>, StorageError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = cell.parse::<u64>() {
        return Ok(Some(v));
    }
    // Some writers emit volume as a float ("1200.0").
    let v = parse_f64(cell, "volume", line)?;
    if v < 0.0 || !v.is_finite() {
        return Err(StorageError::Corrupt(format!("line {line}: bad volume '{cell}'")));
    }
    Ok(Some(v.round() as u64))
}

/// Read a dataset for `symbol`. Rows are returned in canonical order.
pub fn read_csv<R: Read>(symbol: &str, input: R) -> Result<SymbolDataset, StorageError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();
    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h.trim(), i)).collect();

    let required = |name: &str| {
        index
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::Corrupt(format!("missing column '{name}'")))
    };
    let date_i = required("date")?;
    let open_i = required("open")?;
    let high_i = required("high")?;
    let low_i = required("low")?;
    let close_i = required("close")?;
    let volume_i = required("volume")?;
    let tic_i = index.get("tic").copied();
    let dividend_i = index.get("dividend").copied();
    let split_i = index.get("split_ratio").copied();
    let indicator_cols: Vec<(IndicatorColumn, usize)> = IndicatorColumn::ALL
        .iter()
        .filter_map(|c| index.get(c.name()).map(|&i| (*c, i)))
        .collect();

    let mut rows = Vec::new();
    let mut volume_missing = 0usize;
    for (n, record) in reader.records().enumerate() {
        let record = record?;
        let line = n + 2;
        let cell = |i: usize| record.get(i).unwrap_or("");

        // Tolerate datetime stamps like "2024-01-10 00:00:00".
        let date_cell = cell(date_i).trim();
        let date_str = date_cell.get(..10).unwrap_or(date_cell);
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|e| StorageError::Corrupt(format!("line {line}: bad date '{date_cell}': {e}")))?;

        let row_symbol = tic_i
            .map(|i| cell(i).trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(symbol);

        let mut indicators = IndicatorSet::new();
        for &(column, i) in &indicator_cols {
            indicators.set(column, parse_opt(record.get(i), column.name(), line)?);
        }
        let volume = parse_volume(cell(volume_i), line)?.unwrap_or_else(|| {
            volume_missing += 1;
            0
        });

        rows.push(PriceRow {
            date,
            symbol: row_symbol.to_string(),
            open: parse_f64(cell(open_i), "open", line)?,
            high: parse_f64(cell(high_i), "high", line)?,
            low: parse_f64(cell(low_i), "low", line)?,
            close: parse_f64(cell(close_i), "close", line)?,
            volume,
            indicators,
            dividend: parse_opt(dividend_i.and_then(|i| record.get(i)), "dividend", line)?,
            split_ratio: parse_opt(split_i.and_then(|i| record.get(i)), "split_ratio", line)?,
        });
    }

    if volume_missing > 0 {
        warn!(symbol, rows = volume_missing, "empty volume cells read as 0");
    }
    Ok(SymbolDataset::from_rows(symbol, rows))
}
