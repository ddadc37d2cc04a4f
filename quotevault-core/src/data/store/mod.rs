//! Per-symbol dataset storage.
//!
//! Layout: `{root}/{SYMBOL}.csv` (or `.parquet`) plus `{root}/{SYMBOL}.meta.json`
//! for daily bars. Weekly and monthly datasets live beside them under
//! `{SYMBOL}_1wk` / `{SYMBOL}_1mo`, so frequencies never share a file.
//!
//! - Atomic writes (write to .tmp, fsync, rename into place)
//! - Metadata sidecar per symbol (date range, row count, blake3 hash)
//! - Corrupt files are quarantined (`{file}.quarantined`) and treated as absent

pub mod atomic;
pub mod csv;
pub mod parquet;

use crate::domain::{Interval, SymbolDataset};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use atomic::write_atomic;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("corrupt dataset: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("refusing to write an empty dataset for {symbol}")]
    Empty { symbol: String },

    #[error("{symbol}: stored dataset holds {stored} bars, requested {requested}")]
    IntervalMismatch {
        symbol: String,
        stored: Interval,
        requested: Interval,
    },
}

impl StorageError {
    /// Errors that mean the file content is unusable (as opposed to the disk).
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StorageError::Csv(_) | StorageError::Parquet(_) | StorageError::Corrupt(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    #[default]
    Csv,
    Parquet,
}

impl DatasetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DatasetFormat::Csv => "csv",
            DatasetFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DatasetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(DatasetFormat::Csv),
            "parquet" => Ok(DatasetFormat::Parquet),
            other => Err(format!("unknown dataset format '{other}' (expected csv or parquet)")),
        }
    }
}

/// Metadata sidecar for a stored symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
    pub format: DatasetFormat,
    /// Sidecars written before intervals were tracked are daily.
    #[serde(default)]
    pub interval: Interval,
    pub updated_at: NaiveDateTime,
}

impl CacheMeta {
    pub fn for_dataset(
        dataset: &SymbolDataset,
        format: DatasetFormat,
        interval: Interval,
    ) -> Option<Self> {
        Some(Self {
            symbol: dataset.symbol.clone(),
            start_date: dataset.first_date()?,
            end_date: dataset.last_date()?,
            row_count: dataset.len(),
            data_hash: dataset.content_hash(),
            format,
            interval,
            updated_at: chrono::Local::now().naive_local(),
        })
    }
}

/// Dataset storage boundary. The scheduler only talks to this trait.
pub trait DatasetStore: Send + Sync {
    /// Load a symbol's dataset. `Ok(None)` when absent or quarantined.
    fn load(&self, symbol: &str) -> Result<Option<SymbolDataset>, StorageError>;

    /// Atomically replace the symbol's dataset.
    fn write(&self, dataset: &SymbolDataset) -> Result<(), StorageError>;

    fn meta(&self, symbol: &str) -> Option<CacheMeta>;

    /// Symbols with a dataset file, sorted.
    fn symbols(&self) -> Result<Vec<String>, StorageError>;

    /// Delete a symbol's dataset and sidecar. Returns whether anything existed.
    fn remove(&self, symbol: &str) -> Result<bool, StorageError>;
}

/// Flat directory of one file per symbol.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    format: DatasetFormat,
    interval: Interval,
}

fn file_key(symbol: &str, interval: Interval) -> String {
    let key = symbol.replace(['/', '\\'], "_");
    match interval {
        Interval::Daily => key,
        other => format!("{key}_{other}"),
    }
}

/// Suffixes that mark a non-daily dataset file stem.
fn interval_suffix(stem: &str) -> Option<Interval> {
    [Interval::Weekly, Interval::Monthly]
        .into_iter()
        .find(|i| stem.ends_with(&format!("_{i}")))
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, format: DatasetFormat) -> Self {
        Self {
            root: root.into(),
            format,
            interval: Interval::Daily,
        }
    }

    /// Store for bars of `interval` (daily by default).
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> DatasetFormat {
        self.format
    }

    pub fn dataset_path(&self, symbol: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", file_key(symbol, self.interval), self.format.extension()))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.root
            .join(format!("{}.meta.json", file_key(symbol, self.interval)))
    }

    /// Refuse a dataset whose sidecar records another bar interval.
    fn check_interval(&self, symbol: &str) -> Result<(), StorageError> {
        match self.meta(symbol) {
            Some(meta) if meta.interval != self.interval => Err(StorageError::IntervalMismatch {
                symbol: symbol.to_string(),
                stored: meta.interval,
                requested: self.interval,
            }),
            _ => Ok(()),
        }
    }

    fn decode(&self, symbol: &str, path: &Path) -> Result<SymbolDataset, StorageError> {
        match self.format {
            DatasetFormat::Csv => csv::read_csv(symbol, fs::File::open(path)?),
            DatasetFormat::Parquet => parquet::read_parquet(symbol, path),
        }
    }

    fn quarantine(&self, path: &Path, reason: &StorageError) {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".quarantined");
        let target = path.with_file_name(name);
        warn!(
            path = %path.display(),
            error = %reason,
            "quarantining corrupt dataset"
        );
        if let Err(e) = fs::rename(path, &target) {
            warn!(path = %path.display(), error = %e, "quarantine rename failed");
        }
    }

    /// Datasets whose last row is before `cutoff`, sorted by symbol.
    pub fn find_stale(&self, cutoff: NaiveDate) -> Result<Vec<(String, Option<NaiveDate>)>, StorageError> {
        let mut stale = Vec::new();
        for symbol in self.symbols()? {
            let last = match self.meta(&symbol) {
                Some(meta) => Some(meta.end_date),
                None => self.load(&symbol)?.and_then(|ds| ds.last_date()),
            };
            if last.map_or(true, |d| d < cutoff) {
                stale.push((symbol, last));
            }
        }
        Ok(stale)
    }

    /// Stale datasets; deleted only when `confirm` is set.
    pub fn prune_stale(
        &self,
        cutoff: NaiveDate,
        confirm: bool,
    ) -> Result<Vec<(String, Option<NaiveDate>)>, StorageError> {
        let stale = self.find_stale(cutoff)?;
        if confirm {
            for (symbol, last) in &stale {
                self.remove(symbol)?;
                info!(symbol, last = ?last, "pruned stale dataset");
            }
        }
        Ok(stale)
    }
}

impl DatasetStore for FileStore {
    fn load(&self, symbol: &str) -> Result<Option<SymbolDataset>, StorageError> {
        let path = self.dataset_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        self.check_interval(symbol)?;
        match self.decode(symbol, &path) {
            Ok(ds) => {
                debug!(symbol, rows = ds.len(), "loaded dataset");
                Ok(Some(ds))
            }
            Err(e) if e.is_corruption() => {
                self.quarantine(&path, &e);
                let _ = fs::remove_file(self.meta_path(symbol));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn write(&self, dataset: &SymbolDataset) -> Result<(), StorageError> {
        let Some(meta) = CacheMeta::for_dataset(dataset, self.format, self.interval) else {
            return Err(StorageError::Empty {
                symbol: dataset.symbol.clone(),
            });
        };

        let path = self.dataset_path(&dataset.symbol);
        write_atomic(&path, |file| match self.format {
            DatasetFormat::Csv => csv::write_csv(dataset, BufWriter::new(file)),
            DatasetFormat::Parquet => parquet::write_parquet(dataset, &mut *file),
        })?;

        // The dataset is already in place: a sidecar failure only costs the
        // cached summary, so drop the stale one instead of failing the symbol.
        let meta_path = self.meta_path(&dataset.symbol);
        let written = serde_json::to_vec_pretty(&meta)
            .map_err(StorageError::from)
            .and_then(|json| {
                write_atomic(&meta_path, |file| {
                    std::io::Write::write_all(file, &json)?;
                    Ok(())
                })
            });
        if let Err(e) = written {
            warn!(symbol = %dataset.symbol, error = %e, "could not write metadata sidecar");
            let _ = fs::remove_file(&meta_path);
        }

        debug!(symbol = %dataset.symbol, rows = dataset.len(), path = %path.display(), "wrote dataset");
        Ok(())
    }

    fn meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn symbols(&self) -> Result<Vec<String>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let suffix = format!(".{}", self.format.extension());
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(&suffix) else { continue };
            let stem_interval = interval_suffix(stem).unwrap_or(Interval::Daily);
            if stem_interval != self.interval {
                continue;
            }
            let symbol = match self.interval {
                Interval::Daily => stem,
                other => &stem[..stem.len() - other.as_str().len() - 1],
            };
            out.push(symbol.to_string());
        }
        out.sort();
        Ok(out)
    }

    fn remove(&self, symbol: &str) -> Result<bool, StorageError> {
        let mut removed = false;
        for path in [self.dataset_path(symbol), self.meta_path(symbol)] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}
