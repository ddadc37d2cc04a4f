//! Progress ledger: which symbols finished and which failed, across runs.
//!
//! The ledger is an explicit value: the scheduler receives one, updates it after
//! every terminal outcome and hands it to a [`LedgerStore`] to persist. On disk
//! it is pretty JSON:
//!
//! ```json
//! { "completed": ["AAPL"], "failed": [{ "symbol": "XYZ", "error": "not found" }] }
//! ```

use quotevault_core::data::store::atomic::write_atomic;
use quotevault_core::data::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse ledger {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("write ledger: {0}")]
    Write(#[from] StorageError),

    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Older ledgers call this field `ticker`.
    #[serde(alias = "ticker")]
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressLedger {
    completed: BTreeSet<String>,
    failed: Vec<FailureRecord>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, symbol: &str) -> bool {
        self.completed.contains(symbol)
    }

    pub fn is_failed(&self, symbol: &str) -> bool {
        self.failure_for(symbol).is_some()
    }

    pub fn failure_for(&self, symbol: &str) -> Option<&FailureRecord> {
        self.failed.iter().find(|f| f.symbol == symbol)
    }

    /// Mark `symbol` completed and forget any earlier failure.
    pub fn record_success(&mut self, symbol: &str) {
        self.failed.retain(|f| f.symbol != symbol);
        self.completed.insert(symbol.to_string());
    }

    /// Record a failure, replacing any earlier one for the same symbol.
    pub fn record_failure(&mut self, symbol: &str, error: impl Into<String>) {
        self.completed.remove(symbol);
        let error = error.into();
        match self.failed.iter_mut().find(|f| f.symbol == symbol) {
            Some(existing) => existing.error = error,
            None => self.failed.push(FailureRecord {
                symbol: symbol.to_string(),
                error,
            }),
        }
    }

    /// Whether a run should work on `symbol`.
    pub fn should_process(&self, symbol: &str, skip_failed: bool) -> bool {
        !(self.is_completed(symbol) || (skip_failed && self.is_failed(symbol)))
    }

    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.completed.iter().map(String::as_str)
    }

    pub fn failed(&self) -> &[FailureRecord] {
        &self.failed
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.failed.is_empty()
    }
}

/// Where the ledger lives between runs.
pub trait LedgerStore: Send + Sync {
    /// A missing ledger loads as empty.
    fn load(&self) -> Result<ProgressLedger, LedgerError>;

    fn save(&self, ledger: &ProgressLedger) -> Result<(), LedgerError>;

    /// Drop all recorded progress.
    fn reset(&self) -> Result<(), LedgerError>;
}

/// Ledger persisted as a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonLedgerStore {
    path: PathBuf,
}

impl JsonLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonLedgerStore {
    fn load(&self) -> Result<ProgressLedger, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProgressLedger::new()),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| LedgerError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, ledger: &ProgressLedger) -> Result<(), LedgerError> {
        let json = serde_json::to_vec_pretty(ledger).map_err(StorageError::from)?;
        write_atomic(&self.path, |file| {
            file.write_all(&json)?;
            Ok(())
        })?;
        Ok(())
    }

    fn reset(&self) -> Result<(), LedgerError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }
}

/// In-memory ledger store. Counts saves; can be told to fail them.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<ProgressLedger>,
    saves: Mutex<usize>,
    fail_saves: bool,
}

impl MemoryLedgerStore {
    pub fn new(ledger: ProgressLedger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            ..Self::default()
        }
    }

    /// A store whose every `save` fails.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> ProgressLedger {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<ProgressLedger, LedgerError> {
        Ok(self.snapshot())
    }

    fn save(&self, ledger: &ProgressLedger) -> Result<(), LedgerError> {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        if self.fail_saves {
            return Err(LedgerError::Unavailable("save disabled".into()));
        }
        *self.ledger.lock().unwrap_or_else(|e| e.into_inner()) = ledger.clone();
        Ok(())
    }

    fn reset(&self) -> Result<(), LedgerError> {
        *self.ledger.lock().unwrap_or_else(|e| e.into_inner()) = ProgressLedger::new();
        Ok(())
    }
}
