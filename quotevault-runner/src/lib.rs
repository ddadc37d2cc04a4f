//! quotevault runner: batch orchestration on top of `quotevault-core`.
//!
//! This crate provides:
//! - Pipeline configuration (TOML, all fields defaulted)
//! - The progress ledger and its storage
//! - The sequential symbol batch scheduler
//! - Run reports and stdout progress
//! - Universe files (sector-organized symbol lists)

pub mod config;
pub mod ledger;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod universe;

pub use config::{ConfigError, PipelineConfig, ScheduleConfig, StorageConfig};
pub use ledger::{
    FailureRecord, JsonLedgerStore, LedgerError, LedgerStore, MemoryLedgerStore, ProgressLedger,
};
pub use progress::{DownloadProgress, NoProgress, StdoutProgress};
pub use report::{RunReport, SymbolUpdate};
pub use scheduler::{PipelineError, Scheduler};
pub use universe::{collect_symbols, sanitize_symbol, Universe, UniverseError};
