//! Per-symbol outcomes and the end-of-run summary.

use quotevault_core::data::MergeStats;
use quotevault_core::domain::IndicatorColumn;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What happened to one symbol that went through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolUpdate {
    pub stats: MergeStats,
    /// Rows in the dataset after the merge.
    pub total_rows: usize,
    /// Too few rows for indicators; stored raw.
    pub low_quality: bool,
    /// Columns left empty because their indicator failed.
    pub failed_indicators: Vec<IndicatorColumn>,
    pub events_missing: bool,
}

impl SymbolUpdate {
    /// Rows inserted or overwritten on disk.
    pub fn rows_written(&self) -> usize {
        self.stats.inserted + self.stats.updated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub succeeded: Vec<String>,
    /// Symbol → short failure reason.
    pub failed: BTreeMap<String, String>,
    pub skipped: Vec<String>,
    pub low_quality: Vec<String>,
    /// Symbol → columns whose indicator failed (the symbol still succeeded).
    pub indicator_failures: BTreeMap<String, Vec<String>>,
    /// Succeeded without dividends and splits.
    pub events_missing: Vec<String>,
    pub rows_written: usize,
}

impl RunReport {
    pub fn record_success(&mut self, symbol: &str, update: &SymbolUpdate) {
        self.succeeded.push(symbol.to_string());
        if update.low_quality {
            self.low_quality.push(symbol.to_string());
        }
        if !update.failed_indicators.is_empty() {
            let columns = update
                .failed_indicators
                .iter()
                .map(|c| c.name().to_string())
                .collect();
            self.indicator_failures.insert(symbol.to_string(), columns);
        }
        if update.events_missing {
            self.events_missing.push(symbol.to_string());
        }
        self.rows_written += update.rows_written();
    }

    pub fn record_failure(&mut self, symbol: &str, reason: &str) {
        self.failed.insert(symbol.to_string(), reason.to_string());
    }

    pub fn record_skip(&mut self, symbol: &str) {
        self.skipped.push(symbol.to_string());
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Symbols that went through the pipeline.
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn log_summary(&self) {
        info!(
            succeeded = self.succeeded.len(),
            failed = self.failed.len(),
            skipped = self.skipped.len(),
            low_quality = self.low_quality.len(),
            indicator_failures = self.indicator_failures.len(),
            events_missing = self.events_missing.len(),
            rows_written = self.rows_written,
            "run complete"
        );
        for (symbol, reason) in &self.failed {
            warn!(symbol = %symbol, reason = %reason, "symbol failed");
        }
        for (symbol, columns) in &self.indicator_failures {
            warn!(symbol = %symbol, columns = %columns.join(","), "indicators left empty");
        }
    }
}
