//! Universe files: sector-organized symbol lists.
//!
//! A universe is a TOML file with one list of tickers per sector:
//!
//! ```toml
//! [sectors]
//! Technology = ["AAPL", "MSFT"]
//! ETFs = ["SPY", "QQQ"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    /// Every ticker across all sectors, sanitized, deduplicated and sorted.
    pub fn all_tickers(&self) -> Vec<String> {
        self.sectors
            .values()
            .flatten()
            .filter_map(|t| sanitize_symbol(t))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn sector_tickers(&self, sector: &str) -> Option<&[String]> {
        self.sectors.get(sector).map(|v| v.as_slice())
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(|s| s.as_str()).collect()
    }

    pub fn ticker_count(&self) -> usize {
        self.all_tickers().len()
    }
}

/// Trim and upper-case a symbol; `None` when nothing is left.
pub fn sanitize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_ascii_uppercase())
}

/// Command-line symbols first, then the universe's, without duplicates.
pub fn collect_symbols(explicit: &[String], universe: Option<&Universe>) -> Vec<String> {
    let mut seen = HashSet::new();
    explicit
        .iter()
        .filter_map(|s| sanitize_symbol(s))
        .chain(universe.map(Universe::all_tickers).unwrap_or_default())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
