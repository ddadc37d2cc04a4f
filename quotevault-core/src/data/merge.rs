//! Incremental merge of freshly fetched rows into a stored dataset.
//!
//! Rows are keyed by date within one symbol. Raw OHLCV and event fields from
//! the incoming side win; indicator values already stored are only replaced
//! by incoming values that are actually present.

use crate::domain::{PriceRow, SymbolDataset};
use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Dates that did not exist before.
    pub inserted: usize,
    /// Stored dates overwritten by an incoming row.
    pub updated: usize,
    /// Indicator values kept because the incoming row lacked them.
    pub indicators_preserved: usize,
    /// Incoming rows carrying another symbol.
    pub dropped_foreign: usize,
}

impl MergeStats {
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.updated > 0
    }
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub dataset: SymbolDataset,
    pub stats: MergeStats,
}

/// Merge `incoming` into `existing` for `symbol`.
///
/// The result is ascending with unique dates. Within one call a later
/// incoming row for the same date overwrites an earlier one. Merging the same
/// input twice yields the same dataset.
pub fn merge(symbol: &str, existing: Option<SymbolDataset>, incoming: Vec<PriceRow>) -> Merged {
    let mut stats = MergeStats::default();
    let mut by_date: BTreeMap<NaiveDate, PriceRow> = BTreeMap::new();

    if let Some(ds) = existing {
        if ds.symbol != symbol {
            warn!(expected = symbol, found = %ds.symbol, "stored dataset labelled with another symbol");
        }
        for mut row in ds.rows {
            row.symbol = symbol.to_string();
            by_date.insert(row.date, row);
        }
    }
    let stored: BTreeSet<NaiveDate> = by_date.keys().copied().collect();
    let mut touched: BTreeSet<NaiveDate> = BTreeSet::new();

    for row in incoming {
        if row.symbol != symbol {
            warn!(symbol, foreign = %row.symbol, date = %row.date, "dropping row for another symbol");
            stats.dropped_foreign += 1;
            continue;
        }
        let date = row.date;
        match by_date.entry(date) {
            Entry::Vacant(slot) => {
                slot.insert(row);
                stats.inserted += 1;
            }
            Entry::Occupied(mut slot) => {
                let kept = slot.get_mut().absorb(&row);
                if stored.contains(&date) {
                    stats.indicators_preserved += kept;
                    if touched.insert(date) {
                        stats.updated += 1;
                    }
                }
            }
        }
    }

    debug!(
        symbol,
        inserted = stats.inserted,
        updated = stats.updated,
        preserved = stats.indicators_preserved,
        "merged"
    );

    Merged {
        dataset: SymbolDataset {
            symbol: symbol.to_string(),
            rows: by_date.into_values().collect(),
        },
        stats,
    }
}
