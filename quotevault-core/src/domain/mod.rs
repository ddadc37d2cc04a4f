//! Domain types for quotevault

pub mod columns;
pub mod row;
pub mod window;

pub use columns::{IndicatorColumn, IndicatorSet};
pub use row::{round_dp, PriceRow, SymbolDataset};
pub use window::{FetchWindow, Interval, WindowPolicy, DEFAULT_LOOKBACK_DAYS};
