//! Fetch windows: which date range to request for a symbol.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::row::SymbolDataset;

/// Default history depth for a symbol with no dataset (5 years).
pub const DEFAULT_LOOKBACK_DAYS: i64 = 1825;

/// Bar interval. Datasets are keyed by calendar date, so nothing finer than daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1wk")]
    Weekly,
    #[serde(rename = "1mo")]
    Monthly,
}

impl Interval {
    /// Query-string form understood by the chart API.
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" | "daily" => Ok(Interval::Daily),
            "1wk" | "weekly" => Ok(Interval::Weekly),
            "1mo" | "monthly" => Ok(Interval::Monthly),
            other => Err(format!(
                "unsupported interval '{other}' (expected 1d, 1wk or 1mo)"
            )),
        }
    }
}

/// How to choose the window for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowPolicy {
    /// Explicit start; otherwise `today - lookback_days` for new symbols.
    pub start: Option<NaiveDate>,
    /// Explicit end; otherwise today.
    pub end: Option<NaiveDate>,
    /// Ignore existing data and re-request the whole initial window.
    pub full_refresh: bool,
    pub lookback_days: i64,
    pub interval: Interval,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            full_refresh: false,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            interval: Interval::Daily,
        }
    }
}

impl WindowPolicy {
    /// The window a symbol with no usable dataset gets.
    pub fn initial_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = self.end.unwrap_or(today);
        let start = self
            .start
            .unwrap_or_else(|| end - Duration::days(self.lookback_days.max(0)));
        (start.min(end), end)
    }
}

/// Inclusive date range to request for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    /// Decide what to fetch given what is already on disk.
    ///
    /// With a dataset, the window starts at its last date so the final stored
    /// day is fetched again and absorbs late revisions. A full refresh, or an
    /// explicit start earlier than the stored history, re-requests the initial
    /// window instead.
    pub fn plan(
        symbol: &str,
        existing: Option<&SymbolDataset>,
        policy: &WindowPolicy,
        today: NaiveDate,
    ) -> FetchWindow {
        let (initial_start, end) = policy.initial_range(today);

        let resume_from = existing
            .filter(|_| !policy.full_refresh)
            .and_then(|ds| Some((ds.first_date()?, ds.last_date()?)))
            .filter(|(first, _)| policy.start.map_or(true, |s| s >= *first))
            .map(|(_, last)| last);

        let start = match resume_from {
            Some(last) => last.min(end),
            None => initial_start,
        };

        FetchWindow {
            symbol: symbol.to_string(),
            start,
            end,
        }
    }

    /// Number of calendar days covered, inclusive.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} .. {}]", self.symbol, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceRow;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dataset(first: NaiveDate, last: NaiveDate) -> SymbolDataset {
        SymbolDataset::from_rows(
            "TEST",
            vec![
                PriceRow::new("TEST", first, 1.0, 1.0, 1.0, 1.0, 1),
                PriceRow::new("TEST", last, 1.0, 1.0, 1.0, 1.0, 1),
            ],
        )
    }

    #[test]
    fn new_symbol_gets_default_lookback() {
        let today = d(2024, 6, 1);
        let w = FetchWindow::plan("TEST", None, &WindowPolicy::default(), today);
        assert_eq!(w.end, today);
        assert_eq!(w.start, today - Duration::days(DEFAULT_LOOKBACK_DAYS));
    }

    #[test]
    fn existing_symbol_refetches_last_day() {
        let ds = dataset(d(2023, 1, 3), d(2024, 1, 10));
        let w = FetchWindow::plan("TEST", Some(&ds), &WindowPolicy::default(), d(2024, 1, 12));
        assert_eq!(w.start, d(2024, 1, 10));
        assert_eq!(w.end, d(2024, 1, 12));
    }

    #[test]
    fn full_refresh_ignores_existing() {
        let ds = dataset(d(2023, 1, 3), d(2024, 1, 10));
        let policy = WindowPolicy {
            start: Some(d(2020, 1, 1)),
            full_refresh: true,
            ..WindowPolicy::default()
        };
        let w = FetchWindow::plan("TEST", Some(&ds), &policy, d(2024, 1, 12));
        assert_eq!(w.start, d(2020, 1, 1));
    }

    #[test]
    fn earlier_explicit_start_backfills() {
        let ds = dataset(d(2023, 1, 3), d(2024, 1, 10));
        let policy = WindowPolicy {
            start: Some(d(2022, 1, 3)),
            ..WindowPolicy::default()
        };
        let w = FetchWindow::plan("TEST", Some(&ds), &policy, d(2024, 1, 12));
        assert_eq!(w.start, d(2022, 1, 3));
    }

    #[test]
    fn start_never_passes_end() {
        let ds = dataset(d(2023, 1, 3), d(2024, 3, 1));
        let policy = WindowPolicy {
            end: Some(d(2024, 2, 1)),
            ..WindowPolicy::default()
        };
        let w = FetchWindow::plan("TEST", Some(&ds), &policy, d(2024, 3, 5));
        assert!(w.start <= w.end);
        assert_eq!(w.days(), 1);
    }

    #[test]
    fn interval_parses_and_displays() {
        assert_eq!("1wk".parse::<Interval>().unwrap(), Interval::Weekly);
        assert_eq!(Interval::Monthly.to_string(), "1mo");
        assert!("1h".parse::<Interval>().is_err());
    }
}
