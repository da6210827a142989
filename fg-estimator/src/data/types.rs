//! Core data types for sentiment estimation.
//!
//! A [`Series`] is one named signal (an equity index level, a volatility
//! index, a credit spread...) as an ascending list of dated observations.
//! Raw inputs are identified by [`InputKey`] so every later stage can refer
//! to them without stringly-typed lookups.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Duplicate date {date} in series {name}")]
    DuplicateDate { name: String, date: NaiveDate },
}

/// A raw market input consumed by the indicator builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    /// Cap-weighted equity index level (e.g. S&P 500).
    Equity,
    /// Implied volatility index level (e.g. VIX).
    Volatility,
    /// Equal-weight / broad equity proxy used for breadth.
    Breadth,
    /// Long-duration Treasury proxy (safe haven).
    Treasury,
    /// High-yield credit ETF level.
    HighYield,
    /// High-yield minus investment-grade option-adjusted spread.
    CreditSpread,
    /// Equity put/call ratio. Optional.
    PutCall,
    /// Reference sentiment index used for calibration only.
    Benchmark,
}

impl InputKey {
    /// Inputs the indicator builder knows how to consume.
    pub const MARKET: [InputKey; 7] = [
        Self::Equity,
        Self::Volatility,
        Self::Breadth,
        Self::Treasury,
        Self::HighYield,
        Self::CreditSpread,
        Self::PutCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Volatility => "volatility",
            Self::Breadth => "breadth",
            Self::Treasury => "treasury",
            Self::HighYield => "high_yield",
            Self::CreditSpread => "credit_spread",
            Self::PutCall => "put_call",
            Self::Benchmark => "benchmark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "equity" | "^gspc" => Some(Self::Equity),
            "volatility" | "^vix" => Some(Self::Volatility),
            "breadth" | "rsp" => Some(Self::Breadth),
            "treasury" | "tlt" => Some(Self::Treasury),
            "high_yield" | "hyg" => Some(Self::HighYield),
            "credit_spread" | "bamlh0a0hym2" => Some(Self::CreditSpread),
            "put_call" | "putcall" => Some(Self::PutCall),
            "benchmark" => Some(Self::Benchmark),
            _ => None,
        }
    }

    /// Conventional market ticker / FRED id for this input.
    pub fn default_ticker(&self) -> &'static str {
        match self {
            Self::Equity => "^GSPC",
            Self::Volatility => "^VIX",
            Self::Breadth => "RSP",
            Self::Treasury => "TLT",
            Self::HighYield => "HYG",
            Self::CreditSpread => "BAMLH0A0HYM2",
            Self::PutCall => "PUTCALL",
            Self::Benchmark => "FGI",
        }
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dated observation.
///
/// `value` may be NaN or infinite when the source marked the date as
/// missing; such points are treated as absent by the aligner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }

    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}

/// Named, date-ascending sequence of observations with unique dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    points: Vec<TimePoint>,
}

impl Series {
    /// Build a series, sorting by date and rejecting duplicate dates.
    pub fn new(name: impl Into<String>, mut points: Vec<TimePoint>) -> Result<Self, SeriesError> {
        let name = name.into();
        points.sort_by_key(|p| p.date);
        if let Some(w) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate {
                name,
                date: w[0].date,
            });
        }
        Ok(Self { name, points })
    }

    /// Build a series from points already known to be ascending and unique.
    pub(crate) fn from_sorted(name: impl Into<String>, points: Vec<TimePoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn last(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    /// Value at an exact date.
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    /// Number of NaN / infinite observations.
    pub fn non_finite_count(&self) -> usize {
        self.points.iter().filter(|p| !p.is_finite()).count()
    }

    /// Points with `start <= date <= end`.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Series {
        let points = self
            .points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect();
        Self::from_sorted(self.name.clone(), points)
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimePoint> {
        self.points.iter()
    }
}

/// The raw inputs of one computation run, keyed by [`InputKey`].
#[derive(Debug, Clone, Default)]
pub struct InputSet {
    series: BTreeMap<InputKey, Series>,
}

impl InputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: InputKey, series: Series) -> Option<Series> {
        self.series.insert(key, series)
    }

    pub fn with(mut self, key: InputKey, series: Series) -> Self {
        self.insert(key, series);
        self
    }

    pub fn get(&self, key: InputKey) -> Option<&Series> {
        self.series.get(&key)
    }

    pub fn remove(&mut self, key: InputKey) -> Option<Series> {
        self.series.remove(&key)
    }

    pub fn contains(&self, key: InputKey) -> bool {
        self.series.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = InputKey> + '_ {
        self.series.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InputKey, &Series)> {
        self.series.iter().map(|(k, s)| (*k, s))
    }

    /// Market inputs only (everything except the benchmark).
    pub fn market(&self) -> impl Iterator<Item = (InputKey, &Series)> {
        self.iter().filter(|(k, _)| *k != InputKey::Benchmark)
    }

    pub fn benchmark(&self) -> Option<&Series> {
        self.get(InputKey::Benchmark)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_input_key_parsing() {
        assert_eq!(InputKey::from_str("equity"), Some(InputKey::Equity));
        assert_eq!(InputKey::from_str("^VIX"), Some(InputKey::Volatility));
        assert_eq!(InputKey::from_str("HYG"), Some(InputKey::HighYield));
        assert_eq!(InputKey::from_str("put_call"), Some(InputKey::PutCall));
        assert_eq!(InputKey::from_str("gold"), None);
        for key in InputKey::MARKET {
            assert_eq!(InputKey::from_str(key.as_str()), Some(key));
        }
    }

    #[test]
    fn test_series_sorts_points() {
        let s = Series::new(
            "x",
            vec![TimePoint::new(d(2024, 1, 3), 3.0), TimePoint::new(d(2024, 1, 2), 2.0)],
        )
        .unwrap();
        assert_eq!(s.first_date(), Some(d(2024, 1, 2)));
        assert_eq!(s.value_at(d(2024, 1, 3)), Some(3.0));
        assert_eq!(s.value_at(d(2024, 1, 4)), None);
    }

    #[test]
    fn test_series_rejects_duplicates() {
        let err = Series::new(
            "x",
            vec![TimePoint::new(d(2024, 1, 2), 1.0), TimePoint::new(d(2024, 1, 2), 2.0)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SeriesError::DuplicateDate {
                name: "x".to_string(),
                date: d(2024, 1, 2)
            }
        );
    }

    #[test]
    fn test_slice_and_non_finite() {
        let s = Series::new(
            "x",
            vec![
                TimePoint::new(d(2024, 1, 2), 1.0),
                TimePoint::new(d(2024, 1, 3), f64::NAN),
                TimePoint::new(d(2024, 1, 4), 3.0),
            ],
        )
        .unwrap();
        assert_eq!(s.non_finite_count(), 1);
        let sliced = s.slice(d(2024, 1, 3), d(2024, 1, 10));
        assert_eq!(sliced.len(), 2);
    }

    #[test]
    fn test_input_set_separates_benchmark() {
        let set = InputSet::new()
            .with(InputKey::Equity, Series::empty("equity"))
            .with(InputKey::Benchmark, Series::empty("benchmark"));
        assert_eq!(set.len(), 2);
        assert!(set.benchmark().is_some());
        assert_eq!(set.market().count(), 1);
    }
}
