//! Calendar alignment of raw input series.
//!
//! All inputs are reindexed onto one business-day axis: the union of every
//! date on which at least one input has a finite observation (weekends
//! dropped by default). Each column is forward-filled from its most recent
//! finite observation, so once a column has started it has no gaps. Dates
//! before a column's first observation stay missing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::data::{InputKey, Series, TimePoint};

/// Aligner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Drop Saturday/Sunday dates from the union calendar.
    pub business_days_only: bool,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            business_days_only: true,
        }
    }
}

/// One aligned input column.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedColumn {
    values: Vec<Option<f64>>,
    /// Number of NaN / infinite source observations discarded.
    pub non_finite: usize,
    /// Number of calendar dates filled from an earlier observation.
    pub forward_filled: usize,
}

impl AlignedColumn {
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Index of the first date with a value.
    pub fn first_observed(&self) -> Option<usize> {
        self.values.iter().position(|v| v.is_some())
    }

    /// Whether the column holds at least one value.
    pub fn is_available(&self) -> bool {
        self.first_observed().is_some()
    }
}

/// Date-indexed frame of forward-filled input columns.
///
/// Built once per run by [`CalendarAligner::align`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedFrame {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<InputKey, AlignedColumn>,
}

impl AlignedFrame {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = InputKey> + '_ {
        self.columns.keys().copied()
    }

    pub fn column(&self, key: InputKey) -> Option<&AlignedColumn> {
        self.columns.get(&key)
    }

    /// Aligned values of an input, if it was supplied.
    pub fn values(&self, key: InputKey) -> Option<&[Option<f64>]> {
        self.columns.get(&key).map(|c| c.values())
    }

    /// Whether an input was supplied and has at least one value.
    pub fn is_available(&self, key: InputKey) -> bool {
        self.columns.get(&key).is_some_and(|c| c.is_available())
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn value(&self, key: InputKey, date: NaiveDate) -> Option<f64> {
        let idx = self.index_of(date)?;
        self.values(key)?.get(idx).copied().flatten()
    }

    /// Aligned column as a series, omitting leading missing dates.
    pub fn to_series(&self, key: InputKey) -> Option<Series> {
        let values = self.values(key)?;
        let points = self
            .dates
            .iter()
            .zip(values)
            .filter_map(|(date, v)| v.map(|v| TimePoint::new(*date, v)))
            .collect();
        Some(Series::from_sorted(key.as_str(), points))
    }
}

/// Reindexes input series onto a shared business-day calendar.
#[derive(Debug, Clone, Default)]
pub struct CalendarAligner {
    config: AlignerConfig,
}

impl CalendarAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }

    fn on_calendar(&self, date: NaiveDate) -> bool {
        !self.config.business_days_only
            || !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Align a set of named series.
    ///
    /// A series with no finite observation yields an all-missing column so
    /// downstream stages can report it as unavailable.
    pub fn align<'a, I>(&self, inputs: I) -> AlignedFrame
    where
        I: IntoIterator<Item = (InputKey, &'a Series)>,
    {
        let inputs: Vec<(InputKey, &Series)> = inputs.into_iter().collect();

        let calendar: BTreeSet<NaiveDate> = inputs
            .iter()
            .flat_map(|(_, s)| s.iter())
            .filter(|p| p.is_finite() && self.on_calendar(p.date))
            .map(|p| p.date)
            .collect();
        let dates: Vec<NaiveDate> = calendar.into_iter().collect();

        let columns = inputs
            .iter()
            .map(|(key, series)| (*key, forward_fill(&dates, series)))
            .collect();

        AlignedFrame { dates, columns }
    }
}

/// Carry the latest finite observation at or before each calendar date.
fn forward_fill(dates: &[NaiveDate], series: &Series) -> AlignedColumn {
    let points = series.points();
    let mut values = Vec::with_capacity(dates.len());
    let mut last: Option<f64> = None;
    let mut cursor = 0;
    let mut forward_filled = 0;

    for date in dates {
        let mut observed_today = false;
        while cursor < points.len() && points[cursor].date <= *date {
            let p = points[cursor];
            if p.is_finite() {
                last = Some(p.value);
                observed_today = p.date == *date;
            }
            cursor += 1;
        }
        if last.is_some() && !observed_today {
            forward_filled += 1;
        }
        values.push(last);
    }

    AlignedColumn {
        values,
        non_finite: series.non_finite_count(),
        forward_filled,
    }
}
