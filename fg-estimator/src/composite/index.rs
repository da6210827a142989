//! Composite index types shared by both aggregation strategies.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{Series, TimePoint};

use super::calibration::CalibrationModel;

/// How component scores are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    /// Unweighted mean of the available scores.
    #[default]
    Naive,
    /// Linear model fitted against a benchmark index.
    Calibrated,
}

impl AggregationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Calibrated => "calibrated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "naive" | "mean" => Some(Self::Naive),
            "calibrated" | "ols" => Some(Self::Calibrated),
            _ => None,
        }
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One composite value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositePoint {
    pub date: NaiveDate,
    /// Value clamped to `[0, 100]`, used for display and classification.
    pub value: f64,
    /// Unclamped aggregate, kept for diagnostics.
    pub raw: f64,
    /// Number of component scores that contributed.
    pub components: usize,
}

/// Composite sentiment index, one point per date with any contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeIndex {
    strategy: AggregationStrategy,
    points: Vec<CompositePoint>,
    model: Option<CalibrationModel>,
}

impl CompositeIndex {
    /// Points must be in ascending date order.
    pub(crate) fn new(
        strategy: AggregationStrategy,
        points: Vec<CompositePoint>,
        model: Option<CalibrationModel>,
    ) -> Self {
        Self {
            strategy,
            points,
            model,
        }
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Model the calibrated values were computed with.
    pub fn model(&self) -> Option<&CalibrationModel> {
        self.model.as_ref()
    }

    pub fn points(&self) -> &[CompositePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&CompositePoint> {
        self.points.last()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&CompositePoint> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| &self.points[i])
    }

    /// Clamped values as a series.
    pub fn to_series(&self) -> Series {
        Series::from_sorted(
            "fgi",
            self.points
                .iter()
                .map(|p| TimePoint::new(p.date, p.value))
                .collect(),
        )
    }

    /// Unclamped values as a series.
    pub fn raw_series(&self) -> Series {
        Series::from_sorted(
            "fgi_raw",
            self.points
                .iter()
                .map(|p| TimePoint::new(p.date, p.raw))
                .collect(),
        )
    }

    /// Points within `[start, end]`, inclusive.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> CompositeIndex {
        let points = self
            .points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect();
        Self::new(self.strategy, points, self.model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(day: u32, value: f64) -> CompositePoint {
        CompositePoint {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            value: value.clamp(0.0, 100.0),
            raw: value,
            components: 1,
        }
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(AggregationStrategy::from_str("Naive"), Some(AggregationStrategy::Naive));
        assert_eq!(
            AggregationStrategy::from_str("calibrated"),
            Some(AggregationStrategy::Calibrated)
        );
        assert_eq!(AggregationStrategy::from_str("median"), None);
    }

    #[test]
    fn test_series_views() {
        let index = CompositeIndex::new(
            AggregationStrategy::Calibrated,
            vec![point(1, 40.0), point(4, 104.0)],
            None,
        );
        assert_eq!(index.to_series().points()[1].value, 100.0);
        assert_eq!(index.raw_series().points()[1].value, 104.0);
        assert_eq!(index.get(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()).unwrap().raw, 104.0);
        assert!(index.get(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()).is_none());
    }

    #[test]
    fn test_slice_inclusive() {
        let index = CompositeIndex::new(
            AggregationStrategy::Naive,
            vec![point(1, 10.0), point(2, 20.0), point(3, 30.0)],
            None,
        );
        let sliced = index.slice(
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
        );
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced.points()[0].value, 20.0);
    }
}
