//! Chart payload serialization.
//!
//! Shapes a pipeline result as `{ meta, datasets, components }` where every
//! dataset is a list of `{date, value}` points restricted to a date range.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::composite::{AggregationStrategy, CalibrationModel};
use crate::data::{InputKey, Series};
use crate::indicators::IndicatorKind;
use crate::pipeline::PipelineResult;
use crate::regime::SentimentRegime;

/// Dataset key of the composite index.
pub const FGI_KEY: &str = "fgi";

/// Prefix of per-indicator score dataset keys.
pub const SCORE_PREFIX: &str = "score_";

/// Prefix of per-indicator raw value dataset keys.
pub const RAW_PREFIX: &str = "raw_";

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Unknown dataset key: {0}")]
    UnknownKey(String),

    #[error("Dataset not available in this result: {0}")]
    Unavailable(String),

    #[error("Unknown range preset: {0}")]
    UnknownRange(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lookback presets for chart ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangePreset {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[default]
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "MAX")]
    Max,
}

impl RangePreset {
    pub const ALL: [RangePreset; 6] = [
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::FiveYears,
        Self::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1Y",
            Self::FiveYears => "5Y",
            Self::Max => "MAX",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, PayloadError> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == upper)
            .ok_or_else(|| PayloadError::UnknownRange(s.to_string()))
    }

    /// Calendar days of lookback; `None` for the full history.
    pub fn days(&self) -> Option<i64> {
        match self {
            Self::OneMonth => Some(30),
            Self::ThreeMonths => Some(90),
            Self::SixMonths => Some(180),
            Self::OneYear => Some(365),
            Self::FiveYears => Some(1825),
            Self::Max => None,
        }
    }

    /// Inclusive `(start, end)` window ending at `end`.
    pub fn resolve(&self, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = match self.days() {
            Some(days) => end - Duration::days(days),
            None => max_range_start(),
        };
        (start, end)
    }
}

impl fmt::Display for RangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn max_range_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// What to put in a payload.
#[derive(Debug, Clone)]
pub struct PayloadOptions {
    pub range: RangePreset,
    /// Defaults to the last composite date.
    pub end_date: Option<NaiveDate>,
    /// Dataset keys: `fgi`, an input key, `score_<indicator>` or
    /// `raw_<indicator>`.
    pub include: Vec<String>,
    /// Add per-date component score and raw value rows.
    pub with_components: bool,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            range: RangePreset::default(),
            end_date: None,
            include: vec![FGI_KEY.to_string()],
            with_components: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Scores and raw values of every component on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub scores: BTreeMap<String, Option<f64>>,
    #[serde(flatten)]
    pub raw: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayloadMeta {
    pub range: RangePreset,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub include: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Composite points inside the window.
    pub points: usize,
    pub last_value: Option<f64>,
    pub last_regime: Option<SentimentRegime>,
    pub aggregation: AggregationStrategy,
    pub calibration: Option<CalibrationModel>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPayload {
    pub meta: PayloadMeta,
    pub datasets: BTreeMap<String, Vec<SeriesPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentRow>>,
}

impl ChartPayload {
    /// Build a payload from a pipeline result.
    pub fn build(result: &PipelineResult, options: &PayloadOptions) -> Result<Self, PayloadError> {
        let started = Instant::now();
        let end = options
            .end_date
            .or_else(|| result.composite.last().map(|p| p.date))
            .or_else(|| result.frame.dates().last().copied())
            .unwrap_or_else(|| Utc::now().date_naive());
        let (start, end) = options.range.resolve(end);

        let mut datasets = BTreeMap::new();
        for key in &options.include {
            let series = dataset(result, key)?;
            datasets.insert(key.clone(), points(&series.slice(start, end)));
        }

        let composite = result.composite.slice(start, end);
        let last = composite.last();
        let components = options
            .with_components
            .then(|| component_rows(result, start, end));

        let meta = PayloadMeta {
            range: options.range,
            start_date: start,
            end_date: end,
            include: options.include.clone(),
            generated_at: Utc::now(),
            duration_seconds: started.elapsed().as_secs_f64(),
            points: composite.len(),
            last_value: last.map(|p| p.value),
            last_regime: last.map(|p| result.classifier().classify(p.value)),
            aggregation: result.composite.strategy(),
            calibration: result.composite.model().cloned(),
            warnings: result.warnings.iter().map(|w| w.to_string()).collect(),
        };

        Ok(Self {
            meta,
            datasets,
            components,
        })
    }

    pub fn to_json(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), PayloadError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Resolve a dataset key against a result.
fn dataset(result: &PipelineResult, key: &str) -> Result<Series, PayloadError> {
    if key == FGI_KEY {
        return Ok(result.composite.to_series());
    }

    if let Some(name) = key.strip_prefix(RAW_PREFIX) {
        let kind =
            IndicatorKind::from_name(name).ok_or_else(|| PayloadError::UnknownKey(key.to_string()))?;
        return result
            .indicators
            .get(kind)
            .map(|i| i.series.clone())
            .ok_or_else(|| PayloadError::Unavailable(key.to_string()));
    }

    if let Some(name) = key.strip_prefix(SCORE_PREFIX) {
        let kind =
            IndicatorKind::from_name(name).ok_or_else(|| PayloadError::UnknownKey(key.to_string()))?;
        return result
            .score(kind)
            .map(|s| s.series.clone())
            .ok_or_else(|| PayloadError::Unavailable(key.to_string()));
    }

    let input = InputKey::from_str(key).ok_or_else(|| PayloadError::UnknownKey(key.to_string()))?;
    result
        .frame
        .to_series(input)
        .ok_or_else(|| PayloadError::Unavailable(key.to_string()))
}

fn points(series: &Series) -> Vec<SeriesPoint> {
    series
        .iter()
        .map(|p| SeriesPoint {
            date: p.date,
            value: p.value,
        })
        .collect()
}

fn component_rows(result: &PipelineResult, start: NaiveDate, end: NaiveDate) -> Vec<ComponentRow> {
    result
        .composite
        .points()
        .iter()
        .filter(|p| p.date >= start && p.date <= end)
        .map(|p| ComponentRow {
            date: p.date,
            scores: result
                .scores
                .iter()
                .map(|s| (s.series.name().to_string(), s.series.value_at(p.date)))
                .collect(),
            raw: result
                .indicators
                .indicators
                .iter()
                .map(|i| {
                    (
                        format!("{}{}", RAW_PREFIX, i.kind.name()),
                        i.series.value_at(p.date),
                    )
                })
                .collect(),
        })
        .collect()
}
