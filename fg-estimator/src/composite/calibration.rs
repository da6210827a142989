//! Linear calibration of component scores against a benchmark index.
//!
//! Fits `benchmark_t ~ intercept + sum_k weight_k * score_{k,t}` by ordinary
//! least squares over every date where the benchmark and all component
//! scores are defined. The system is solved through a singular value
//! decomposition of the design matrix with an explicit rank check, so
//! collinear or underdetermined windows fail instead of returning an
//! arbitrary solution.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::data::Series;
use crate::indicators::IndicatorKind;
use crate::scoring::ScoreSeries;

use super::index::{AggregationStrategy, CompositeIndex, CompositePoint};

/// Version of the indicator definitions a model was fitted against.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("No dates where the benchmark and every indicator score overlap")]
    EmptyOverlap,

    #[error("{observations} observations cannot identify {parameters} parameters")]
    TooFewObservations {
        observations: usize,
        parameters: usize,
    },

    #[error("Design matrix is rank deficient: rank {rank} of {columns} columns")]
    RankDeficient { rank: usize, columns: usize },

    #[error("Indicator has no scores: {0}")]
    MissingIndicator(String),

    #[error("No indicator scores to calibrate")]
    NoIndicators,

    #[error("No benchmark supplied and no stored model available")]
    NoModel,

    #[error("Model schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CalibrationError {
    /// Whether the fit window itself cannot support a model.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Self::EmptyOverlap
                | Self::TooFewObservations { .. }
                | Self::RankDeficient { .. }
                | Self::MissingIndicator(_)
                | Self::NoIndicators
        )
    }
}

/// Fitted linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub intercept: f64,
    /// Weight per indicator name.
    pub weights: BTreeMap<String, f64>,
    pub fitted_from: NaiveDate,
    pub fitted_to: NaiveDate,
    pub observations: usize,
    pub schema_version: u32,
}

/// Fitted and observed benchmark value on one fit-window date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedPoint {
    pub date: NaiveDate,
    pub fitted: f64,
    pub actual: f64,
}

impl FittedPoint {
    pub fn residual(&self) -> f64 {
        self.actual - self.fitted
    }
}

/// Design rows over the dates where every column is defined.
struct Overlap {
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
    target: Vec<f64>,
}

fn overlap(scores: &[&ScoreSeries], benchmark: &Series) -> Result<Overlap, CalibrationError> {
    if scores.is_empty() {
        return Err(CalibrationError::NoIndicators);
    }
    if let Some(empty) = scores.iter().find(|s| s.series.is_empty()) {
        return Err(CalibrationError::MissingIndicator(empty.kind.name().to_string()));
    }

    let mut overlap = Overlap {
        dates: Vec::new(),
        rows: Vec::new(),
        target: Vec::new(),
    };
    for p in benchmark.iter().filter(|p| p.is_finite()) {
        let row: Option<Vec<f64>> = scores.iter().map(|s| s.series.value_at(p.date)).collect();
        if let Some(row) = row {
            overlap.dates.push(p.date);
            overlap.rows.push(row);
            overlap.target.push(p.value);
        }
    }

    if overlap.dates.is_empty() {
        return Err(CalibrationError::EmptyOverlap);
    }
    Ok(overlap)
}

/// First and last date of the window a fit of `scores` against
/// `benchmark` would use.
pub fn fit_window(
    scores: &[ScoreSeries],
    benchmark: &Series,
) -> Result<(NaiveDate, NaiveDate), CalibrationError> {
    let columns: Vec<&ScoreSeries> = scores.iter().collect();
    let overlap = overlap(&columns, benchmark)?;
    match (overlap.dates.first(), overlap.dates.last()) {
        (Some(first), Some(last)) => Ok((*first, *last)),
        _ => Err(CalibrationError::EmptyOverlap),
    }
}

impl CalibrationModel {
    /// Fit a model on the overlap of `benchmark` and all `scores`.
    pub fn fit(scores: &[ScoreSeries], benchmark: &Series) -> Result<Self, CalibrationError> {
        let columns: Vec<&ScoreSeries> = scores.iter().collect();
        let overlap = overlap(&columns, benchmark)?;

        let n = overlap.rows.len();
        let p = columns.len() + 1;
        if n < p {
            return Err(CalibrationError::TooFewObservations {
                observations: n,
                parameters: p,
            });
        }

        let x = DMatrix::from_fn(n, p, |i, j| if j == 0 { 1.0 } else { overlap.rows[i][j - 1] });
        let y = DVector::from_vec(overlap.target.clone());

        let svd = x.svd(true, true);
        let sigma_max = svd.singular_values.max();
        let tol = n.max(p) as f64 * f64::EPSILON * sigma_max;
        let rank = svd.singular_values.iter().filter(|s| **s > tol).count();
        if rank < p {
            return Err(CalibrationError::RankDeficient { rank, columns: p });
        }

        let beta = svd
            .solve(&y, tol)
            .map_err(|_| CalibrationError::RankDeficient { rank, columns: p })?;

        let weights = columns
            .iter()
            .enumerate()
            .map(|(k, s)| (s.kind.name().to_string(), beta[k + 1]))
            .collect();

        let model = Self {
            intercept: beta[0],
            weights,
            fitted_from: overlap.dates[0],
            fitted_to: overlap.dates[n - 1],
            observations: n,
            schema_version: SCHEMA_VERSION,
        };
        info!(
            "Calibrated {} indicators on {} observations ({} to {})",
            columns.len(),
            n,
            model.fitted_from,
            model.fitted_to
        );
        Ok(model)
    }

    /// Indicators the model weights, in name order.
    pub fn indicators(&self) -> Vec<IndicatorKind> {
        self.weights
            .keys()
            .filter_map(|name| IndicatorKind::from_name(name))
            .collect()
    }

    pub fn weight(&self, kind: IndicatorKind) -> Option<f64> {
        self.weights.get(kind.name()).copied()
    }

    /// Weighted indicators, looked up in `scores`.
    fn columns<'a>(&self, scores: &'a [ScoreSeries]) -> Result<Vec<(&'a ScoreSeries, f64)>, CalibrationError> {
        self.weights
            .iter()
            .map(|(name, weight)| {
                scores
                    .iter()
                    .find(|s| s.kind.name() == name && !s.series.is_empty())
                    .map(|s| (s, *weight))
                    .ok_or_else(|| CalibrationError::MissingIndicator(name.clone()))
            })
            .collect()
    }

    /// Unclamped model output for one date's scores.
    pub fn predict(&self, scores: &BTreeMap<IndicatorKind, f64>) -> Option<f64> {
        self.weights.iter().try_fold(self.intercept, |acc, (name, w)| {
            let kind = IndicatorKind::from_name(name)?;
            scores.get(&kind).map(|s| acc + w * s)
        })
    }

    /// Calibrated composite on every date where all weighted indicators
    /// have a score.
    pub fn apply(&self, scores: &[ScoreSeries]) -> Result<CompositeIndex, CalibrationError> {
        let columns = self.columns(scores)?;
        let Some(((anchor, _), rest)) = columns.split_first() else {
            return Err(CalibrationError::SchemaMismatch(
                "model has no indicator weights".to_string(),
            ));
        };

        let mut points = Vec::with_capacity(anchor.series.len());
        'dates: for p in anchor.series.iter() {
            let mut raw = self.intercept + columns[0].1 * p.value;
            for (score, weight) in rest {
                match score.series.value_at(p.date) {
                    Some(v) => raw += weight * v,
                    None => continue 'dates,
                }
            }
            points.push(CompositePoint {
                date: p.date,
                value: raw.clamp(0.0, 100.0),
                raw,
                components: columns.len(),
            });
        }

        debug!("Applied calibration to {} dates", points.len());
        Ok(CompositeIndex::new(
            AggregationStrategy::Calibrated,
            points,
            Some(self.clone()),
        ))
    }

    /// Fitted vs observed benchmark on the dates the model can be evaluated.
    pub fn in_sample(
        &self,
        scores: &[ScoreSeries],
        benchmark: &Series,
    ) -> Result<Vec<FittedPoint>, CalibrationError> {
        let columns = self.columns(scores)?;
        let refs: Vec<&ScoreSeries> = columns.iter().map(|(s, _)| *s).collect();
        let overlap = overlap(&refs, benchmark)?;

        Ok(overlap
            .dates
            .iter()
            .zip(&overlap.rows)
            .zip(&overlap.target)
            .map(|((date, row), actual)| FittedPoint {
                date: *date,
                fitted: self.intercept
                    + row.iter().zip(&columns).map(|(v, (_, w))| v * w).sum::<f64>(),
                actual: *actual,
            })
            .collect())
    }

    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a stored model and check it against the current indicators.
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let text = fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&text)?;
        model.check_schema()?;
        Ok(model)
    }

    fn check_schema(&self) -> Result<(), CalibrationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CalibrationError::SchemaMismatch(format!(
                "model version {} does not match {}",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        if self.weights.is_empty() {
            return Err(CalibrationError::SchemaMismatch(
                "model has no indicator weights".to_string(),
            ));
        }
        if let Some(name) = self
            .weights
            .keys()
            .find(|name| IndicatorKind::from_name(name).is_none())
        {
            return Err(CalibrationError::SchemaMismatch(format!(
                "unknown indicator '{}'",
                name
            )));
        }
        if !self.intercept.is_finite() || self.weights.values().any(|w| !w.is_finite()) {
            return Err(CalibrationError::SchemaMismatch(
                "non-finite coefficient".to_string(),
            ));
        }
        Ok(())
    }
}
