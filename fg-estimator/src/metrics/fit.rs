//! Calibration fit diagnostics.
//!
//! Measures how closely a calibrated composite tracks its benchmark over
//! the fit window.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::composite::{CalibrationError, CalibrationModel, FittedPoint};
use crate::data::Series;
use crate::scoring::ScoreSeries;

/// Goodness-of-fit statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub observations: usize,
    /// Fitted parameters, intercept included.
    pub parameters: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub rmse: f64,
    pub mae: f64,
    pub max_abs_residual: f64,
    pub mean_residual: f64,
    /// Pearson correlation of fitted and observed values.
    pub correlation: f64,
}

impl FitMetrics {
    /// Evaluate a model on the window where it and the benchmark overlap.
    pub fn evaluate(
        model: &CalibrationModel,
        scores: &[ScoreSeries],
        benchmark: &Series,
    ) -> Result<Self, CalibrationError> {
        let points = model.in_sample(scores, benchmark)?;
        Ok(Self::from_points(&points, model.weights.len() + 1))
    }

    pub fn from_points(points: &[FittedPoint], parameters: usize) -> Self {
        let n = points.len();
        if n == 0 {
            return Self {
                parameters,
                ..Default::default()
            };
        }

        let actual: Vec<f64> = points.iter().map(|p| p.actual).collect();
        let fitted: Vec<f64> = points.iter().map(|p| p.fitted).collect();
        let residuals: Vec<f64> = points.iter().map(|p| p.residual()).collect();

        let mean_actual = actual.iter().mean();
        let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
        let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();

        let r_squared = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };
        let adj_r_squared = if n > parameters {
            1.0 - (1.0 - r_squared) * (n - 1) as f64 / (n - parameters) as f64
        } else {
            r_squared
        };

        let correlation = if n > 1 {
            let denom = actual.iter().std_dev() * fitted.iter().std_dev();
            if denom > 0.0 {
                actual.iter().covariance(fitted.iter()) / denom
            } else {
                0.0
            }
        } else {
            0.0
        };

        Self {
            observations: n,
            parameters,
            r_squared,
            adj_r_squared,
            rmse: (ss_res / n as f64).sqrt(),
            mae: residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64,
            max_abs_residual: residuals.iter().abs_max(),
            mean_residual: residuals.iter().mean(),
            correlation,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Calibration Fit\n\
             ===============\n\
             Observations: {} ({} parameters)\n\
             R-squared: {:.4} (adjusted {:.4})\n\
             RMSE: {:.3}\n\
             MAE: {:.3}\n\
             Max |residual|: {:.3}\n\
             Correlation: {:.4}",
            self.observations,
            self.parameters,
            self.r_squared,
            self.adj_r_squared,
            self.rmse,
            self.mae,
            self.max_abs_residual,
            self.correlation
        )
    }
}
