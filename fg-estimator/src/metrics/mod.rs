//! Calibration diagnostics module.
//!
//! Provides goodness-of-fit statistics for a calibrated composite:
//! - R-squared, adjusted R-squared
//! - RMSE, MAE, largest residual
//! - Correlation with the benchmark

pub mod fit;

pub use fit::FitMetrics;
