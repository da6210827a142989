//! Composite aggregation of component scores.
//!
//! Two strategies:
//! - Naive: mean of the scores available on each date
//! - Calibrated: OLS weights fitted against a benchmark index

pub mod aggregator;
pub mod calibration;
pub mod index;
pub mod naive;

pub use aggregator::{CalibrationKey, CompositeAggregator};
pub use calibration::{fit_window, CalibrationError, CalibrationModel, FittedPoint, SCHEMA_VERSION};
pub use index::{AggregationStrategy, CompositeIndex, CompositePoint};
pub use naive::naive_composite;
