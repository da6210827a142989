//! Validation of raw input series before they enter the pipeline.
//!
//! Checks coverage, finiteness, calendar continuity and level sanity.
//! Failures are reported, never fatal: the aligner and indicator builder
//! already degrade gracefully on the conditions flagged here.

pub mod series_integrity;

pub use series_integrity::{
    CheckResult, SeriesIntegrityReport, SeriesIntegrityValidator, MAX_GAP_DAYS,
};
