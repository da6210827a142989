//! Calendar alignment.
//!
//! Builds the single business-day timeline every indicator is computed on.

pub mod calendar;

pub use calendar::{AlignedColumn, AlignedFrame, AlignerConfig, CalendarAligner};
