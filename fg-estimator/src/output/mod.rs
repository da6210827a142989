//! Serving-layer payloads built from pipeline results.

pub mod payload;

pub use payload::{
    ChartPayload, ComponentRow, PayloadError, PayloadMeta, PayloadOptions, RangePreset,
    SeriesPoint, FGI_KEY, RAW_PREFIX, SCORE_PREFIX,
};
