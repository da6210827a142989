pub mod align;
pub mod composite;
pub mod data;
pub mod indicators;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod regime;
pub mod scoring;
pub mod validation;

// Re-export commonly used types
pub use data::{InputKey, InputSet, Series, SeriesLoader, TimePoint};
pub use align::{AlignedFrame, CalendarAligner};
pub use indicators::{IndicatorBuilder, IndicatorKind, Polarity};
pub use scoring::{PercentileScorer, ScoreSeries};
pub use composite::{AggregationStrategy, CalibrationModel, CompositeAggregator, CompositeIndex};
pub use regime::{RegimeClassifier, SentimentRegime};
pub use pipeline::{PipelineConfig, PipelineResult, PipelineWarning, SentimentPipeline};
pub use output::{ChartPayload, PayloadOptions, RangePreset};
