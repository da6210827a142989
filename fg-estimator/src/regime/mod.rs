//! Sentiment regime classification module.
//!
//! Buckets the composite index into five ordered regimes:
//! - Extreme Fear: [0, 25)
//! - Fear: [25, 45)
//! - Neutral: [45, 55)
//! - Greed: [55, 75)
//! - Extreme Greed: [75, 100]

pub mod classifier;

pub use classifier::{
    InvalidBoundaries, RegimeBoundaries, RegimeClassifier, RegimeStats, SentimentRegime,
};
