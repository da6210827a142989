//! Percentile normalization of raw indicators onto a 0-100 scale.

pub mod percentile;
pub mod rank_tree;

pub use percentile::{PercentileScorer, ScoreSeries, ScorerConfig, Winsorize};
pub use rank_tree::RankTree;
