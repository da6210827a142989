//! Percentile scoring of raw indicators.
//!
//! Each raw value is ranked against the indicator's own trailing history up
//! to and including its date. Ties take the average of the positions they
//! could occupy (midrank), and the rank fraction is mapped to `[0, 100]`.
//! Inverted indicators are flipped to `100 - score`.
//!
//! Dates with fewer than `min_periods` trailing observations get no score.
//! That is the expected warm-up of every series, not an error.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Series, TimePoint};
use crate::indicators::{IndicatorKind, Polarity, RawIndicator, RawIndicatorSet};

use super::rank_tree::RankTree;

/// Quantile clipping of the trailing history before ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Winsorize {
    pub lower_q: f64,
    pub upper_q: f64,
}

impl Default for Winsorize {
    fn default() -> Self {
        Self {
            lower_q: 0.01,
            upper_q: 0.99,
        }
    }
}

/// Scorer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Minimum trailing observations before a score is produced.
    pub min_periods: usize,
    /// Maximum trailing observations; `None` ranks against all history.
    pub window: Option<usize>,
    /// Optional winsorization of the trailing history.
    pub winsorize: Option<Winsorize>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            min_periods: 252,
            window: None,
            winsorize: None,
        }
    }
}

/// Per-indicator 0-100 score series.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSeries {
    pub kind: IndicatorKind,
    pub series: Series,
}

/// Converts raw indicators into trailing percentile scores.
#[derive(Debug, Clone, Default)]
pub struct PercentileScorer {
    config: ScorerConfig,
}

impl PercentileScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score one raw indicator.
    pub fn score(&self, indicator: &RawIndicator) -> ScoreSeries {
        let series = self
            .score_series(&indicator.series, indicator.polarity())
            .renamed(format!("score_{}", indicator.kind.name()));
        ScoreSeries {
            kind: indicator.kind,
            series,
        }
    }

    /// Score every indicator of a set in parallel, keeping set order.
    pub fn score_all(&self, set: &RawIndicatorSet) -> Vec<ScoreSeries> {
        set.indicators
            .par_iter()
            .map(|indicator| {
                let scored = self.score(indicator);
                debug!(
                    "Scored {}: {} of {} dates",
                    indicator.kind,
                    scored.series.len(),
                    indicator.series.len()
                );
                scored
            })
            .collect()
    }

    /// Trailing percentile score of every date of a raw series.
    ///
    /// Non-finite observations are skipped and do not count as history.
    pub fn score_series(&self, raw: &Series, polarity: Polarity) -> Series {
        let observed: Vec<TimePoint> = raw.iter().copied().filter(|p| p.is_finite()).collect();
        let mut tree = RankTree::with_universe(observed.iter().map(|p| p.value));
        let min_periods = self.config.min_periods.max(1);

        let mut points = Vec::with_capacity(observed.len().saturating_sub(min_periods - 1));
        for (i, point) in observed.iter().enumerate() {
            tree.insert(point.value);
            if let Some(window) = self.config.window {
                if i >= window {
                    tree.remove(observed[i - window].value);
                }
            }
            if tree.len() < min_periods {
                continue;
            }

            let rank = match self.config.winsorize {
                Some(w) => winsorized_rank(&tree, point.value, w),
                None => tree.midrank_pct(point.value),
            };
            if let Some(rank) = rank {
                let score = 100.0 * rank;
                let score = match polarity {
                    Polarity::Direct => score,
                    Polarity::Inverted => 100.0 - score,
                };
                points.push(TimePoint::new(point.date, score.clamp(0.0, 100.0)));
            }
        }
        Series::from_sorted(raw.name(), points)
    }
}

/// Midrank of `value` after clipping every held value (and `value`) to the
/// history's `[lower_q, upper_q]` quantiles.
fn winsorized_rank(tree: &RankTree, value: f64, w: Winsorize) -> Option<f64> {
    let n = tree.len();
    let low = tree.quantile(w.lower_q)?;
    let high = tree.quantile(w.upper_q)?;
    if n == 0 || low > high {
        return None;
    }
    let clipped = value.clamp(low, high);

    // Clipping maps everything below `low` onto `low` and everything above
    // `high` onto `high`; ranks are counted on the clipped multiset.
    let (less, equal) = if low == high {
        (0, n)
    } else if clipped == low {
        (0, tree.count_less_equal(low))
    } else if clipped == high {
        (tree.count_less(high), n - tree.count_less(high))
    } else {
        (tree.count_less(clipped), tree.count_equal(clipped))
    };
    if equal == 0 {
        return None;
    }
    Some((less as f64 + (equal as f64 + 1.0) / 2.0) / n as f64)
}
