//! Unweighted mean of the component scores available at each date.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::scoring::ScoreSeries;

use super::index::{AggregationStrategy, CompositeIndex, CompositePoint};

/// Mean of all scores present at each date.
///
/// A component missing at a date is left out of both the sum and the
/// count. Dates where no component has a score are absent.
pub fn naive_composite(scores: &[ScoreSeries]) -> CompositeIndex {
    let mut totals: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for score in scores {
        for p in score.series.iter().filter(|p| p.is_finite()) {
            let entry = totals.entry(p.date).or_insert((0.0, 0));
            entry.0 += p.value;
            entry.1 += 1;
        }
    }

    let points = totals
        .into_iter()
        .map(|(date, (sum, count))| {
            let mean = sum / count as f64;
            CompositePoint {
                date,
                value: mean.clamp(0.0, 100.0),
                raw: mean,
                components: count,
            }
        })
        .collect();

    CompositeIndex::new(AggregationStrategy::Naive, points, None)
}
