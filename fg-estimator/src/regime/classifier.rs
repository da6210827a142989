//! Sentiment regime classifier.
//!
//! Maps a composite score onto five ordered regimes using half-open
//! intervals, the last one closed at 100.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Series;

/// Sentiment regime, ordered from most fearful to most greedy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentRegime {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentRegime {
    pub const ALL: [SentimentRegime; 5] = [
        Self::ExtremeFear,
        Self::Fear,
        Self::Neutral,
        Self::Greed,
        Self::ExtremeGreed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtremeFear => "extreme_fear",
            Self::Fear => "fear",
            Self::Neutral => "neutral",
            Self::Greed => "greed",
            Self::ExtremeGreed => "extreme_greed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.iter().copied().find(|r| r.as_str() == normalized)
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExtremeFear => "Extreme Fear",
            Self::Fear => "Fear",
            Self::Neutral => "Neutral",
            Self::Greed => "Greed",
            Self::ExtremeGreed => "Extreme Greed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ExtremeFear => "Investors are extremely worried; capitulation risk",
            Self::Fear => "Risk appetite is below its historical norm",
            Self::Neutral => "Sentiment near its historical middle",
            Self::Greed => "Risk appetite is above its historical norm",
            Self::ExtremeGreed => "Investors are euphoric; complacency risk",
        }
    }
}

impl fmt::Display for SentimentRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Regime boundaries must be strictly increasing inside (0, 100), got {fear}/{neutral}/{greed}/{extreme_greed}")]
pub struct InvalidBoundaries {
    pub fear: f64,
    pub neutral: f64,
    pub greed: f64,
    pub extreme_greed: f64,
}

/// Lower bound of each regime above ExtremeFear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeBoundaries {
    pub fear: f64,
    pub neutral: f64,
    pub greed: f64,
    pub extreme_greed: f64,
}

impl Default for RegimeBoundaries {
    fn default() -> Self {
        Self {
            fear: 25.0,
            neutral: 45.0,
            greed: 55.0,
            extreme_greed: 75.0,
        }
    }
}

impl RegimeBoundaries {
    pub fn validate(&self) -> Result<(), InvalidBoundaries> {
        let bounds = [0.0, self.fear, self.neutral, self.greed, self.extreme_greed, 100.0];
        if bounds.windows(2).all(|w| w[0] < w[1]) {
            Ok(())
        } else {
            Err(InvalidBoundaries {
                fear: self.fear,
                neutral: self.neutral,
                greed: self.greed,
                extreme_greed: self.extreme_greed,
            })
        }
    }
}

/// Per-regime statistics over a score series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeStats {
    pub regime: SentimentRegime,
    pub days: usize,
    pub pct_of_total: f64,
    pub avg_score: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl RegimeStats {
    fn new(regime: SentimentRegime) -> Self {
        Self {
            regime,
            days: 0,
            pct_of_total: 0.0,
            avg_score: 0.0,
            first_date: None,
            last_date: None,
        }
    }
}

/// Sentiment regime classifier.
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    boundaries: RegimeBoundaries,
}

impl RegimeClassifier {
    pub fn new(boundaries: RegimeBoundaries) -> Self {
        Self { boundaries }
    }

    pub fn boundaries(&self) -> &RegimeBoundaries {
        &self.boundaries
    }

    /// Classify a score. Values outside `[0, 100]` are clamped first;
    /// non-finite values are Neutral.
    pub fn classify(&self, score: f64) -> SentimentRegime {
        if !score.is_finite() {
            return SentimentRegime::Neutral;
        }
        let score = score.clamp(0.0, 100.0);
        let b = &self.boundaries;

        if score < b.fear {
            SentimentRegime::ExtremeFear
        } else if score < b.neutral {
            SentimentRegime::Fear
        } else if score < b.greed {
            SentimentRegime::Neutral
        } else if score < b.extreme_greed {
            SentimentRegime::Greed
        } else {
            SentimentRegime::ExtremeGreed
        }
    }

    /// Classify a possibly unavailable score; unavailable is Neutral.
    pub fn classify_opt(&self, score: Option<f64>) -> SentimentRegime {
        score.map_or(SentimentRegime::Neutral, |s| self.classify(s))
    }

    /// Regime of every point of a score series.
    pub fn classify_series(&self, series: &Series) -> Vec<(NaiveDate, SentimentRegime)> {
        series
            .iter()
            .map(|p| (p.date, self.classify(p.value)))
            .collect()
    }

    /// Day counts, shares and average score per regime.
    ///
    /// Every regime is present in the result, with zero days if unseen.
    pub fn stats(&self, series: &Series) -> BTreeMap<SentimentRegime, RegimeStats> {
        let mut stats: BTreeMap<SentimentRegime, RegimeStats> = SentimentRegime::ALL
            .iter()
            .map(|r| (*r, RegimeStats::new(*r)))
            .collect();
        let mut sums: BTreeMap<SentimentRegime, f64> = BTreeMap::new();

        for p in series.iter() {
            let regime = self.classify(p.value);
            if let Some(entry) = stats.get_mut(&regime) {
                entry.days += 1;
                entry.first_date.get_or_insert(p.date);
                entry.last_date = Some(p.date);
            }
            if p.is_finite() {
                *sums.entry(regime).or_insert(0.0) += p.value.clamp(0.0, 100.0);
            }
        }

        let total = series.len();
        for entry in stats.values_mut() {
            if entry.days > 0 {
                entry.pct_of_total = entry.days as f64 / total as f64 * 100.0;
                entry.avg_score = sums.get(&entry.regime).copied().unwrap_or(0.0) / entry.days as f64;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimePoint;

    #[test]
    fn test_boundaries() {
        let c = RegimeClassifier::default();
        assert_eq!(c.classify(0.0), SentimentRegime::ExtremeFear);
        assert_eq!(c.classify(24.999), SentimentRegime::ExtremeFear);
        assert_eq!(c.classify(25.0), SentimentRegime::Fear);
        assert_eq!(c.classify(45.0), SentimentRegime::Neutral);
        assert_eq!(c.classify(55.0), SentimentRegime::Greed);
        assert_eq!(c.classify(74.999), SentimentRegime::Greed);
        assert_eq!(c.classify(75.0), SentimentRegime::ExtremeGreed);
        assert_eq!(c.classify(100.0), SentimentRegime::ExtremeGreed);
    }

    #[test]
    fn test_out_of_range_and_non_finite() {
        let c = RegimeClassifier::default();
        assert_eq!(c.classify(-12.0), SentimentRegime::ExtremeFear);
        assert_eq!(c.classify(140.0), SentimentRegime::ExtremeGreed);
        assert_eq!(c.classify(f64::NAN), SentimentRegime::Neutral);
        assert_eq!(c.classify(f64::INFINITY), SentimentRegime::Neutral);
        assert_eq!(c.classify_opt(None), SentimentRegime::Neutral);
        assert_eq!(c.classify_opt(Some(10.0)), SentimentRegime::ExtremeFear);
    }

    #[test]
    fn test_total_and_monotone() {
        let c = RegimeClassifier::default();
        let mut previous = SentimentRegime::ExtremeFear;
        for i in 0..=1000 {
            let regime = c.classify(i as f64 / 10.0);
            assert!(regime >= previous);
            previous = regime;
        }
        assert_eq!(previous, SentimentRegime::ExtremeGreed);
    }

    #[test]
    fn test_custom_boundaries_validate() {
        assert!(RegimeBoundaries::default().validate().is_ok());
        let bad = RegimeBoundaries {
            fear: 30.0,
            neutral: 20.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let at_edge = RegimeBoundaries {
            fear: 0.0,
            ..Default::default()
        };
        assert!(at_edge.validate().is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(SentimentRegime::from_str("Extreme Greed"), Some(SentimentRegime::ExtremeGreed));
        assert_eq!(SentimentRegime::from_str("extreme-fear"), Some(SentimentRegime::ExtremeFear));
        assert_eq!(SentimentRegime::from_str("panic"), None);
    }

    #[test]
    fn test_stats() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let values = [10.0, 20.0, 50.0, 80.0];
        let series = Series::new(
            "fgi",
            values
                .iter()
                .enumerate()
                .map(|(i, v)| TimePoint::new(start + chrono::Duration::days(i as i64), *v))
                .collect(),
        )
        .unwrap();

        let stats = RegimeClassifier::default().stats(&series);
        let fear = &stats[&SentimentRegime::ExtremeFear];
        assert_eq!(fear.days, 2);
        assert!((fear.pct_of_total - 50.0).abs() < 1e-12);
        assert!((fear.avg_score - 15.0).abs() < 1e-12);
        assert_eq!(fear.last_date, Some(start + chrono::Duration::days(1)));
        assert_eq!(stats[&SentimentRegime::Greed].days, 0);
        assert_eq!(stats.len(), 5);
    }
}
