//! Strategy selection and the keyed calibration cache.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::data::Series;
use crate::indicators::IndicatorKind;
use crate::scoring::ScoreSeries;

use super::calibration::{fit_window, CalibrationError, CalibrationModel, SCHEMA_VERSION};
use super::index::{AggregationStrategy, CompositeIndex};
use super::naive::naive_composite;

/// Identity of a fitted model: which benchmark, which fit window (the
/// overlap of the benchmark with every score), which indicators under which
/// definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalibrationKey {
    pub benchmark: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub indicators: Vec<IndicatorKind>,
    pub schema_version: u32,
}

impl CalibrationKey {
    /// Key for fitting `scores` against `benchmark`. Fails when the two
    /// have no usable overlap.
    pub fn new(scores: &[ScoreSeries], benchmark: &Series) -> Result<Self, CalibrationError> {
        let (from, to) = fit_window(scores, benchmark)?;
        let mut indicators: Vec<IndicatorKind> = scores.iter().map(|s| s.kind).collect();
        indicators.sort();
        Ok(Self {
            benchmark: benchmark.name().to_string(),
            from,
            to,
            indicators,
            schema_version: SCHEMA_VERSION,
        })
    }
}

/// Combines component scores into a composite index.
///
/// Fitted models are cached by [`CalibrationKey`] and only dropped through
/// [`invalidate`](Self::invalidate) or [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct CompositeAggregator {
    strategy: AggregationStrategy,
    cache: HashMap<CalibrationKey, CalibrationModel>,
    stored: Option<CalibrationModel>,
}

impl CompositeAggregator {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Use a previously fitted model when no benchmark is supplied.
    pub fn with_model(mut self, model: CalibrationModel) -> Self {
        self.stored = Some(model);
        self
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    pub fn stored_model(&self) -> Option<&CalibrationModel> {
        self.stored.as_ref()
    }

    /// Number of cached models.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn invalidate(&mut self, key: &CalibrationKey) -> Option<CalibrationModel> {
        self.cache.remove(key)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Fit (or fetch from cache) the model for `scores` against `benchmark`.
    pub fn calibrate(
        &mut self,
        scores: &[ScoreSeries],
        benchmark: &Series,
    ) -> Result<&CalibrationModel, CalibrationError> {
        let key = CalibrationKey::new(scores, benchmark)?;
        if self.cache.contains_key(&key) {
            debug!("Calibration cache hit for {} ({} to {})", key.benchmark, key.from, key.to);
        } else {
            let model = CalibrationModel::fit(scores, benchmark)?;
            self.cache.insert(key.clone(), model);
        }
        self.cache.get(&key).ok_or(CalibrationError::NoModel)
    }

    /// Aggregate with the configured strategy.
    ///
    /// The calibrated path fits against `benchmark` when given, otherwise it
    /// applies the stored model. Its errors are returned as-is; choosing a
    /// fallback is up to the caller.
    pub fn aggregate(
        &mut self,
        scores: &[ScoreSeries],
        benchmark: Option<&Series>,
    ) -> Result<CompositeIndex, CalibrationError> {
        match self.strategy {
            AggregationStrategy::Naive => Ok(self.naive(scores)),
            AggregationStrategy::Calibrated => {
                let model = match benchmark {
                    Some(benchmark) => self.calibrate(scores, benchmark)?,
                    None => self.stored.as_ref().ok_or(CalibrationError::NoModel)?,
                };
                let index = model.apply(scores)?;
                info!("Calibrated composite over {} dates", index.len());
                Ok(index)
            }
        }
    }

    pub fn naive(&self, scores: &[ScoreSeries]) -> CompositeIndex {
        let index = naive_composite(scores);
        info!("Naive composite over {} dates", index.len());
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimePoint;
    use chrono::Duration;

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 1).unwrap() + Duration::days(i as i64)
    }

    fn series(name: &str, values: &[f64]) -> Series {
        Series::new(
            name,
            values
                .iter()
                .enumerate()
                .map(|(i, v)| TimePoint::new(date(i), *v))
                .collect(),
        )
        .unwrap()
    }

    fn scores() -> Vec<ScoreSeries> {
        let a: Vec<f64> = (0..30).map(|i| ((i * 31) % 89) as f64).collect();
        let b: Vec<f64> = (0..30).map(|i| ((i * 19 + 3) % 83) as f64).collect();
        vec![
            ScoreSeries {
                kind: IndicatorKind::Momentum,
                series: series("momentum", &a),
            },
            ScoreSeries {
                kind: IndicatorKind::CreditSpread,
                series: series("credit_spread", &b),
            },
        ]
    }

    fn benchmark(scores: &[ScoreSeries]) -> Series {
        let values: Vec<f64> = scores[0]
            .series
            .iter()
            .zip(scores[1].series.iter())
            .map(|(a, b)| 8.0 + 0.5 * a.value + 0.25 * b.value)
            .collect();
        series("cnn_fgi", &values)
    }

    #[test]
    fn test_naive_strategy_ignores_benchmark() {
        let scores = scores();
        let mut aggregator = CompositeAggregator::new(AggregationStrategy::Naive);
        let index = aggregator.aggregate(&scores, Some(&benchmark(&scores))).unwrap();
        assert_eq!(index.strategy(), AggregationStrategy::Naive);
        assert_eq!(aggregator.cached(), 0);
    }

    #[test]
    fn test_calibrated_caches_model() {
        let scores = scores();
        let bench = benchmark(&scores);
        let mut aggregator = CompositeAggregator::new(AggregationStrategy::Calibrated);

        let first = aggregator.aggregate(&scores, Some(&bench)).unwrap();
        let second = aggregator.aggregate(&scores, Some(&bench)).unwrap();
        assert_eq!(aggregator.cached(), 1);
        assert_eq!(first, second);
        assert!((first.points()[0].raw - bench.points()[0].value).abs() < 1e-8);

        let key = CalibrationKey::new(&scores, &bench).unwrap();
        assert!(aggregator.invalidate(&key).is_some());
        assert_eq!(aggregator.cached(), 0);
    }

    #[test]
    fn test_cache_keyed_by_fit_window() {
        let bench = series("cnn_fgi", &(0..60).map(|i| 20.0 + i as f64 * 0.5).collect::<Vec<_>>());

        // scores on dates 40..60 rising with the benchmark
        let late = ScoreSeries {
            kind: IndicatorKind::Momentum,
            series: Series::new(
                "momentum",
                (40..60)
                    .map(|i| TimePoint::new(date(i), bench.points()[i].value * 2.0 - 10.0))
                    .collect(),
            )
            .unwrap(),
        };
        // scores on every date falling as the benchmark rises
        let full = ScoreSeries {
            kind: IndicatorKind::Momentum,
            series: series(
                "momentum",
                &bench.points().iter().map(|p| 100.0 - p.value * 2.0).collect::<Vec<_>>(),
            ),
        };

        let mut aggregator = CompositeAggregator::new(AggregationStrategy::Calibrated);
        let first = aggregator.calibrate(&[late], &bench).unwrap().clone();
        assert_eq!(first.fitted_from, date(40));
        assert!((first.weight(IndicatorKind::Momentum).unwrap() - 0.5).abs() < 1e-8);

        let second = aggregator.calibrate(&[full], &bench).unwrap().clone();
        assert_eq!(aggregator.cached(), 2);
        assert_eq!(second.fitted_from, date(0));
        assert_eq!(second.observations, 60);
        assert!((second.weight(IndicatorKind::Momentum).unwrap() + 0.5).abs() < 1e-8);
    }

    #[test]
    fn test_calibrated_without_model_fails() {
        let mut aggregator = CompositeAggregator::new(AggregationStrategy::Calibrated);
        let err = aggregator.aggregate(&scores(), None).unwrap_err();
        assert!(matches!(err, CalibrationError::NoModel));
    }

    #[test]
    fn test_stored_model_used_without_benchmark() {
        let scores = scores();
        let model = CalibrationModel::fit(&scores, &benchmark(&scores)).unwrap();
        let mut aggregator =
            CompositeAggregator::new(AggregationStrategy::Calibrated).with_model(model.clone());

        let index = aggregator.aggregate(&scores, None).unwrap();
        assert_eq!(index.model(), Some(&model));
        assert_eq!(index.len(), 30);
    }

    #[test]
    fn test_degenerate_fit_surfaces() {
        let scores = scores();
        let short = series("cnn_fgi", &[50.0, 51.0]);
        let mut aggregator = CompositeAggregator::new(AggregationStrategy::Calibrated);
        let err = aggregator.aggregate(&scores, Some(&short)).unwrap_err();
        assert!(err.is_degenerate());
        assert_eq!(aggregator.cached(), 0);
    }
}
