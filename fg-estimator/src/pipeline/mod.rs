//! End-to-end sentiment index computation.
//!
//! Orchestrates one batch run:
//! 1. Integrity checks on every raw input (reported, never fatal)
//! 2. Calendar alignment of the market inputs
//! 3. Raw indicator construction (parallel across indicators)
//! 4. Percentile scoring (parallel across indicators)
//! 5. Composite aggregation, falling back to the naive mean when the
//!    calibrated path cannot produce a model
//!
//! Soft failures are logged and collected as [`PipelineWarning`]s on the
//! result. Only an invalid configuration (or an unreadable stored model)
//! stops the pipeline.

pub mod config;

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::align::{AlignedFrame, CalendarAligner};
use crate::composite::{
    AggregationStrategy, CalibrationError, CalibrationModel, CompositeAggregator, CompositeIndex,
};
use crate::data::{InputKey, InputSet};
use crate::indicators::{IndicatorBuilder, IndicatorKind, RawIndicatorSet};
use crate::metrics::FitMetrics;
use crate::regime::{RegimeClassifier, RegimeStats, SentimentRegime};
use crate::scoring::{PercentileScorer, ScoreSeries};
use crate::validation::{SeriesIntegrityReport, SeriesIntegrityValidator};

pub use config::{AggregationConfig, ConfigError, PipelineConfig};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("No benchmark series supplied")]
    MissingBenchmark,
}

/// A condition the pipeline recovered from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    #[error("Indicator {indicator} unavailable: input {input} missing")]
    MissingInput {
        indicator: IndicatorKind,
        input: InputKey,
    },

    #[error("{count} non-finite values in {input} treated as missing")]
    NonFiniteValues { input: InputKey, count: usize },

    #[error("Calibrated aggregation unavailable, used naive mean: {reason}")]
    CalibrationFallback { reason: String },
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub frame: AlignedFrame,
    pub indicators: RawIndicatorSet,
    pub scores: Vec<ScoreSeries>,
    pub composite: CompositeIndex,
    /// Strategy the configuration asked for; the composite records the one
    /// actually used.
    pub requested: AggregationStrategy,
    pub integrity: Vec<SeriesIntegrityReport>,
    pub warnings: Vec<PipelineWarning>,
    classifier: RegimeClassifier,
}

impl PipelineResult {
    pub fn score(&self, kind: IndicatorKind) -> Option<&ScoreSeries> {
        self.scores.iter().find(|s| s.kind == kind)
    }

    /// Regime of every composite date.
    pub fn regimes(&self) -> Vec<(NaiveDate, SentimentRegime)> {
        self.classifier.classify_series(&self.composite.to_series())
    }

    /// Regime on a date; dates without a composite value are Neutral.
    pub fn regime_at(&self, date: NaiveDate) -> SentimentRegime {
        self.classifier
            .classify_opt(self.composite.get(date).map(|p| p.value))
    }

    pub fn last_regime(&self) -> Option<SentimentRegime> {
        self.composite.last().map(|p| self.classifier.classify(p.value))
    }

    pub fn regime_stats(&self) -> BTreeMap<SentimentRegime, RegimeStats> {
        self.classifier.stats(&self.composite.to_series())
    }

    pub fn classifier(&self) -> &RegimeClassifier {
        &self.classifier
    }

    /// Whether the calibrated path was asked for but not used.
    pub fn fell_back(&self) -> bool {
        self.requested != self.composite.strategy()
    }
}

/// Fitted model with its diagnostics.
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub model: CalibrationModel,
    pub metrics: FitMetrics,
}

/// Scores and everything they were derived from.
struct Components {
    frame: AlignedFrame,
    indicators: RawIndicatorSet,
    scores: Vec<ScoreSeries>,
    integrity: Vec<SeriesIntegrityReport>,
    warnings: Vec<PipelineWarning>,
}

/// Sentiment index pipeline.
///
/// Holds no state between runs apart from the aggregator's calibration
/// cache, which callers invalidate explicitly through
/// [`aggregator_mut`](Self::aggregator_mut).
#[derive(Debug)]
pub struct SentimentPipeline {
    config: PipelineConfig,
    validator: SeriesIntegrityValidator,
    aligner: CalendarAligner,
    builder: IndicatorBuilder,
    scorer: PercentileScorer,
    aggregator: CompositeAggregator,
    classifier: RegimeClassifier,
}

impl SentimentPipeline {
    /// Validate the configuration and assemble the stages.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut aggregator = CompositeAggregator::new(config.aggregation.strategy);
        if let Some(path) = &config.aggregation.model_path {
            let model = CalibrationModel::load(path)?;
            info!("Loaded calibration model from {}", path.display());
            aggregator = aggregator.with_model(model);
        }

        Ok(Self {
            validator: SeriesIntegrityValidator::new(),
            aligner: CalendarAligner::new(config.aligner.clone()),
            builder: IndicatorBuilder::new(config.windows.clone()),
            scorer: PercentileScorer::new(config.scoring.clone()),
            classifier: RegimeClassifier::new(config.regime.clone()),
            aggregator,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn aggregator_mut(&mut self) -> &mut CompositeAggregator {
        &mut self.aggregator
    }

    /// Run the full pipeline over one input set.
    ///
    /// The benchmark input, when present, is used only by the calibrated
    /// strategy.
    pub fn run(&mut self, inputs: &InputSet) -> PipelineResult {
        let started = Instant::now();
        let Components {
            frame,
            indicators,
            scores,
            integrity,
            mut warnings,
        } = self.components(inputs);

        let requested = self.aggregator.strategy();
        let composite = match self.aggregator.aggregate(&scores, inputs.benchmark()) {
            Ok(index) => index,
            Err(e) => {
                warn!("Calibrated aggregation failed, falling back to naive: {}", e);
                warnings.push(PipelineWarning::CalibrationFallback {
                    reason: e.to_string(),
                });
                self.aggregator.naive(&scores)
            }
        };

        info!(
            "Pipeline finished in {:.2?}: {} dates, {} components, {} warnings",
            started.elapsed(),
            composite.len(),
            scores.len(),
            warnings.len()
        );

        PipelineResult {
            frame,
            indicators,
            scores,
            composite,
            requested,
            integrity,
            warnings,
            classifier: self.classifier.clone(),
        }
    }

    /// Fit a calibration model against the input set's benchmark.
    pub fn calibrate(&mut self, inputs: &InputSet) -> Result<CalibrationReport, PipelineError> {
        let benchmark = inputs.benchmark().ok_or(PipelineError::MissingBenchmark)?;
        let components = self.components(inputs);

        let model = self
            .aggregator
            .calibrate(&components.scores, benchmark)?
            .clone();
        let metrics = FitMetrics::evaluate(&model, &components.scores, benchmark)?;
        info!(
            "Calibration R-squared {:.4} over {} observations",
            metrics.r_squared, metrics.observations
        );

        Ok(CalibrationReport { model, metrics })
    }

    fn components(&self, inputs: &InputSet) -> Components {
        let mut warnings = Vec::new();

        let integrity = self.validator.validate_all(inputs);
        for report in &integrity {
            if report.all_passed() {
                debug!("{}", report.summary());
            } else {
                info!("{}", report.summary());
                for check in report.failed_checks() {
                    debug!("  {}: {}", check.name, check.message);
                }
            }
        }

        for (key, series) in inputs.market() {
            let count = series.non_finite_count();
            if count > 0 {
                warn!("{} non-finite values in {}", count, key);
                warnings.push(PipelineWarning::NonFiniteValues { input: key, count });
            }
        }

        let frame = self.aligner.align(inputs.market());
        info!(
            "Aligned {} inputs on {} dates",
            frame.keys().count(),
            frame.len()
        );

        let indicators = self.builder.build(&frame);
        for unavailable in &indicators.unavailable {
            for input in &unavailable.missing {
                warnings.push(PipelineWarning::MissingInput {
                    indicator: unavailable.kind,
                    input: *input,
                });
            }
        }

        let scores = self.scorer.score_all(&indicators);

        Components {
            frame,
            indicators,
            scores,
            integrity,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Series, TimePoint};
    use crate::indicators::IndicatorWindows;
    use crate::scoring::ScorerConfig;
    use chrono::{Datelike, Duration, Weekday};

    fn business_days(n: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(n);
        let mut d = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        while dates.len() < n {
            if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(d);
            }
            d += Duration::days(1);
        }
        dates
    }

    fn wave(name: &str, dates: &[NaiveDate], level: f64, amp: f64, period: f64) -> Series {
        Series::new(
            name,
            dates
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let t = i as f64;
                    let v = level + amp * (t / period).sin() + 0.3 * amp * (t / (period * 0.37)).cos();
                    TimePoint::new(*d, v)
                })
                .collect(),
        )
        .unwrap()
    }

    fn market(n: usize) -> InputSet {
        let dates = business_days(n);
        InputSet::new()
            .with(InputKey::Equity, wave("equity", &dates, 3000.0, 200.0, 23.0))
            .with(InputKey::Volatility, wave("volatility", &dates, 20.0, 6.0, 11.0))
            .with(InputKey::Breadth, wave("breadth", &dates, 150.0, 12.0, 17.0))
            .with(InputKey::Treasury, wave("treasury", &dates, 120.0, 5.0, 29.0))
            .with(InputKey::HighYield, wave("high_yield", &dates, 80.0, 3.0, 13.0))
            .with(InputKey::CreditSpread, wave("credit_spread", &dates, 4.0, 1.0, 31.0))
            .with(InputKey::PutCall, wave("put_call", &dates, 0.9, 0.2, 7.0))
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            windows: IndicatorWindows {
                momentum: 20,
                trend: 40,
                breadth: 10,
                safe_haven: 5,
                junk_bond: 5,
                volatility: 10,
            },
            scoring: ScorerConfig {
                min_periods: 30,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_full_run() {
        let mut pipeline = SentimentPipeline::new(fast_config()).unwrap();
        let result = pipeline.run(&market(300));

        assert_eq!(result.scores.len(), 8);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert!(!result.composite.is_empty());
        assert!(result
            .composite
            .points()
            .iter()
            .all(|p| (0.0..=100.0).contains(&p.value)));
        assert_eq!(result.regimes().len(), result.composite.len());
        assert!(result.last_regime().is_some());
        assert!(!result.fell_back());
        assert_eq!(result.integrity.len(), 7);
    }

    #[test]
    fn test_default_windows_warm_up() {
        let mut pipeline = SentimentPipeline::new(PipelineConfig::default()).unwrap();
        let result = pipeline.run(&market(600));

        // Trend strength needs 200 days of average then 252 scores.
        let trend = result.score(IndicatorKind::TrendStrength).unwrap();
        assert_eq!(trend.series.len(), 600 - 199 - 251);
        let momentum = result.score(IndicatorKind::Momentum).unwrap();
        assert_eq!(momentum.series.len(), 600 - 124 - 251);
    }

    #[test]
    fn test_missing_put_call_is_soft() {
        let mut inputs = market(200);
        inputs.remove(InputKey::PutCall);
        let mut pipeline = SentimentPipeline::new(fast_config()).unwrap();
        let result = pipeline.run(&inputs);

        assert_eq!(result.scores.len(), 7);
        assert!(result.score(IndicatorKind::PutCall).is_none());
        assert_eq!(
            result.warnings,
            vec![PipelineWarning::MissingInput {
                indicator: IndicatorKind::PutCall,
                input: InputKey::PutCall
            }]
        );
    }

    #[test]
    fn test_non_finite_values_reported() {
        let dates = business_days(200);
        let mut inputs = market(200);
        let mut points: Vec<TimePoint> = inputs.get(InputKey::Volatility).unwrap().points().to_vec();
        points[100].value = f64::NAN;
        points[101].value = f64::INFINITY;
        inputs.insert(InputKey::Volatility, Series::new("volatility", points).unwrap());

        let mut pipeline = SentimentPipeline::new(fast_config()).unwrap();
        let result = pipeline.run(&inputs);

        assert!(result.warnings.contains(&PipelineWarning::NonFiniteValues {
            input: InputKey::Volatility,
            count: 2
        }));
        // Forward-filled from the prior day.
        assert_eq!(
            result.frame.value(InputKey::Volatility, dates[101]),
            inputs.get(InputKey::Volatility).unwrap().value_at(dates[99])
        );
        assert_eq!(result.scores.len(), 8);
    }

    #[test]
    fn test_calibration_fallback() {
        let mut inputs = market(200);
        let dates = business_days(200);
        inputs.insert(
            InputKey::Benchmark,
            Series::new("benchmark", vec![TimePoint::new(dates[150], 50.0)]).unwrap(),
        );
        let config = PipelineConfig {
            aggregation: AggregationConfig {
                strategy: AggregationStrategy::Calibrated,
                model_path: None,
            },
            ..fast_config()
        };
        let mut pipeline = SentimentPipeline::new(config).unwrap();
        let result = pipeline.run(&inputs);

        assert_eq!(result.composite.strategy(), AggregationStrategy::Naive);
        assert!(result.fell_back());
        assert!(matches!(
            result.warnings.last(),
            Some(PipelineWarning::CalibrationFallback { .. })
        ));
    }

    #[test]
    fn test_calibrated_run_tracks_benchmark() {
        let mut inputs = market(300);
        let naive = SentimentPipeline::new(fast_config()).unwrap().run(&inputs);
        inputs.insert(
            InputKey::Benchmark,
            naive.composite.to_series().renamed("benchmark"),
        );

        let config = PipelineConfig {
            aggregation: AggregationConfig {
                strategy: AggregationStrategy::Calibrated,
                model_path: None,
            },
            ..fast_config()
        };
        let mut pipeline = SentimentPipeline::new(config).unwrap();
        let report = pipeline.calibrate(&inputs).unwrap();
        assert!(report.metrics.r_squared > 0.999);
        assert_eq!(report.model.weights.len(), 8);

        let result = pipeline.run(&inputs);
        assert_eq!(result.composite.strategy(), AggregationStrategy::Calibrated);
        assert!(result.warnings.is_empty());
        assert_eq!(pipeline.aggregator_mut().cached(), 1);

        let last = result.composite.last().unwrap();
        let expected = naive.composite.get(last.date).unwrap().value;
        assert!((last.value - expected).abs() < 1e-6);
    }

    #[test]
    fn test_calibrate_requires_benchmark() {
        let mut pipeline = SentimentPipeline::new(fast_config()).unwrap();
        assert!(matches!(
            pipeline.calibrate(&market(100)),
            Err(PipelineError::MissingBenchmark)
        ));
    }

    #[test]
    fn test_empty_inputs_degrade() {
        let mut pipeline = SentimentPipeline::new(fast_config()).unwrap();
        let result = pipeline.run(&InputSet::new());

        assert!(result.composite.is_empty());
        assert!(result.scores.is_empty());
        assert_eq!(result.indicators.unavailable.len(), 8);
        assert_eq!(result.last_regime(), None);
        assert_eq!(
            result.regime_at(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
            SentimentRegime::Neutral
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = fast_config();
        config.scoring.min_periods = 0;
        assert!(matches!(
            SentimentPipeline::new(config),
            Err(PipelineError::Config(ConfigError::InvalidMinPeriods))
        ));
    }
}
