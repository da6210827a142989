//! Pipeline configuration.
//!
//! Every section is optional in the TOML file and falls back to the
//! defaults of the component it configures.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::align::AlignerConfig;
use crate::composite::AggregationStrategy;
use crate::indicators::IndicatorWindows;
use crate::regime::{InvalidBoundaries, RegimeBoundaries};
use crate::scoring::ScorerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Window '{0}' must be at least 1")]
    InvalidWindow(&'static str),

    #[error("min_periods must be at least 1")]
    InvalidMinPeriods,

    #[error("Rolling window {window} is shorter than min_periods {min_periods}")]
    WindowShorterThanMinPeriods { window: usize, min_periods: usize },

    #[error("Winsorize quantiles must satisfy 0 <= lower < upper <= 1, got {lower}/{upper}")]
    InvalidQuantiles { lower: f64, upper: f64 },

    #[error(transparent)]
    Regime(#[from] InvalidBoundaries),
}

/// Aggregation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub strategy: AggregationStrategy,
    /// Stored calibration model, used when no benchmark is supplied.
    pub model_path: Option<PathBuf>,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub aligner: AlignerConfig,
    pub windows: IndicatorWindows,
    pub scoring: ScorerConfig,
    pub regime: RegimeBoundaries,
    pub aggregation: AggregationConfig,
}

impl PipelineConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((name, _)) = self.windows.all().iter().find(|(_, w)| *w == 0) {
            return Err(ConfigError::InvalidWindow(*name));
        }

        let scoring = &self.scoring;
        if scoring.min_periods == 0 {
            return Err(ConfigError::InvalidMinPeriods);
        }
        if let Some(window) = scoring.window {
            if window < scoring.min_periods {
                return Err(ConfigError::WindowShorterThanMinPeriods {
                    window,
                    min_periods: scoring.min_periods,
                });
            }
        }
        if let Some(w) = scoring.winsorize {
            let ordered = 0.0 <= w.lower_q && w.lower_q < w.upper_q && w.upper_q <= 1.0;
            if !ordered {
                return Err(ConfigError::InvalidQuantiles {
                    lower: w.lower_q,
                    upper: w.upper_q,
                });
            }
        }

        self.regime.validate()?;
        Ok(())
    }
}
