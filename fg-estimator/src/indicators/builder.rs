//! Raw sentiment indicator construction.
//!
//! Derives the signed raw indicators from the aligned frame. Each indicator
//! is a [`Series`] holding only the dates where it is defined: dates before
//! a moving-average or return window fills are omitted, never zero-filled.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::align::AlignedFrame;
use crate::data::{InputKey, Series, TimePoint};

use super::rolling::{deviation_from_average, difference, trailing_return};

/// Whether a high raw value signals greed or fear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Higher raw value = more greed.
    Direct,
    /// Higher raw value = more fear.
    Inverted,
}

/// Sentiment indicator kinds, in aggregation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// Equity level vs its medium moving average.
    Momentum,
    /// Equity level vs its long moving average.
    TrendStrength,
    /// Equal-weight minus cap-weighted trailing return.
    Breadth,
    /// Equity minus Treasury trailing return.
    SafeHaven,
    /// High-yield credit trailing return.
    JunkBondDemand,
    /// High-yield option-adjusted spread level.
    CreditSpread,
    /// Volatility level vs its short moving average.
    Volatility,
    /// Put/call ratio level. Optional input.
    PutCall,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 8] = [
        Self::Momentum,
        Self::TrendStrength,
        Self::Breadth,
        Self::SafeHaven,
        Self::JunkBondDemand,
        Self::CreditSpread,
        Self::Volatility,
        Self::PutCall,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Momentum => "momentum",
            Self::TrendStrength => "trend_strength",
            Self::Breadth => "breadth",
            Self::SafeHaven => "safe_haven",
            Self::JunkBondDemand => "junk_bond_demand",
            Self::CreditSpread => "credit_spread",
            Self::Volatility => "volatility",
            Self::PutCall => "put_call",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Self::CreditSpread | Self::Volatility | Self::PutCall => Polarity::Inverted,
            _ => Polarity::Direct,
        }
    }

    /// Raw inputs the indicator is computed from.
    pub fn required_inputs(&self) -> &'static [InputKey] {
        match self {
            Self::Momentum | Self::TrendStrength => &[InputKey::Equity],
            Self::Breadth => &[InputKey::Breadth, InputKey::Equity],
            Self::SafeHaven => &[InputKey::Equity, InputKey::Treasury],
            Self::JunkBondDemand => &[InputKey::HighYield],
            Self::CreditSpread => &[InputKey::CreditSpread],
            Self::Volatility => &[InputKey::Volatility],
            Self::PutCall => &[InputKey::PutCall],
        }
    }

    /// Whether the indicator may be absent without a warning.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::PutCall)
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trailing window lengths, in business days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorWindows {
    /// Moving average for momentum.
    pub momentum: usize,
    /// Moving average for trend strength.
    pub trend: usize,
    /// Return horizon for breadth.
    pub breadth: usize,
    /// Return horizon for safe-haven demand.
    pub safe_haven: usize,
    /// Return horizon for junk bond demand.
    pub junk_bond: usize,
    /// Moving average for relative volatility.
    pub volatility: usize,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        Self {
            momentum: 125,
            trend: 200,
            breadth: 60,
            safe_haven: 20,
            junk_bond: 20,
            volatility: 50,
        }
    }
}

impl IndicatorWindows {
    /// All window lengths, for validation.
    pub fn all(&self) -> [(&'static str, usize); 6] {
        [
            ("momentum", self.momentum),
            ("trend", self.trend),
            ("breadth", self.breadth),
            ("safe_haven", self.safe_haven),
            ("junk_bond", self.junk_bond),
            ("volatility", self.volatility),
        ]
    }
}

/// One raw indicator series.
#[derive(Debug, Clone, PartialEq)]
pub struct RawIndicator {
    pub kind: IndicatorKind,
    pub series: Series,
}

impl RawIndicator {
    pub fn polarity(&self) -> Polarity {
        self.kind.polarity()
    }
}

/// An indicator that could not be computed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnavailableIndicator {
    pub kind: IndicatorKind,
    /// Inputs that were absent or entirely missing.
    pub missing: Vec<InputKey>,
}

/// All raw indicators built from one aligned frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawIndicatorSet {
    pub indicators: Vec<RawIndicator>,
    pub unavailable: Vec<UnavailableIndicator>,
}

impl RawIndicatorSet {
    pub fn get(&self, kind: IndicatorKind) -> Option<&RawIndicator> {
        self.indicators.iter().find(|i| i.kind == kind)
    }

    pub fn kinds(&self) -> Vec<IndicatorKind> {
        self.indicators.iter().map(|i| i.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

/// Builds raw indicators from an aligned frame.
#[derive(Debug, Clone, Default)]
pub struct IndicatorBuilder {
    windows: IndicatorWindows,
}

impl IndicatorBuilder {
    pub fn new(windows: IndicatorWindows) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &IndicatorWindows {
        &self.windows
    }

    /// Build every indicator whose inputs are available, in parallel.
    pub fn build(&self, frame: &AlignedFrame) -> RawIndicatorSet {
        let results: Vec<(IndicatorKind, Result<Series, Vec<InputKey>>)> = IndicatorKind::ALL
            .as_slice()
            .par_iter()
            .map(|kind| (*kind, self.build_one(*kind, frame)))
            .collect();

        let mut set = RawIndicatorSet::default();
        for (kind, result) in results {
            match result {
                Ok(series) => {
                    debug!("Built {} with {} observations", kind, series.len());
                    set.indicators.push(RawIndicator { kind, series });
                }
                Err(missing) => {
                    if !kind.is_optional() {
                        warn!("Indicator {} unavailable, missing inputs {:?}", kind, missing);
                    }
                    set.unavailable.push(UnavailableIndicator { kind, missing });
                }
            }
        }
        set
    }

    /// Build one indicator, or report the inputs it lacks.
    pub fn build_one(
        &self,
        kind: IndicatorKind,
        frame: &AlignedFrame,
    ) -> Result<Series, Vec<InputKey>> {
        let missing: Vec<InputKey> = kind
            .required_inputs()
            .iter()
            .copied()
            .filter(|k| !frame.is_available(*k))
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        // Availability was checked above, so every lookup succeeds.
        let input = move |key: InputKey| frame.values(key).unwrap_or_default();
        let w = &self.windows;

        let values = match kind {
            IndicatorKind::Momentum => {
                deviation_from_average(input(InputKey::Equity), w.momentum)
            }
            IndicatorKind::TrendStrength => {
                deviation_from_average(input(InputKey::Equity), w.trend)
            }
            IndicatorKind::Breadth => difference(
                &trailing_return(input(InputKey::Breadth), w.breadth),
                &trailing_return(input(InputKey::Equity), w.breadth),
            ),
            IndicatorKind::SafeHaven => difference(
                &trailing_return(input(InputKey::Equity), w.safe_haven),
                &trailing_return(input(InputKey::Treasury), w.safe_haven),
            ),
            IndicatorKind::JunkBondDemand => {
                trailing_return(input(InputKey::HighYield), w.junk_bond)
            }
            IndicatorKind::CreditSpread => input(InputKey::CreditSpread).to_vec(),
            IndicatorKind::Volatility => {
                deviation_from_average(input(InputKey::Volatility), w.volatility)
            }
            IndicatorKind::PutCall => input(InputKey::PutCall).to_vec(),
        };

        let points = frame
            .dates()
            .iter()
            .zip(values)
            .filter_map(|(date, v)| v.filter(|v| v.is_finite()).map(|v| TimePoint::new(*date, v)))
            .collect();
        Ok(Series::from_sorted(kind.name(), points))
    }
}
