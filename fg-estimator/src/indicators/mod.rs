//! Raw indicator construction.
//!
//! Turns the aligned frame into signed indicators:
//! - Momentum / trend strength: equity level vs 125 / 200 day averages
//! - Breadth: equal-weight minus cap-weighted 60 day return
//! - Safe haven: equity minus Treasury 20 day return
//! - Junk bond demand: high-yield 20 day return
//! - Credit spread, put/call: raw levels
//! - Volatility: level vs its 50 day average

pub mod builder;
pub mod rolling;

pub use builder::{
    IndicatorBuilder, IndicatorKind, IndicatorWindows, Polarity, RawIndicator, RawIndicatorSet,
    UnavailableIndicator,
};
