// Indicator registry, reference calculators and their factory
pub mod atr;
pub mod ema;
pub mod factory;
pub mod orchestrator;
pub mod rsi;
pub mod sma;

pub use atr::AtrCalculator;
pub use ema::EmaCalculator;
pub use factory::{IndicatorFactory, IndicatorKind, IndicatorSpec};
pub use orchestrator::IndicatorOrchestrator;
pub use rsi::RsiCalculator;
pub use sma::SmaCalculator;

use crate::domain::market::{Bar, Timeframe};
use rust_decimal::prelude::ToPrimitive;

/// `SMA(M1,14)` style name shared by calculators and specs
pub(crate) fn indicator_name(kind: &str, timeframe: Timeframe, period: usize) -> String {
    format!("{}({},{})", kind, timeframe, period)
}

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().filter_map(|b| b.close.to_f64()).collect()
}
