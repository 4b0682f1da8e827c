use crate::domain::errors::RegistryError;
use crate::domain::market::Timeframe;
use crate::domain::ports::IndicatorCalculator;
use crate::domain::preprocessing::{IndicatorResult, PreprocessingContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: usize = 2;

/// Relative strength index over the last `period` close-to-close changes.
///
/// Average gain and loss are the plain means over the window (Wilder's seed
/// value, without the recursive smoothing). A window with neither gains nor
/// losses reads 50; gains without losses read 100.
#[derive(Debug)]
pub struct RsiCalculator {
    name: String,
    timeframe: Timeframe,
    period: usize,
    enabled: AtomicBool,
}

impl RsiCalculator {
    /// Needs at least two close-to-close changes; `period < 2` is rejected
    pub fn new(timeframe: Timeframe, period: usize) -> Result<Self, RegistryError> {
        let name = super::indicator_name("RSI", timeframe, period);
        if period < MIN_PERIOD {
            return Err(RegistryError::InvalidPeriod {
                indicator: name,
                period,
            });
        }
        Ok(Self {
            name,
            timeframe,
            period,
            enabled: AtomicBool::new(true),
        })
    }
}

pub(crate) fn relative_strength(closes: &[f64]) -> f64 {
    let (gains, losses) = closes
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let samples = closes.len().saturating_sub(1).max(1) as f64;
    let avg_gain = gains / samples;
    let avg_loss = losses / samples;

    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[async_trait]
impl IndicatorCalculator for RsiCalculator {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    async fn calculate(
        &self,
        context: &PreprocessingContext,
        _cancel: &CancellationToken,
    ) -> Result<IndicatorResult> {
        let closes = super::closes(context.bars(self.timeframe));
        if closes.len() < self.period + 1 {
            return Ok(IndicatorResult::empty(&self.name));
        }

        let window = &closes[closes.len() - (self.period + 1)..];
        Ok(IndicatorResult::value(&self.name, relative_strength(window)))
    }
}
