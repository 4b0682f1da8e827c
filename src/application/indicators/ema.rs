use crate::domain::errors::RegistryError;
use crate::domain::market::Timeframe;
use crate::domain::ports::IndicatorCalculator;
use crate::domain::preprocessing::{IndicatorResult, PreprocessingContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Exponential moving average over the whole retained close history.
///
/// Seeded with the SMA of the first `period` closes, then smoothed with
/// `alpha = 2 / (period + 1)`.
#[derive(Debug)]
pub struct EmaCalculator {
    name: String,
    timeframe: Timeframe,
    period: usize,
    enabled: AtomicBool,
}

impl EmaCalculator {
    pub fn new(timeframe: Timeframe, period: usize) -> Result<Self, RegistryError> {
        let name = super::indicator_name("EMA", timeframe, period);
        if period == 0 {
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

#[async_trait]
impl IndicatorCalculator for EmaCalculator {
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
        if closes.len() < self.period {
            return Ok(IndicatorResult::empty(&self.name));
        }

        let alpha = 2.0 / (self.period as f64 + 1.0);
        let seed = closes[..self.period].iter().sum::<f64>() / self.period as f64;
        let ema = closes[self.period..]
            .iter()
            .fold(seed, |prev, close| alpha * close + (1.0 - alpha) * prev);

        Ok(IndicatorResult::value(&self.name, ema).with_metadata("samples", closes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indicators::test_support::context_with_closes;

    #[tokio::test]
    async fn test_seed_equals_sma_when_exactly_period_bars() {
        let ema = EmaCalculator::new(Timeframe::M1, 4).unwrap();
        let ctx = context_with_closes(Timeframe::M1, &[2, 4, 6, 8]);
        let result = ema.calculate(&ctx, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.name, "EMA(M1,4)");
        assert_eq!(result.value, Some(5.0));
    }

    #[tokio::test]
    async fn test_smoothing_after_seed() {
        // alpha = 2/(3+1) = 0.5; seed = 2; then 0.5*10 + 0.5*2 = 6
        let ema = EmaCalculator::new(Timeframe::M1, 3).unwrap();
        let ctx = context_with_closes(Timeframe::M1, &[1, 2, 3, 10]);
        let result = ema.calculate(&ctx, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.value, Some(6.0));
    }

    #[tokio::test]
    async fn test_warm_up() {
        let ema = EmaCalculator::new(Timeframe::M1, 3).unwrap();
        let ctx = context_with_closes(Timeframe::M1, &[1, 2]);
        let result = ema.calculate(&ctx, &CancellationToken::new()).await.unwrap();
        assert!(result.value.is_none());
    }
}
