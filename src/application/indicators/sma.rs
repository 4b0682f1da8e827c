use crate::domain::errors::RegistryError;
use crate::domain::market::Timeframe;
use crate::domain::ports::IndicatorCalculator;
use crate::domain::preprocessing::{IndicatorResult, PreprocessingContext};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Arithmetic mean of the last `period` closes of one timeframe
#[derive(Debug)]
pub struct SmaCalculator {
    name: String,
    timeframe: Timeframe,
    period: usize,
    enabled: AtomicBool,
}

impl SmaCalculator {
    pub fn new(timeframe: Timeframe, period: usize) -> Result<Self, RegistryError> {
        let name = super::indicator_name("SMA", timeframe, period);
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

    pub fn period(&self) -> usize {
        self.period
    }
}

#[async_trait]
impl IndicatorCalculator for SmaCalculator {
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
        let bars = context.bars(self.timeframe);
        if bars.len() < self.period {
            return Ok(IndicatorResult::empty(&self.name));
        }

        // Decimal sum keeps short integer series exact
        let window = &bars[bars.len() - self.period..];
        let sum: Decimal = window.iter().map(|b| b.close).sum();
        let mean = sum / Decimal::from(self.period);

        Ok(IndicatorResult::new(&self.name, mean.to_f64()))
    }
}
