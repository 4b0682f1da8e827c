use crate::domain::errors::RegistryError;
use crate::domain::market::{Bar, Timeframe};
use crate::domain::ports::IndicatorCalculator;
use crate::domain::preprocessing::{IndicatorResult, PreprocessingContext};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Simple mean of the last `period` true ranges
#[derive(Debug)]
pub struct AtrCalculator {
    name: String,
    timeframe: Timeframe,
    period: usize,
    enabled: AtomicBool,
}

impl AtrCalculator {
    pub fn new(timeframe: Timeframe, period: usize) -> Result<Self, RegistryError> {
        let name = super::indicator_name("ATR", timeframe, period);
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

/// max(H - L, |H - prevClose|, |L - prevClose|)
pub(crate) fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    let high = bar.high.to_f64().unwrap_or(0.0);
    let low = bar.low.to_f64().unwrap_or(0.0);
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

#[async_trait]
impl IndicatorCalculator for AtrCalculator {
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
        if bars.len() < self.period + 1 {
            return Ok(IndicatorResult::empty(&self.name));
        }

        let window = &bars[bars.len() - (self.period + 1)..];
        let total: f64 = window
            .windows(2)
            .map(|pair| true_range(&pair[1], pair[0].close.to_f64().unwrap_or(0.0)))
            .sum();

        Ok(IndicatorResult::value(
            &self.name,
            total / self.period as f64,
        ))
    }
}
