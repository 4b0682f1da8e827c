use crate::domain::errors::PipelineError;
use crate::domain::market::Timeframe;
use std::time::Duration;

pub const DEFAULT_BAR_HISTORY_CAPACITY: usize = 500;
pub const DEFAULT_DEDUP_CAPACITY: usize = 4096;

/// Validated settings the engine is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessorOptions {
    timeframes: Vec<Timeframe>,
    indicators: Vec<String>,
    max_recent_ticks: usize,
    snapshot_debounce: Duration,
    bar_history_capacity: usize,
    dedup_capacity: usize,
}

impl PreprocessorOptions {
    /// `indicators` selects registered calculators by name; an empty list selects all of them.
    pub fn new(
        timeframes: impl IntoIterator<Item = Timeframe>,
        indicators: impl IntoIterator<Item = impl Into<String>>,
        max_recent_ticks: usize,
        snapshot_debounce: Duration,
    ) -> Result<Self, PipelineError> {
        let mut timeframes: Vec<Timeframe> = timeframes.into_iter().collect();
        timeframes.sort();
        timeframes.dedup();

        if timeframes.is_empty() {
            return Err(invalid("at least one timeframe is required"));
        }
        if max_recent_ticks == 0 {
            return Err(invalid("max_recent_ticks must be positive"));
        }
        if snapshot_debounce.is_zero() {
            return Err(invalid("snapshot_debounce must be positive"));
        }

        Ok(Self {
            timeframes,
            indicators: indicators.into_iter().map(Into::into).collect(),
            max_recent_ticks,
            snapshot_debounce,
            bar_history_capacity: DEFAULT_BAR_HISTORY_CAPACITY,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        })
    }

    pub fn with_bar_history_capacity(mut self, capacity: usize) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(invalid("bar_history_capacity must be positive"));
        }
        self.bar_history_capacity = capacity;
        Ok(self)
    }

    pub fn with_dedup_capacity(mut self, capacity: usize) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(invalid("dedup_capacity must be positive"));
        }
        self.dedup_capacity = capacity;
        Ok(self)
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn max_recent_ticks(&self) -> usize {
        self.max_recent_ticks
    }

    pub fn snapshot_debounce(&self) -> Duration {
        self.snapshot_debounce
    }

    pub fn bar_history_capacity(&self) -> usize {
        self.bar_history_capacity
    }

    pub fn dedup_capacity(&self) -> usize {
        self.dedup_capacity
    }
}

fn invalid(reason: &str) -> PipelineError {
    PipelineError::InvalidOptions {
        reason: reason.to_string(),
    }
}
