use crate::domain::market::{Bar, Tick, Timeframe};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type Metadata = HashMap<String, Value>;

/// Immutable input handed to every indicator calculator for one tick cycle.
///
/// Built from copies of the engine caches, so calculators can hold on to it
/// without seeing later mutations.
#[derive(Debug, Clone)]
pub struct PreprocessingContext {
    recent_ticks: Vec<Tick>,
    bars: HashMap<Timeframe, Vec<Bar>>,
    timestamp: DateTime<Utc>,
    metadata: Arc<Metadata>,
}

impl PreprocessingContext {
    pub fn new(
        recent_ticks: Vec<Tick>,
        bars: HashMap<Timeframe, Vec<Bar>>,
        timestamp: DateTime<Utc>,
        metadata: Arc<Metadata>,
    ) -> Self {
        Self {
            recent_ticks,
            bars,
            timestamp,
            metadata,
        }
    }

    /// Recent ticks, oldest first
    pub fn recent_ticks(&self) -> &[Tick] {
        &self.recent_ticks
    }

    /// Closed bars of one timeframe, oldest first; empty if the timeframe has none
    pub fn bars(&self, timeframe: Timeframe) -> &[Bar] {
        self.bars
            .get(&timeframe)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bars_by_timeframe(&self) -> &HashMap<Timeframe, Vec<Bar>> {
        &self.bars
    }

    /// "As of" time of the cycle (the triggering tick's timestamp)
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
