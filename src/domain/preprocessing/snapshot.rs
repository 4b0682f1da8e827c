use crate::domain::market::{Bar, Tick, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One emitted preprocessing result.
///
/// When `is_degraded` is set the indicator map may be partial or empty and
/// `degraded_reason` carries the failure message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub as_of: DateTime<Utc>,
    pub indicators: BTreeMap<String, f64>,
    pub latest_bars: BTreeMap<Timeframe, Bar>,
    pub is_degraded: bool,
    pub degraded_reason: Option<String>,
}

impl Snapshot {
    pub fn healthy(
        as_of: DateTime<Utc>,
        indicators: BTreeMap<String, f64>,
        latest_bars: BTreeMap<Timeframe, Bar>,
    ) -> Self {
        Self {
            as_of,
            indicators,
            latest_bars,
            is_degraded: false,
            degraded_reason: None,
        }
    }

    pub fn degraded(
        as_of: DateTime<Utc>,
        latest_bars: BTreeMap<Timeframe, Bar>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            as_of,
            indicators: BTreeMap::new(),
            latest_bars,
            is_degraded: true,
            degraded_reason: Some(reason.into()),
        }
    }

    /// Case-insensitive indicator lookup
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Degraded,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Point-in-time health and progress of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub processed_ticks: u64,
    pub last_tick_timestamp: Option<DateTime<Utc>>,
    pub is_degraded: bool,
    pub degraded_reason: Option<String>,
}

impl EngineStatus {
    pub fn stopped() -> Self {
        Self {
            state: EngineState::Stopped,
            processed_ticks: 0,
            last_tick_timestamp: None,
            is_degraded: false,
            degraded_reason: None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, EngineState::Running | EngineState::Degraded)
    }
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self::stopped()
    }
}

/// Events published by the engine, in the order they happen within a cycle
#[derive(Debug, Clone)]
pub enum PreprocessorEvent {
    TickCleaned(Tick),
    BarClosed(Bar),
    SnapshotGenerated(Snapshot),
}

/// What happened to one tick handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Same timestamp as an already accepted tick; absorbed without side effects
    Duplicate,
    /// Cancelled mid-cycle; nothing was committed
    Cancelled,
    Processed { emitted: bool, degraded: bool },
}

impl TickOutcome {
    pub fn was_emitted(&self) -> bool {
        matches!(self, TickOutcome::Processed { emitted: true, .. })
    }
}
