//! Preprocessor configuration parsing from environment variables or TOML.

use crate::application::indicators::IndicatorSpec;
use crate::domain::errors::{ConfigError, PipelineError};
use crate::domain::market::Timeframe;
use crate::domain::preprocessing::PreprocessorOptions;
use crate::domain::preprocessing::options::{DEFAULT_BAR_HISTORY_CAPACITY, DEFAULT_DEDUP_CAPACITY};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const MIN_RECENT_TICK_CAPACITY: usize = 64;
pub const MIN_BAR_HISTORY_CAPACITY: usize = 32;
pub const MIN_SNAPSHOT_DEBOUNCE_MS: u64 = 1;

const DEFAULT_TIMEFRAMES: &str = "M1,M5";
const DEFAULT_INDICATORS: &str = "SMA:M1:14,RSI:M5:14,ATR:H1:14";

/// Preprocessor settings as the host configures them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub enabled: bool,
    pub timeframes: Vec<Timeframe>,
    pub recent_tick_capacity: usize,
    pub bar_history_capacity: usize,
    pub snapshot_debounce_ms: u64,
    pub dedup_capacity: usize,
    pub indicators: Vec<IndicatorSpec>,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeframes: vec![Timeframe::M1, Timeframe::M5],
            recent_tick_capacity: 2048,
            bar_history_capacity: DEFAULT_BAR_HISTORY_CAPACITY,
            snapshot_debounce_ms: 25,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            indicators: parse_list(DEFAULT_INDICATORS, "PREPROCESSOR_INDICATORS")
                .unwrap_or_default(),
        }
    }
}

impl PreprocessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every `PREPROCESSOR_*` key through `lookup`, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let enabled = parse_value(&lookup, "PREPROCESSOR_ENABLED", "true")?;
        let timeframes = parse_list(
            &lookup("PREPROCESSOR_TIMEFRAMES").unwrap_or_else(|| DEFAULT_TIMEFRAMES.to_string()),
            "PREPROCESSOR_TIMEFRAMES",
        )?;
        let recent_tick_capacity =
            parse_value(&lookup, "PREPROCESSOR_RECENT_TICK_CAPACITY", "2048")?;
        let bar_history_capacity = parse_value(
            &lookup,
            "PREPROCESSOR_BAR_HISTORY_CAPACITY",
            &DEFAULT_BAR_HISTORY_CAPACITY.to_string(),
        )?;
        let snapshot_debounce_ms = parse_value(&lookup, "PREPROCESSOR_SNAPSHOT_DEBOUNCE_MS", "25")?;
        let dedup_capacity = parse_value(
            &lookup,
            "PREPROCESSOR_DEDUP_CAPACITY",
            &DEFAULT_DEDUP_CAPACITY.to_string(),
        )?;
        let indicators = parse_list(
            &lookup("PREPROCESSOR_INDICATORS").unwrap_or_else(|| DEFAULT_INDICATORS.to_string()),
            "PREPROCESSOR_INDICATORS",
        )?;

        Ok(Self {
            enabled,
            timeframes,
            recent_tick_capacity,
            bar_history_capacity,
            snapshot_debounce_ms,
            dedup_capacity,
            indicators,
        })
    }

    /// Engine options with capacities and debounce raised to their floors.
    ///
    /// An empty timeframe list falls back to M1.
    pub fn to_options(&self) -> Result<PreprocessorOptions, PipelineError> {
        let names: Vec<String> = self.indicators.iter().map(IndicatorSpec::name).collect();
        let timeframes = if self.timeframes.is_empty() {
            warn!("PreprocessorConfig: no timeframes configured, using M1");
            vec![Timeframe::M1]
        } else {
            self.timeframes.clone()
        };

        PreprocessorOptions::new(
            timeframes,
            names,
            self.recent_tick_capacity.max(MIN_RECENT_TICK_CAPACITY),
            Duration::from_millis(self.snapshot_debounce_ms.max(MIN_SNAPSHOT_DEBOUNCE_MS)),
        )?
        .with_bar_history_capacity(self.bar_history_capacity.max(MIN_BAR_HISTORY_CAPACITY))?
        .with_dedup_capacity(self.dedup_capacity)
    }
}

fn parse_value<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// Comma separated list; blank entries are skipped
fn parse_list<T>(raw: &str, key: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: item.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}
