use serde::Deserialize;
use std::env;

/// Settings of the demo random-walk feed used by the server binary
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationEnvConfig {
    pub tick_interval_ms: u64,
    pub start_price: f64,
    pub spread: f64,
    pub step_pct: f64,
}

impl Default for SimulationEnvConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            start_price: 1.1000,
            spread: 0.0002,
            step_pct: 0.0005,
        }
    }
}

impl SimulationEnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tick_interval_ms = env::var("SIMULATION_TICK_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.tick_interval_ms)
            .max(1);

        let start_price = env::var("SIMULATION_START_PRICE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.start_price);

        let spread = env::var("SIMULATION_SPREAD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.spread);

        let step_pct = env::var("SIMULATION_STEP_PCT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.step_pct);

        Self {
            tick_interval_ms,
            start_price,
            spread,
            step_pct,
        }
    }
}
