//! Configuration module for tickforge.
//!
//! This module provides structured configuration loading from environment variables
//! or a TOML file, organized by concern: Preprocessor, Observability and Simulation.

mod observability_config;
mod preprocessor_config;
mod simulation_config;

pub use observability_config::ObservabilityEnvConfig;
pub use preprocessor_config::{
    MIN_BAR_HISTORY_CAPACITY, MIN_RECENT_TICK_CAPACITY, MIN_SNAPSHOT_DEBOUNCE_MS,
    PreprocessorConfig,
};
pub use simulation_config::SimulationEnvConfig;

use crate::domain::errors::ConfigError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preprocessor: PreprocessorConfig,
    pub observability: ObservabilityEnvConfig,
    pub simulation: SimulationEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let preprocessor =
            PreprocessorConfig::from_env().context("Failed to load preprocessor config")?;
        let observability = ObservabilityEnvConfig::from_env();
        let simulation = SimulationEnvConfig::from_env();

        Ok(Self {
            preprocessor,
            observability,
            simulation,
        })
    }

    /// Parses a TOML document; missing sections and keys take their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
