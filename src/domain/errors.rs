use thiserror::Error;

/// Errors raised by the bounded history buffers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("History capacity must be positive, got {capacity}")]
    InvalidCapacity { capacity: usize },

    #[error("History index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors related to indicator registration and construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate indicator: '{name}' is already registered")]
    DuplicateIndicator { name: String },

    #[error("Invalid period {period} for {indicator}")]
    InvalidPeriod { indicator: String, period: usize },

    #[error("Unknown indicator type: '{kind}'")]
    UnknownIndicatorType { kind: String },
}

/// Why an indicator pass did not produce a full result set
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Indicator calculation cancelled")]
    Cancelled,

    /// A calculator failed; displayed verbatim so the reason reaches the snapshot untouched
    #[error(transparent)]
    Calculator(#[from] anyhow::Error),
}

/// Errors surfaced synchronously by the preprocessing engine
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline is already running")]
    AlreadyRunning,

    #[error("Pipeline has not been started")]
    NotStarted,

    #[error("Invalid preprocessor options: {reason}")]
    InvalidOptions { reason: String },

    #[error("Tick source failure: {0}")]
    Source(anyhow::Error),
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}
