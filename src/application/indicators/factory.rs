use crate::application::indicators::{
    AtrCalculator, EmaCalculator, IndicatorOrchestrator, RsiCalculator, SmaCalculator,
};
use crate::domain::errors::RegistryError;
use crate::domain::market::Timeframe;
use crate::domain::ports::IndicatorCalculator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Atr,
}

impl IndicatorKind {
    pub fn code(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Atr => "ATR",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for IndicatorKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma" => Ok(IndicatorKind::Sma),
            "ema" => Ok(IndicatorKind::Ema),
            "rsi" => Ok(IndicatorKind::Rsi),
            "atr" => Ok(IndicatorKind::Atr),
            _ => Err(RegistryError::UnknownIndicatorType {
                kind: s.trim().to_string(),
            }),
        }
    }
}

/// One configured indicator, written `TYPE:TIMEFRAME:PERIOD` (e.g. `SMA:M1:14`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    pub timeframe: Timeframe,
    pub period: usize,
}

impl IndicatorSpec {
    pub fn new(kind: IndicatorKind, timeframe: Timeframe, period: usize) -> Self {
        Self {
            kind,
            timeframe,
            period,
        }
    }

    /// Name the built calculator will report, e.g. `RSI(M5,14)`
    pub fn name(&self) -> String {
        super::indicator_name(self.kind.code(), self.timeframe, self.period)
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.timeframe, self.period)
    }
}

impl std::str::FromStr for IndicatorSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        let [kind, timeframe, period] = parts.as_slice() else {
            anyhow::bail!(
                "Invalid indicator '{}': expected TYPE:TIMEFRAME:PERIOD (e.g. SMA:M1:14)",
                s
            );
        };

        let kind: IndicatorKind = kind.parse()?;
        let timeframe: Timeframe = timeframe.parse()?;
        let period: usize = period
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid period '{}' in '{}': {}", period, s, e))?;

        Ok(Self::new(kind, timeframe, period))
    }
}

impl TryFrom<String> for IndicatorSpec {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IndicatorSpec> for String {
    fn from(spec: IndicatorSpec) -> Self {
        spec.to_string()
    }
}

pub struct IndicatorFactory;

impl IndicatorFactory {
    pub fn create(spec: &IndicatorSpec) -> Result<Arc<dyn IndicatorCalculator>, RegistryError> {
        let calculator: Arc<dyn IndicatorCalculator> = match spec.kind {
            IndicatorKind::Sma => Arc::new(SmaCalculator::new(spec.timeframe, spec.period)?),
            IndicatorKind::Ema => Arc::new(EmaCalculator::new(spec.timeframe, spec.period)?),
            IndicatorKind::Rsi => Arc::new(RsiCalculator::new(spec.timeframe, spec.period)?),
            IndicatorKind::Atr => Arc::new(AtrCalculator::new(spec.timeframe, spec.period)?),
        };
        Ok(calculator)
    }

    /// Builds one calculator per distinct spec, keeping first occurrences in order
    pub fn create_all(
        specs: &[IndicatorSpec],
    ) -> Result<Vec<Arc<dyn IndicatorCalculator>>, RegistryError> {
        let mut seen = HashSet::new();
        let mut calculators = Vec::with_capacity(specs.len());

        for spec in specs {
            if !seen.insert(spec.name().to_ascii_lowercase()) {
                debug!("IndicatorFactory: skipping duplicate indicator {}", spec);
                continue;
            }
            calculators.push(Self::create(spec)?);
        }

        Ok(calculators)
    }

    /// Builds and registers every distinct spec, returning the registered names
    pub fn register_all(
        orchestrator: &IndicatorOrchestrator,
        specs: &[IndicatorSpec],
    ) -> Result<Vec<String>, RegistryError> {
        let mut names = Vec::new();
        for calculator in Self::create_all(specs)? {
            names.push(calculator.name().to_string());
            orchestrator.register(calculator)?;
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        let spec: IndicatorSpec = "rsi:m5:14".parse().unwrap();
        assert_eq!(spec, IndicatorSpec::new(IndicatorKind::Rsi, Timeframe::M5, 14));
        assert_eq!(spec.name(), "RSI(M5,14)");
        assert_eq!(spec.to_string(), "RSI:M5:14");
    }

    #[test]
    fn test_parse_errors() {
        assert!("SMA:M1".parse::<IndicatorSpec>().is_err());
        assert!("MACD:M1:14".parse::<IndicatorSpec>().is_err());
        assert!("SMA:M7:14".parse::<IndicatorSpec>().is_err());
        assert!("SMA:M1:abc".parse::<IndicatorSpec>().is_err());
    }

    #[test]
    fn test_spec_serde_uses_compact_form() {
        let spec = IndicatorSpec::new(IndicatorKind::Atr, Timeframe::H1, 14);
        assert_eq!(serde_json::to_string(&spec).unwrap(), "\"ATR:H1:14\"");
        let parsed: IndicatorSpec = serde_json::from_str("\"ema:m15:20\"").unwrap();
        assert_eq!(parsed.name(), "EMA(M15,20)");
    }

    #[test]
    fn test_unknown_kind_error() {
        let err = "MACD".parse::<IndicatorKind>().unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownIndicatorType {
                kind: "MACD".to_string()
            }
        );
    }

    #[test]
    fn test_create_all_drops_duplicates() {
        let specs: Vec<IndicatorSpec> = ["SMA:M1:14", "sma:M1:14", "ATR:H1:14"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();

        let calculators = IndicatorFactory::create_all(&specs).unwrap();
        let names: Vec<_> = calculators.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["SMA(M1,14)", "ATR(H1,14)"]);
    }

    #[test]
    fn test_invalid_period_fails_creation() {
        let spec = IndicatorSpec::new(IndicatorKind::Ema, Timeframe::M1, 0);
        assert!(matches!(
            IndicatorFactory::create(&spec),
            Err(RegistryError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn test_register_all() {
        let orchestrator = IndicatorOrchestrator::new();
        let specs = vec![
            IndicatorSpec::new(IndicatorKind::Sma, Timeframe::M1, 14),
            IndicatorSpec::new(IndicatorKind::Rsi, Timeframe::M5, 14),
        ];
        let names = IndicatorFactory::register_all(&orchestrator, &specs).unwrap();
        assert_eq!(names, vec!["SMA(M1,14)", "RSI(M5,14)"]);
        assert_eq!(orchestrator.names(), names);
    }
}
