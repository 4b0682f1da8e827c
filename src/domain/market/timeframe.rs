use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Milliseconds from 0001-01-01T00:00:00Z (a Monday) to the Unix epoch
const CALENDAR_EPOCH_OFFSET_MS: i64 = 62_135_596_800_000;

/// Fixed-duration aggregation granularity for bars.
///
/// Every variant maps to a constant duration; months are treated as 30 days so
/// window alignment stays a pure `floor(timestamp / duration) * duration`,
/// counted from 0001-01-01 so weekly windows open on Mondays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
    MN1,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1_440,
            Timeframe::W1 => 10_080,
            Timeframe::MN1 => 43_200,
        }
    }

    /// Returns the duration in milliseconds
    pub fn to_millis(&self) -> i64 {
        self.to_minutes() * 60 * 1000
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs((self.to_minutes() * 60) as u64)
    }

    /// Short code used in indicator names and config files (`M1`, `H4`, ...)
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
            Timeframe::MN1 => "MN1",
        }
    }

    /// Returns all available timeframes in ascending order
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
            Timeframe::W1,
            Timeframe::MN1,
        ]
    }

    /// Start (in epoch ms) of the window containing `timestamp_ms`.
    ///
    /// Windows are floored from 0001-01-01 rather than the Unix epoch. Uses
    /// euclidean division so earlier timestamps still floor downwards.
    pub fn period_start_millis(&self, timestamp_ms: i64) -> i64 {
        let period = self.to_millis();
        let since_calendar_epoch = timestamp_ms + CALENDAR_EPOCH_OFFSET_MS;
        since_calendar_epoch.div_euclid(period) * period - CALENDAR_EPOCH_OFFSET_MS
    }

    /// Returns the UTC window start of the bar that `timestamp` belongs to
    pub fn align(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.period_start_millis(timestamp.timestamp_millis());
        Utc.timestamp_millis_opt(start).single().unwrap_or(timestamp)
    }

    /// Checks if a timestamp is exactly on a window boundary
    pub fn is_period_start(&self, timestamp: DateTime<Utc>) -> bool {
        self.align(timestamp) == timestamp
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "m1" | "1m" | "1min" => Ok(Timeframe::M1),
            "m5" | "5m" | "5min" => Ok(Timeframe::M5),
            "m15" | "15m" | "15min" => Ok(Timeframe::M15),
            "m30" | "30m" | "30min" => Ok(Timeframe::M30),
            "h1" | "1h" | "1hour" => Ok(Timeframe::H1),
            "h4" | "4h" | "4hour" => Ok(Timeframe::H4),
            "d1" | "1d" | "1day" => Ok(Timeframe::D1),
            "w1" | "1w" | "1week" => Ok(Timeframe::W1),
            "mn1" | "mn" | "1month" => Ok(Timeframe::MN1),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: M1, M5, M15, M30, H1, H4, D1, W1, MN1",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
