use crate::domain::market::timeframe::Timeframe;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single bid/ask quote update.
///
/// The timestamp is always UTC; sources holding a zoned timestamp go through
/// [`Tick::from_zoned`] so the conversion happens once, at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: Decimal,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bid: Decimal, ask: Decimal, volume: Decimal) -> Self {
        Self {
            timestamp,
            bid,
            ask,
            volume,
        }
    }

    pub fn from_zoned<Tz: TimeZone>(
        timestamp: DateTime<Tz>,
        bid: Decimal,
        ask: Decimal,
        volume: Decimal,
    ) -> Self {
        Self::new(timestamp.with_timezone(&Utc), bid, ask, volume)
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// A completed (or in-progress) OHLCV interval of one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Timeframe-aligned window start
    pub open_time: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Seeds a bar from the first price of its window
    pub fn open_at(
        timeframe: Timeframe,
        open_time: DateTime<Utc>,
        price: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            open_time,
            timeframe,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    pub fn update(&mut self, price: Decimal, volume: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += volume;
    }

    /// Exclusive end of the bar's window
    pub fn close_time(&self) -> DateTime<Utc> {
        self.open_time + chrono::Duration::milliseconds(self.timeframe.to_millis())
    }
}
