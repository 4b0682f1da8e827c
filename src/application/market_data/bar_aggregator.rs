use crate::domain::market::{Bar, Tick, Timeframe};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Result of folding one tick into the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutcome {
    /// A new window was opened; carries the bar it closed, if one was open
    Opened { closed: Option<Bar> },
    /// The tick extended the open bar
    Updated,
    /// The tick belongs to a window before the open one and was not aggregated
    LateTickDropped,
}

impl AggregateOutcome {
    pub fn closed_bar(&self) -> Option<Bar> {
        match self {
            AggregateOutcome::Opened { closed } => *closed,
            _ => None,
        }
    }
}

/// Folds cleaned ticks into OHLCV bars of one timeframe.
///
/// Bars are built from the bid price. A bar is emitted when a tick opens a
/// strictly later window, or on [`BarAggregator::flush`]. Ticks whose window
/// starts before the open bar's window are dropped rather than merged into
/// the current bar or reopening a closed one.
#[derive(Debug, Clone)]
pub struct BarAggregator {
    timeframe: Timeframe,
    current: Option<Bar>,
    late_ticks: u64,
}

impl BarAggregator {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            current: None,
            late_ticks: 0,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Bar currently being built, if any
    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }

    pub fn process(&mut self, tick: &Tick) -> AggregateOutcome {
        let window_start = self.timeframe.align(tick.timestamp);

        match self.current.as_mut() {
            Some(bar) if window_start == bar.open_time => {
                bar.update(tick.bid, tick.volume);
                AggregateOutcome::Updated
            }
            Some(bar) if window_start < bar.open_time => {
                self.late_ticks += 1;
                debug!(
                    "BarAggregator[{}]: late tick @ {} (window {}) dropped, open bar started {}",
                    self.timeframe, tick.timestamp, window_start, bar.open_time
                );
                AggregateOutcome::LateTickDropped
            }
            _ => {
                let closed = self.open(window_start, tick);
                AggregateOutcome::Opened { closed }
            }
        }
    }

    /// Force-closes the open bar, if any
    pub fn flush(&mut self) -> Option<Bar> {
        let closed = self.current.take();
        if let Some(bar) = &closed {
            debug!(
                "BarAggregator[{}]: flushed bar @ {} O:{} H:{} L:{} C:{} V:{}",
                self.timeframe, bar.open_time, bar.open, bar.high, bar.low, bar.close, bar.volume
            );
        }
        closed
    }

    fn open(&mut self, window_start: DateTime<Utc>, tick: &Tick) -> Option<Bar> {
        let closed = self.current.take();
        if let Some(bar) = &closed {
            debug!(
                "BarAggregator[{}]: bar completed @ {} → O:{} H:{} L:{} C:{} V:{}",
                self.timeframe, bar.open_time, bar.open, bar.high, bar.low, bar.close, bar.volume
            );
        }
        self.current = Some(Bar::open_at(
            self.timeframe,
            window_start,
            tick.bid,
            tick.volume,
        ));
        closed
    }
}
