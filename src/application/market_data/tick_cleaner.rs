use crate::domain::errors::HistoryError;
use crate::domain::market::Tick;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Drops ticks whose timestamp was already accepted.
///
/// Timestamps are compared on their canonical UTC nanosecond value. Only the
/// last `capacity` distinct timestamps are remembered (FIFO eviction), so a
/// long-running process keeps a constant footprint; a duplicate arriving after
/// its original was evicted is accepted again. Arrival order is never changed.
#[derive(Debug, Clone)]
pub struct TickCleaner {
    capacity: usize,
    seen: HashSet<i64>,
    order: VecDeque<i64>,
    accepted: u64,
    rejected: u64,
}

impl TickCleaner {
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::InvalidCapacity { capacity });
        }
        Ok(Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            accepted: 0,
            rejected: 0,
        })
    }

    /// Canonical dedup key of a tick timestamp
    pub fn canonical_key(tick: &Tick) -> i64 {
        tick.timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| tick.timestamp.timestamp_micros().saturating_mul(1_000))
    }

    /// Checks without recording
    pub fn is_duplicate(&self, tick: &Tick) -> bool {
        self.seen.contains(&Self::canonical_key(tick))
    }

    /// Records the tick's timestamp as seen
    pub fn record(&mut self, tick: &Tick) {
        let key = Self::canonical_key(tick);
        if !self.seen.insert(key) {
            return;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity
            && let Some(evicted) = self.order.pop_front()
        {
            self.seen.remove(&evicted);
        }
        self.accepted += 1;
    }

    /// Returns the cleaned tick, or `None` if its timestamp was already seen
    pub fn process(&mut self, tick: Tick) -> Option<Tick> {
        if self.is_duplicate(&tick) {
            self.note_rejected(&tick);
            return None;
        }
        self.record(&tick);
        Some(tick)
    }

    pub fn note_rejected(&mut self, tick: &Tick) {
        self.rejected += 1;
        debug!("TickCleaner: duplicate tick @ {} absorbed", tick.timestamp);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Number of timestamps currently remembered
    pub fn tracked(&self) -> usize {
        self.order.len()
    }
}
