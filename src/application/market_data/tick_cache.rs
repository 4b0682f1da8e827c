use crate::application::market_data::circular_history::CircularHistory;
use crate::domain::errors::HistoryError;
use crate::domain::market::Tick;

/// Bounded history of the most recent cleaned ticks
#[derive(Debug, Clone)]
pub struct TickCache {
    history: CircularHistory<Tick>,
}

impl TickCache {
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        Ok(Self {
            history: CircularHistory::new(capacity)?,
        })
    }

    pub fn add(&mut self, tick: Tick) {
        self.history.push(tick);
    }

    pub fn latest(&self) -> Option<&Tick> {
        self.history.latest()
    }

    pub fn snapshot(&self) -> Vec<Tick> {
        self.history.snapshot()
    }

    /// Snapshot as it would look once `pending` is added
    pub fn snapshot_with(&self, pending: &Tick) -> Vec<Tick> {
        self.history.snapshot_with(std::slice::from_ref(pending))
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn tick(sec: u32) -> Tick {
        Tick::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, sec).unwrap(),
            Decimal::from(sec),
            Decimal::from(sec + 1),
            Decimal::ONE,
        )
    }

    #[test]
    fn test_latest_tracks_last_add() {
        let mut cache = TickCache::new(2).unwrap();
        assert!(cache.latest().is_none());
        cache.add(tick(1));
        cache.add(tick(2));
        cache.add(tick(3));
        assert_eq!(cache.latest(), Some(&tick(3)));
        assert_eq!(cache.snapshot(), vec![tick(2), tick(3)]);
    }

    #[test]
    fn test_snapshot_with_does_not_mutate() {
        let mut cache = TickCache::new(2).unwrap();
        cache.add(tick(1));
        cache.add(tick(2));
        assert_eq!(cache.snapshot_with(&tick(3)), vec![tick(2), tick(3)]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.latest(), Some(&tick(2)));
    }

    #[test]
    fn test_invalid_capacity() {
        assert!(TickCache::new(0).is_err());
    }
}
