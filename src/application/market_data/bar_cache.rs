use crate::application::market_data::circular_history::CircularHistory;
use crate::domain::errors::HistoryError;
use crate::domain::market::{Bar, Timeframe};
use std::collections::{BTreeMap, HashMap};
use tracing::error;

/// Per-timeframe bounded history of closed bars.
///
/// Histories are created lazily on the first bar of a timeframe, using the
/// shared capacity unless a per-timeframe override was configured.
#[derive(Debug, Clone)]
pub struct BarCache {
    default_capacity: usize,
    overrides: HashMap<Timeframe, usize>,
    histories: HashMap<Timeframe, CircularHistory<Bar>>,
}

impl BarCache {
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::InvalidCapacity { capacity });
        }
        Ok(Self {
            default_capacity: capacity,
            overrides: HashMap::new(),
            histories: HashMap::new(),
        })
    }

    /// Overrides the history depth of one timeframe
    pub fn with_capacity_for(
        mut self,
        timeframe: Timeframe,
        capacity: usize,
    ) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::InvalidCapacity { capacity });
        }
        self.overrides.insert(timeframe, capacity);
        self.histories.remove(&timeframe);
        Ok(self)
    }

    pub fn capacity_for(&self, timeframe: Timeframe) -> usize {
        self.overrides
            .get(&timeframe)
            .copied()
            .unwrap_or(self.default_capacity)
    }

    pub fn add(&mut self, bar: Bar) {
        let capacity = self.capacity_for(bar.timeframe);
        let history = match self.histories.entry(bar.timeframe) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                match CircularHistory::new(capacity) {
                    Ok(history) => entry.insert(history),
                    Err(e) => {
                        error!("BarCache: cannot create {} history: {}", bar.timeframe, e);
                        return;
                    }
                }
            }
        };
        history.push(bar);
    }

    pub fn latest(&self, timeframe: Timeframe) -> Option<&Bar> {
        self.histories.get(&timeframe).and_then(|h| h.latest())
    }

    /// Newest closed bar of every timeframe that has one
    pub fn latest_all(&self) -> BTreeMap<Timeframe, Bar> {
        self.histories
            .iter()
            .filter_map(|(tf, h)| h.latest().map(|bar| (*tf, *bar)))
            .collect()
    }

    pub fn bars(&self, timeframe: Timeframe) -> Vec<Bar> {
        self.histories
            .get(&timeframe)
            .map(|h| h.snapshot())
            .unwrap_or_default()
    }

    pub fn snapshot_all(&self) -> HashMap<Timeframe, Vec<Bar>> {
        self.histories
            .iter()
            .map(|(tf, h)| (*tf, h.snapshot()))
            .collect()
    }

    /// Snapshot as it would look once the `pending` bars are added (in order)
    pub fn snapshot_all_with(&self, pending: &[Bar]) -> HashMap<Timeframe, Vec<Bar>> {
        let mut grouped: HashMap<Timeframe, Vec<Bar>> = HashMap::new();
        for bar in pending {
            grouped.entry(bar.timeframe).or_default().push(*bar);
        }

        let mut result = HashMap::with_capacity(self.histories.len() + grouped.len());
        for (tf, history) in &self.histories {
            let extra = grouped.remove(tf).unwrap_or_default();
            result.insert(*tf, history.snapshot_with(&extra));
        }
        for (tf, bars) in grouped {
            let capacity = self.capacity_for(tf);
            let skip = bars.len().saturating_sub(capacity);
            result.insert(tf, bars.into_iter().skip(skip).collect());
        }
        result
    }

    /// Like [`BarCache::latest_all`], accounting for `pending` bars
    pub fn latest_all_with(&self, pending: &[Bar]) -> BTreeMap<Timeframe, Bar> {
        let mut latest = self.latest_all();
        for bar in pending {
            latest.insert(bar.timeframe, *bar);
        }
        latest
    }
}
