use crate::domain::ports::EventListener;
use crate::domain::preprocessing::PreprocessorEvent;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Event bus fanning preprocessor events out to listeners in subscription order
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Delivers the event to every listener before returning
    pub async fn publish(&self, event: &PreprocessorEvent) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener.on_event(event);
        }
    }

    /// Get count of subscribers (for testing)
    pub async fn subscriber_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

/// Listener that traces every event at debug level
pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_event(&self, event: &PreprocessorEvent) {
        match event {
            PreprocessorEvent::TickCleaned(tick) => {
                debug!("Event: tick @ {} bid={} ask={}", tick.timestamp, tick.bid, tick.ask)
            }
            PreprocessorEvent::BarClosed(bar) => debug!(
                "Event: {} bar @ {} O:{} H:{} L:{} C:{} V:{}",
                bar.timeframe, bar.open_time, bar.open, bar.high, bar.low, bar.close, bar.volume
            ),
            PreprocessorEvent::SnapshotGenerated(snapshot) => debug!(
                "Event: snapshot @ {} ({} indicators, degraded={})",
                snapshot.as_of,
                snapshot.indicators.len(),
                snapshot.is_degraded
            ),
        }
    }
}
