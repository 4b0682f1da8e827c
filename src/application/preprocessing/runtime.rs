use crate::application::indicators::{IndicatorFactory, IndicatorOrchestrator};
use crate::application::preprocessing::engine::PreprocessingEngine;
use crate::config::PreprocessorConfig;
use crate::domain::market::{Bar, Tick, Timeframe};
use crate::domain::ports::EventListener;
use crate::domain::preprocessing::{EngineStatus, PreprocessorEvent, Snapshot};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::tick_source::ManualTickSource;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEGRADED_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Keeps the last emitted snapshot and rate-limits degraded warnings
#[derive(Default)]
struct SnapshotTracker {
    latest: RwLock<Option<Snapshot>>,
    last_degraded_log: Mutex<Option<Instant>>,
}

impl SnapshotTracker {
    fn latest(&self) -> Option<Snapshot> {
        match self.latest.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn clear(&self) {
        match self.latest.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn should_log_degraded(&self) -> bool {
        let mut last = match self.last_degraded_log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) <= DEGRADED_LOG_INTERVAL => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl EventListener for SnapshotTracker {
    fn on_event(&self, event: &PreprocessorEvent) {
        let PreprocessorEvent::SnapshotGenerated(snapshot) = event else {
            return;
        };

        if snapshot.is_degraded && self.should_log_degraded() {
            warn!(
                "PreprocessorRuntime: snapshot degraded: {}",
                snapshot.degraded_reason.as_deref().unwrap_or("unknown")
            );
        }

        match self.latest.write() {
            Ok(mut guard) => *guard = Some(snapshot.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot.clone()),
        }
    }
}

struct Running {
    engine: Arc<PreprocessingEngine>,
    source: ManualTickSource,
}

/// Host-facing wrapper that builds the whole pipeline from configuration and
/// accepts raw quotes.
///
/// Nothing here panics or returns an error to the host: a start that cannot
/// happen returns `false`, and quotes that cannot be turned into a valid tick
/// are dropped.
pub struct PreprocessorRuntime {
    running: tokio::sync::Mutex<Option<Running>>,
    tracker: Arc<SnapshotTracker>,
}

impl Default for PreprocessorRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorRuntime {
    pub fn new() -> Self {
        Self {
            running: tokio::sync::Mutex::new(None),
            tracker: Arc::new(SnapshotTracker::default()),
        }
    }

    /// Starts the pipeline; returns `true` if it is running afterwards
    pub async fn try_start(&self, config: &PreprocessorConfig) -> bool {
        if !config.enabled {
            info!("PreprocessorRuntime: disabled via config");
            return false;
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            return true;
        }

        match self.build_and_start(config).await {
            Ok(started) => {
                *running = Some(started);
                true
            }
            Err(e) => {
                warn!("PreprocessorRuntime: failed to start: {:#}", e);
                false
            }
        }
    }

    async fn build_and_start(&self, config: &PreprocessorConfig) -> Result<Running> {
        if config.indicators.is_empty() {
            bail!("At least one indicator must be configured");
        }

        let options = config.to_options()?;
        let orchestrator = Arc::new(IndicatorOrchestrator::new());
        let names = IndicatorFactory::register_all(&orchestrator, &config.indicators)?;

        let metrics = Metrics::new().context("Failed to create metrics")?;
        let engine = Arc::new(PreprocessingEngine::new(orchestrator, metrics));
        engine.subscribe(self.tracker.clone()).await;

        let source = ManualTickSource::new();
        self.tracker.clear();
        engine.start(Arc::new(source.clone()), options.clone()).await?;

        info!(
            "PreprocessorRuntime: ready (timeframes={:?}, indicators={:?}, recent_ticks={}, bar_history={}, debounce={:?})",
            options.timeframes(),
            names,
            options.max_recent_ticks(),
            options.bar_history_capacity(),
            options.snapshot_debounce()
        );

        Ok(Running { engine, source })
    }

    /// Feeds one quote into the pipeline.
    ///
    /// Quotes with a non-positive or non-finite bid/ask, or arriving while the
    /// runtime is stopped, are dropped. Returns whether the tick was handed on.
    pub async fn publish_tick(
        &self,
        timestamp: DateTime<Utc>,
        bid: f64,
        ask: f64,
        volume: f64,
    ) -> bool {
        if !bid.is_finite() || !ask.is_finite() || bid <= 0.0 || ask <= 0.0 {
            debug!(
                "PreprocessorRuntime: rejected quote @ {} bid={} ask={}",
                timestamp, bid, ask
            );
            return false;
        }

        let source = match self.running.lock().await.as_ref() {
            Some(running) => running.source.clone(),
            None => return false,
        };

        let (Some(bid), Some(ask)) = (Decimal::from_f64(bid), Decimal::from_f64(ask)) else {
            return false;
        };
        let volume = Decimal::from_f64(volume.max(0.0)).unwrap_or(Decimal::ZERO);

        source.publish(Tick::new(timestamp, bid, ask, volume)).await > 0
    }

    /// Last snapshot emitted since the last successful start
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.tracker.latest()
    }

    pub async fn status(&self) -> Option<EngineStatus> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| running.engine.status())
    }

    pub async fn bar_history(&self) -> HashMap<Timeframe, Vec<Bar>> {
        let engine = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|running| Arc::clone(&running.engine));
        match engine {
            Some(engine) => engine.bar_history().await,
            None => HashMap::new(),
        }
    }

    /// Running engine, if any
    pub async fn engine(&self) -> Option<Arc<PreprocessingEngine>> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| Arc::clone(&running.engine))
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.engine.stop().await;
        info!("PreprocessorRuntime: stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> PreprocessorConfig {
        PreprocessorConfig {
            timeframes: vec![Timeframe::M1],
            indicators: vec!["SMA:M1:2".parse().unwrap()],
            ..PreprocessorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_config_does_not_start() {
        let runtime = PreprocessorRuntime::new();
        let config = PreprocessorConfig {
            enabled: false,
            ..config()
        };
        assert!(!runtime.try_start(&config).await);
        assert!(runtime.status().await.is_none());
    }

    #[tokio::test]
    async fn test_no_indicators_does_not_start() {
        let runtime = PreprocessorRuntime::new();
        let config = PreprocessorConfig {
            indicators: Vec::new(),
            ..config()
        };
        assert!(!runtime.try_start(&config).await);
        assert!(!runtime.is_running().await);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let runtime = PreprocessorRuntime::new();
        assert!(runtime.try_start(&config()).await);
        assert!(runtime.try_start(&config()).await);
        runtime.stop().await;
        assert!(runtime.status().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_quotes_are_rejected() {
        let runtime = PreprocessorRuntime::new();
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        // stopped
        assert!(!runtime.publish_tick(ts, 1.1, 1.2, 1.0).await);

        assert!(runtime.try_start(&config()).await);
        assert!(!runtime.publish_tick(ts, 0.0, 1.2, 1.0).await);
        assert!(!runtime.publish_tick(ts, 1.1, -1.0, 1.0).await);
        assert!(!runtime.publish_tick(ts, f64::NAN, 1.2, 1.0).await);
        assert!(!runtime.publish_tick(ts, 1.1, f64::INFINITY, 1.0).await);
        assert!(runtime.publish_tick(ts, 1.1, 1.2, 1.0).await);

        runtime.stop().await;
    }

    #[test]
    fn test_degraded_log_is_rate_limited() {
        let tracker = SnapshotTracker::default();
        assert!(tracker.should_log_degraded());
        assert!(!tracker.should_log_degraded());
    }
}
