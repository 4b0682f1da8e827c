use crate::application::indicators::IndicatorOrchestrator;
use crate::application::market_data::{BarAggregator, BarCache, TickCache, TickCleaner};
use crate::domain::errors::{HistoryError, OrchestrationError, PipelineError};
use crate::domain::market::{Bar, Tick, Timeframe};
use crate::domain::ports::{EventListener, TickSource};
use crate::domain::preprocessing::{
    EngineState, EngineStatus, Metadata, PreprocessingContext, PreprocessorEvent,
    PreprocessorOptions, Snapshot, TickOutcome,
};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::observability::Metrics;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything mutated by a tick cycle. Lives behind one async mutex so cycles
/// never interleave.
struct CycleState {
    active: bool,
    options: PreprocessorOptions,
    cleaner: TickCleaner,
    ticks: TickCache,
    bars: BarCache,
    aggregators: Vec<BarAggregator>,
    last_emission: Option<Instant>,
}

impl CycleState {
    fn new(options: PreprocessorOptions) -> Result<Self, PipelineError> {
        let cleaner = TickCleaner::new(options.dedup_capacity()).map_err(invalid_options)?;
        let ticks = TickCache::new(options.max_recent_ticks()).map_err(invalid_options)?;
        let bars = BarCache::new(options.bar_history_capacity()).map_err(invalid_options)?;
        let aggregators = options
            .timeframes()
            .iter()
            .map(|tf| BarAggregator::new(*tf))
            .collect();

        Ok(Self {
            active: true,
            options,
            cleaner,
            ticks,
            bars,
            aggregators,
            last_emission: None,
        })
    }
}

fn invalid_options(e: HistoryError) -> PipelineError {
    PipelineError::InvalidOptions {
        reason: e.to_string(),
    }
}

/// Feed task bound by `start`
struct Feed {
    source: Arc<dyn TickSource>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Tick-to-snapshot coordinator.
///
/// Owns the cleaner, caches and per-timeframe aggregators, drives the
/// indicator orchestrator once per accepted tick and emits debounced
/// snapshots on the event bus. A failed indicator pass never escapes a cycle:
/// it becomes a degraded snapshot carrying the failure message.
///
/// Each cycle is staged before anything is committed. A cycle cancelled while
/// indicators run leaves the cleaner, caches, aggregators, counters and
/// debounce clock exactly as they were.
pub struct PreprocessingEngine {
    orchestrator: Arc<IndicatorOrchestrator>,
    events: EventBus,
    metrics: Metrics,
    cycle: Mutex<Option<CycleState>>,
    status: RwLock<EngineStatus>,
    latest_snapshot: RwLock<Option<Snapshot>>,
    metadata: RwLock<Arc<Metadata>>,
    feed: std::sync::Mutex<Option<Feed>>,
}

impl std::fmt::Debug for PreprocessingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessingEngine")
            .field("status", &self.status())
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

impl PreprocessingEngine {
    pub fn new(orchestrator: Arc<IndicatorOrchestrator>, metrics: Metrics) -> Self {
        Self {
            orchestrator,
            events: EventBus::new(),
            metrics,
            cycle: Mutex::new(None),
            status: RwLock::new(EngineStatus::stopped()),
            latest_snapshot: RwLock::new(None),
            metadata: RwLock::new(Arc::new(Metadata::new())),
            feed: std::sync::Mutex::new(None),
        }
    }

    pub fn orchestrator(&self) -> &Arc<IndicatorOrchestrator> {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.events.subscribe(listener).await;
    }

    /// Binds a tick source and starts consuming it.
    ///
    /// Fails with [`PipelineError::AlreadyRunning`] if the engine is already
    /// bound. Caches, counters and the debounce clock start fresh on every
    /// start.
    pub async fn start(
        self: &Arc<Self>,
        source: Arc<dyn TickSource>,
        options: PreprocessorOptions,
    ) -> Result<(), PipelineError> {
        let mut cycle = self.cycle.lock().await;
        if cycle.as_ref().is_some_and(|state| state.active) {
            warn!("PreprocessingEngine: start rejected, already running");
            return Err(PipelineError::AlreadyRunning);
        }

        self.write_status(|status| {
            *status = EngineStatus::stopped();
            status.state = EngineState::Starting;
        });

        let state = match CycleState::new(options) {
            Ok(state) => state,
            Err(e) => {
                self.write_status(|status| status.state = EngineState::Stopped);
                return Err(e);
            }
        };

        let unknown = self.orchestrator.apply_selection(state.options.indicators());
        if !unknown.is_empty() {
            warn!(
                "PreprocessingEngine: ignoring unregistered indicators {:?}",
                unknown
            );
        }

        let receiver = match source.subscribe().await {
            Ok(rx) => rx,
            Err(e) => {
                error!(
                    "PreprocessingEngine: failed to subscribe to {}: {}",
                    source.name(),
                    e
                );
                self.write_status(|status| status.state = EngineState::Stopped);
                return Err(PipelineError::Source(e));
            }
        };

        info!(
            "PreprocessingEngine: started on '{}' (timeframes={:?}, indicators={:?}, recent_ticks={}, bar_history={}, debounce={:?})",
            source.name(),
            state.options.timeframes(),
            self.orchestrator.list_enabled(),
            state.options.max_recent_ticks(),
            state.options.bar_history_capacity(),
            state.options.snapshot_debounce()
        );

        *cycle = Some(state);
        if let Ok(mut latest) = self.latest_snapshot.write() {
            *latest = None;
        }
        self.write_status(|status| status.state = EngineState::Running);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::run_feed(
            Arc::downgrade(self),
            receiver,
            cancel.clone(),
        ));
        self.replace_feed(Some(Feed {
            source,
            cancel,
            task,
        }));

        Ok(())
    }

    async fn run_feed(
        engine: Weak<Self>,
        mut receiver: tokio::sync::mpsc::Receiver<Tick>,
        cancel: CancellationToken,
    ) {
        loop {
            let tick = tokio::select! {
                _ = cancel.cancelled() => break,
                tick = receiver.recv() => tick,
            };

            let Some(tick) = tick else {
                info!("PreprocessingEngine: tick source closed the feed");
                break;
            };
            let Some(engine) = engine.upgrade() else {
                break;
            };

            if let Err(e) = engine
                .process_tick_with_cancel(tick, &cancel.child_token())
                .await
            {
                error!("PreprocessingEngine: feed stopped: {}", e);
                break;
            }
        }
        debug!("PreprocessingEngine: feed task finished");
    }

    /// Runs one full cycle for `tick`
    pub async fn process_tick(&self, tick: Tick) -> Result<TickOutcome, PipelineError> {
        self.process_tick_with_cancel(tick, &CancellationToken::new())
            .await
    }

    /// Runs one cycle; cancelling `cancel` before the indicator pass finishes
    /// discards the whole cycle.
    pub async fn process_tick_with_cancel(
        &self,
        tick: Tick,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, PipelineError> {
        let started = std::time::Instant::now();
        let mut cycle = self.cycle.lock().await;
        let state = match cycle.as_mut() {
            Some(state) if state.active => state,
            _ => return Err(PipelineError::NotStarted),
        };

        if state.cleaner.is_duplicate(&tick) {
            state.cleaner.note_rejected(&tick);
            self.metrics.ticks_duplicate_total.inc();
            return Ok(TickOutcome::Duplicate);
        }
        if cancel.is_cancelled() {
            return Ok(TickOutcome::Cancelled);
        }

        // Stage: aggregate on copies and preview the caches
        let mut aggregators = state.aggregators.clone();
        let closed: Vec<Bar> = aggregators
            .iter_mut()
            .filter_map(|aggregator| aggregator.process(&tick).closed_bar())
            .collect();

        let context = PreprocessingContext::new(
            state.ticks.snapshot_with(&tick),
            state.bars.snapshot_all_with(&closed),
            tick.timestamp,
            self.metadata_snapshot(),
        );
        let latest_bars = state.bars.latest_all_with(&closed);

        let snapshot = match self.orchestrator.calculate(&context, cancel).await {
            Ok(results) => Snapshot::healthy(tick.timestamp, results.numeric_values(), latest_bars),
            Err(OrchestrationError::Cancelled) => {
                debug!(
                    "PreprocessingEngine: cycle for tick @ {} cancelled, nothing committed",
                    tick.timestamp
                );
                return Ok(TickOutcome::Cancelled);
            }
            Err(e) => {
                warn!(
                    "PreprocessingEngine: degraded cycle @ {}: {}",
                    tick.timestamp, e
                );
                Snapshot::degraded(tick.timestamp, latest_bars, e.to_string())
            }
        };

        // Commit
        state.cleaner.record(&tick);
        state.ticks.add(tick);
        state.aggregators = aggregators;
        for bar in &closed {
            state.bars.add(*bar);
            self.metrics.inc_bars_closed(bar.timeframe);
            debug!(
                "PreprocessingEngine: {} bar closed @ {} C:{}",
                bar.timeframe, bar.open_time, bar.close
            );
        }

        let now = Instant::now();
        let emitted = match state.last_emission {
            None => true,
            Some(last) => now.duration_since(last) >= state.options.snapshot_debounce(),
        };
        if emitted {
            state.last_emission = Some(now);
        } else {
            debug!(
                "PreprocessingEngine: snapshot @ {} suppressed by debounce",
                tick.timestamp
            );
        }

        let degraded = snapshot.is_degraded;
        self.write_status(|status| {
            status.processed_ticks += 1;
            status.last_tick_timestamp = Some(tick.timestamp);
            status.is_degraded = degraded;
            status.degraded_reason = snapshot.degraded_reason.clone();
            status.state = if degraded {
                EngineState::Degraded
            } else {
                EngineState::Running
            };
        });

        self.metrics.ticks_processed_total.inc();
        if degraded {
            self.metrics.degraded_cycles_total.inc();
        }

        // Listeners run while the cycle lock is held, so events of consecutive
        // ticks never interleave.
        self.events
            .publish(&PreprocessorEvent::TickCleaned(tick))
            .await;
        for bar in closed {
            self.events.publish(&PreprocessorEvent::BarClosed(bar)).await;
        }
        if emitted {
            self.metrics.snapshots_emitted_total.inc();
            match self.latest_snapshot.write() {
                Ok(mut latest) => *latest = Some(snapshot.clone()),
                Err(poisoned) => {
                    error!("PreprocessingEngine: Lock poisoned during write, recovering");
                    *poisoned.into_inner() = Some(snapshot.clone());
                }
            }
            self.events
                .publish(&PreprocessorEvent::SnapshotGenerated(snapshot))
                .await;
        }

        self.metrics
            .cycle_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        Ok(TickOutcome::Processed { emitted, degraded })
    }

    /// Detaches the source, flushes open bars and returns to `Stopped`.
    ///
    /// Stopping a stopped engine does nothing. Flushed bars stay queryable
    /// through [`PreprocessingEngine::bar_history`] until the next start.
    pub async fn stop(&self) {
        if let Some(feed) = self.replace_feed(None) {
            feed.cancel.cancel();
            feed.source.stop().await;
            if let Err(e) = feed.task.await {
                warn!("PreprocessingEngine: feed task ended abnormally: {}", e);
            }
        }

        let mut cycle = self.cycle.lock().await;
        let Some(state) = cycle.as_mut().filter(|state| state.active) else {
            return;
        };

        let flushed: Vec<Bar> = state
            .aggregators
            .iter_mut()
            .filter_map(BarAggregator::flush)
            .collect();
        for bar in &flushed {
            state.bars.add(*bar);
            self.metrics.inc_bars_closed(bar.timeframe);
        }
        state.active = false;

        self.write_status(|status| {
            status.state = EngineState::Stopped;
            status.is_degraded = false;
            status.degraded_reason = None;
        });

        for bar in flushed {
            self.events.publish(&PreprocessorEvent::BarClosed(bar)).await;
        }

        let status = self.status();
        info!(
            "PreprocessingEngine: stopped after {} ticks",
            status.processed_ticks
        );
    }

    /// Point-in-time status; never waits for a running cycle
    pub fn status(&self) -> EngineStatus {
        match self.status.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Last snapshot that passed the debounce gate since the last start
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        match self.latest_snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Closed-bar history per timeframe, oldest first; empty before the first start
    pub async fn bar_history(&self) -> HashMap<Timeframe, Vec<Bar>> {
        self.cycle
            .lock()
            .await
            .as_ref()
            .map(|state| state.bars.snapshot_all())
            .unwrap_or_default()
    }

    /// Attaches a metadata entry copied into every following context
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        match self.metadata.write() {
            Ok(mut guard) => {
                Arc::make_mut(&mut guard).insert(key, value);
            }
            Err(poisoned) => {
                error!("PreprocessingEngine: Lock poisoned during write, recovering");
                Arc::make_mut(&mut poisoned.into_inner()).insert(key, value);
            }
        }
    }

    fn metadata_snapshot(&self) -> Arc<Metadata> {
        match self.metadata.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn write_status(&self, update: impl FnOnce(&mut EngineStatus)) {
        match self.status.write() {
            Ok(mut guard) => update(&mut guard),
            Err(poisoned) => {
                error!("PreprocessingEngine: Lock poisoned during write, recovering");
                update(&mut poisoned.into_inner());
            }
        }
    }

    fn replace_feed(&self, feed: Option<Feed>) -> Option<Feed> {
        match self.feed.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, feed),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), feed),
        }
    }
}
