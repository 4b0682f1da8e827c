use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tickforge::application::indicators::{IndicatorFactory, IndicatorOrchestrator, IndicatorSpec};
use tickforge::application::preprocessing::PreprocessingEngine;
use tickforge::domain::errors::PipelineError;
use tickforge::domain::market::{Tick, Timeframe};
use tickforge::domain::ports::{EventListener, IndicatorCalculator};
use tickforge::domain::preprocessing::{
    EngineState, IndicatorResult, PreprocessingContext, PreprocessorEvent, PreprocessorOptions,
    TickOutcome,
};
use tickforge::infrastructure::ManualTickSource;
use tickforge::infrastructure::observability::Metrics;
use tokio_util::sync::CancellationToken;

// --- Helpers ---

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<PreprocessorEvent>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<PreprocessorEvent> {
        self.events.lock().unwrap().clone()
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(|event| match event {
                PreprocessorEvent::TickCleaned(_) => "tick",
                PreprocessorEvent::BarClosed(_) => "bar",
                PreprocessorEvent::SnapshotGenerated(_) => "snapshot",
            })
            .collect()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &PreprocessorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct FailingCalculator;

#[async_trait]
impl IndicatorCalculator for FailingCalculator {
    fn name(&self) -> &str {
        "Failing"
    }
    fn is_enabled(&self) -> bool {
        true
    }
    fn set_enabled(&self, _enabled: bool) {}
    async fn calculate(
        &self,
        _context: &PreprocessingContext,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<IndicatorResult> {
        bail!("boom")
    }
}

/// Fails its first run, then reports a constant
struct FailOnce {
    failed: AtomicBool,
}

#[async_trait]
impl IndicatorCalculator for FailOnce {
    fn name(&self) -> &str {
        "FailOnce"
    }
    fn is_enabled(&self) -> bool {
        true
    }
    fn set_enabled(&self, _enabled: bool) {}
    async fn calculate(
        &self,
        _context: &PreprocessingContext,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<IndicatorResult> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            bail!("feed gap");
        }
        Ok(IndicatorResult::value("FailOnce", 4.0))
    }
}

/// Cancels the cycle token the first time it runs
struct CancelOnce {
    armed: AtomicBool,
}

#[async_trait]
impl IndicatorCalculator for CancelOnce {
    fn name(&self) -> &str {
        "CancelOnce"
    }
    fn is_enabled(&self) -> bool {
        true
    }
    fn set_enabled(&self, _enabled: bool) {}
    async fn calculate(
        &self,
        _context: &PreprocessingContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<IndicatorResult> {
        if self.armed.swap(false, Ordering::SeqCst) {
            cancel.cancel();
        }
        Ok(IndicatorResult::value("CancelOnce", 1.0))
    }
}

fn at(hour: u32, minute: u32, second: u32, millis: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, second).unwrap()
        + ChronoDuration::milliseconds(millis)
}

fn tick(ts: DateTime<Utc>, bid: Decimal) -> Tick {
    Tick::new(ts, bid, bid + dec!(0.0002), dec!(1))
}

fn options(timeframes: Vec<Timeframe>, debounce_ms: u64) -> PreprocessorOptions {
    PreprocessorOptions::new(
        timeframes,
        Vec::<String>::new(),
        128,
        Duration::from_millis(debounce_ms),
    )
    .unwrap()
}

async fn start_engine(
    orchestrator: IndicatorOrchestrator,
    options: PreprocessorOptions,
) -> (Arc<PreprocessingEngine>, Arc<RecordingListener>) {
    let engine = Arc::new(PreprocessingEngine::new(
        Arc::new(orchestrator),
        Metrics::new().unwrap(),
    ));
    let listener = Arc::new(RecordingListener::default());
    engine.subscribe(listener.clone()).await;
    engine
        .start(Arc::new(ManualTickSource::new()), options)
        .await
        .unwrap();
    (engine, listener)
}

// --- Tests ---

#[tokio::test]
async fn duplicate_timestamp_is_cleaned_once() {
    let (engine, listener) =
        start_engine(IndicatorOrchestrator::new(), options(vec![Timeframe::M1], 60_000)).await;

    let ts = at(9, 30, 0, 250);
    engine.process_tick(tick(ts, dec!(1.1000))).await.unwrap();
    let outcome = engine.process_tick(tick(ts, dec!(1.2000))).await.unwrap();

    assert_eq!(outcome, TickOutcome::Duplicate);
    assert_eq!(listener.kinds(), vec!["tick", "snapshot"]);
    assert_eq!(engine.status().processed_ticks, 1);
}

#[tokio::test]
async fn minute_bar_closes_on_boundary() {
    let (engine, listener) =
        start_engine(IndicatorOrchestrator::new(), options(vec![Timeframe::M1], 60_000)).await;

    engine
        .process_tick(tick(at(10, 0, 0, 200), dec!(1.1000)))
        .await
        .unwrap();
    engine
        .process_tick(tick(at(10, 0, 59, 900), dec!(1.1010)))
        .await
        .unwrap();
    engine
        .process_tick(tick(at(10, 1, 0, 0), dec!(1.1020)))
        .await
        .unwrap();

    let bars: Vec<_> = listener
        .events()
        .into_iter()
        .filter_map(|event| match event {
            PreprocessorEvent::BarClosed(bar) => Some(bar),
            _ => None,
        })
        .collect();

    assert_eq!(bars.len(), 1);
    let bar = bars[0];
    assert_eq!(bar.timeframe, Timeframe::M1);
    assert_eq!(bar.open_time, at(10, 0, 0, 0));
    assert_eq!(bar.open, dec!(1.1000));
    assert_eq!(bar.high, dec!(1.1010));
    assert_eq!(bar.close, dec!(1.1010));
    assert_eq!(bar.volume, dec!(2));

    // only the first cycle passes the debounce
    assert_eq!(listener.kinds(), vec!["tick", "snapshot", "tick", "tick", "bar"]);
    assert_eq!(engine.metrics().bars_closed(Timeframe::M1), 1.0);
}

#[tokio::test]
async fn failing_indicator_degrades_snapshot() {
    let orchestrator = IndicatorOrchestrator::new();
    orchestrator.register(Arc::new(FailingCalculator)).unwrap();
    let (engine, listener) = start_engine(orchestrator, options(vec![Timeframe::M1], 25)).await;

    let outcome = engine
        .process_tick(tick(at(12, 0, 0, 0), dec!(1.05)))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Processed {
            emitted: true,
            degraded: true
        }
    );

    let snapshot = engine.latest_snapshot().unwrap();
    assert!(snapshot.is_degraded);
    assert_eq!(snapshot.degraded_reason.as_deref(), Some("boom"));
    assert!(snapshot.indicators.is_empty());

    let status = engine.status();
    assert_eq!(status.state, EngineState::Degraded);
    assert!(status.is_degraded);
    assert_eq!(status.processed_ticks, 1);
    assert_eq!(engine.metrics().degraded_cycles_total.get(), 1.0);
    assert_eq!(listener.kinds(), vec!["tick", "snapshot"]);
}

#[tokio::test]
async fn successful_cycle_clears_degraded_state() {
    let orchestrator = IndicatorOrchestrator::new();
    orchestrator
        .register(Arc::new(FailOnce {
            failed: AtomicBool::new(false),
        }))
        .unwrap();
    let (engine, _listener) = start_engine(orchestrator, options(vec![Timeframe::M1], 1)).await;

    engine
        .process_tick(tick(at(12, 30, 0, 0), dec!(1.05)))
        .await
        .unwrap();
    let status = engine.status();
    assert_eq!(status.state, EngineState::Degraded);
    assert_eq!(status.degraded_reason.as_deref(), Some("feed gap"));

    let outcome = engine
        .process_tick(tick(at(12, 30, 1, 0), dec!(1.06)))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        TickOutcome::Processed {
            degraded: false,
            ..
        }
    ));

    let status = engine.status();
    assert_eq!(status.state, EngineState::Running);
    assert!(!status.is_degraded);
    assert_eq!(status.degraded_reason, None);
    assert_eq!(status.processed_ticks, 2);
    assert_eq!(engine.metrics().degraded_cycles_total.get(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn debounce_suppresses_until_window_elapses() {
    let (engine, listener) =
        start_engine(IndicatorOrchestrator::new(), options(vec![Timeframe::M1], 100)).await;

    let first = engine
        .process_tick(tick(at(8, 0, 0, 0), dec!(1)))
        .await
        .unwrap();
    let second = engine
        .process_tick(tick(at(8, 0, 0, 10), dec!(1)))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;
    let third = engine
        .process_tick(tick(at(8, 0, 0, 20), dec!(1)))
        .await
        .unwrap();

    assert!(first.was_emitted());
    assert!(!second.was_emitted());
    assert!(third.was_emitted());

    let snapshots = listener
        .kinds()
        .into_iter()
        .filter(|kind| *kind == "snapshot")
        .count();
    assert_eq!(snapshots, 2);
    assert_eq!(engine.latest_snapshot().unwrap().as_of, at(8, 0, 0, 20));
    assert_eq!(engine.metrics().snapshots_emitted_total.get(), 2.0);
}

#[tokio::test]
async fn status_counters_only_grow() {
    let (engine, _listener) =
        start_engine(IndicatorOrchestrator::new(), options(vec![Timeframe::M1], 25)).await;

    let mut previous = engine.status().processed_ticks;
    for second in 0..10 {
        engine
            .process_tick(tick(at(14, 0, second, 0), dec!(2)))
            .await
            .unwrap();
        // duplicates do not move the counter
        engine
            .process_tick(tick(at(14, 0, second, 0), dec!(2)))
            .await
            .unwrap();

        let current = engine.status().processed_ticks;
        assert_eq!(current, previous + 1);
        previous = current;
    }
    assert_eq!(engine.status().last_tick_timestamp, Some(at(14, 0, 9, 0)));
}

#[tokio::test]
async fn second_start_is_rejected() {
    let (engine, _listener) =
        start_engine(IndicatorOrchestrator::new(), options(vec![Timeframe::M1], 25)).await;

    let result = engine
        .start(
            Arc::new(ManualTickSource::new()),
            options(vec![Timeframe::M5], 25),
        )
        .await;
    assert!(matches!(result, Err(PipelineError::AlreadyRunning)));
    assert_eq!(engine.status().state, EngineState::Running);
}

#[tokio::test]
async fn cancelled_cycle_commits_nothing() {
    let orchestrator = IndicatorOrchestrator::new();
    orchestrator
        .register(Arc::new(CancelOnce {
            armed: AtomicBool::new(true),
        }))
        .unwrap();
    let (engine, listener) = start_engine(orchestrator, options(vec![Timeframe::M1], 25)).await;

    let ts = at(16, 0, 30, 0);
    let cancel = CancellationToken::new();
    let outcome = engine
        .process_tick_with_cancel(tick(ts, dec!(3)), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome, TickOutcome::Cancelled);
    assert!(listener.events().is_empty());
    assert_eq!(engine.status().processed_ticks, 0);
    assert!(engine.latest_snapshot().is_none());
    assert_eq!(engine.metrics().ticks_processed_total.get(), 0.0);

    // the cleaner never recorded the timestamp, so the retry goes through
    let retry = engine.process_tick(tick(ts, dec!(3))).await.unwrap();
    assert!(retry.was_emitted());
    assert_eq!(
        engine.latest_snapshot().unwrap().indicator("CancelOnce"),
        Some(1.0)
    );
}

#[tokio::test]
async fn factory_indicators_compute_on_closed_bars() {
    let orchestrator = IndicatorOrchestrator::new();
    let specs: Vec<IndicatorSpec> = vec!["SMA:M1:3".parse().unwrap(), "RSI:M1:2".parse().unwrap()];
    let names = IndicatorFactory::register_all(&orchestrator, &specs).unwrap();
    assert_eq!(names, vec!["SMA(M1,3)", "RSI(M1,2)"]);

    let (engine, _listener) = start_engine(orchestrator, options(vec![Timeframe::M1], 1)).await;

    // closes 1, 2, 3 land in the cache once minute 3 opens
    for (minute, bid) in [(0, dec!(1)), (1, dec!(2)), (2, dec!(3)), (3, dec!(4))] {
        tokio::time::sleep(Duration::from_millis(2)).await;
        engine
            .process_tick(tick(at(11, minute, 0, 0), bid))
            .await
            .unwrap();
    }

    let snapshot = engine.latest_snapshot().unwrap();
    assert!(!snapshot.is_degraded);
    assert_eq!(snapshot.indicator("sma(m1,3)"), Some(2.0));
    assert_eq!(snapshot.indicator("RSI(M1,2)"), Some(100.0));
    assert_eq!(snapshot.latest_bars[&Timeframe::M1].close, dec!(3));
}

#[tokio::test]
async fn feed_drives_the_engine_until_stopped() {
    // Setup logging to see output with --nocapture
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let engine = Arc::new(PreprocessingEngine::new(
        Arc::new(IndicatorOrchestrator::new()),
        Metrics::new().unwrap(),
    ));
    let source = ManualTickSource::new();
    engine
        .start(
            Arc::new(source.clone()),
            options(vec![Timeframe::M1, Timeframe::M5], 25),
        )
        .await
        .unwrap();

    assert_eq!(source.publish(tick(at(13, 0, 1, 0), dec!(1.2))).await, 1);
    assert_eq!(source.publish(tick(at(13, 0, 2, 0), dec!(1.3))).await, 1);

    tokio::time::timeout(Duration::from_secs(2), async {
        while engine.status().processed_ticks < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("feed did not deliver both ticks");

    engine.stop().await;
    assert_eq!(engine.status().state, EngineState::Stopped);
    assert_eq!(source.subscriber_count().await, 0);

    let history = engine.bar_history().await;
    assert_eq!(history[&Timeframe::M1].len(), 1);
    assert_eq!(history[&Timeframe::M5].len(), 1);
    assert_eq!(history[&Timeframe::M5][0].close, dec!(1.3));
}
