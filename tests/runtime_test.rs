use chrono::{TimeZone, Utc};
use std::time::Duration;
use tickforge::application::preprocessing::PreprocessorRuntime;
use tickforge::config::PreprocessorConfig;
use tickforge::domain::market::Timeframe;
use tickforge::domain::preprocessing::EngineState;

fn config() -> PreprocessorConfig {
    PreprocessorConfig {
        timeframes: vec![Timeframe::M1],
        indicators: vec!["SMA:M1:2".parse().unwrap()],
        snapshot_debounce_ms: 1,
        ..PreprocessorConfig::default()
    }
}

#[tokio::test]
async fn published_quotes_reach_a_snapshot() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();

    let runtime = PreprocessorRuntime::new();
    assert!(runtime.try_start(&config()).await);

    let base = Utc.with_ymd_and_hms(2024, 5, 6, 7, 0, 0).unwrap();
    assert!(runtime.publish_tick(base, 1.1000, 1.1002, 3.0).await);

    let snapshot = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(snapshot) = runtime.latest_snapshot() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no snapshot emitted");

    assert_eq!(snapshot.as_of, base);
    assert!(!snapshot.is_degraded);

    let status = runtime.status().await.unwrap();
    assert_eq!(status.state, EngineState::Running);
    assert_eq!(status.processed_ticks, 1);

    runtime.stop().await;
    assert!(runtime.status().await.is_none());
    assert!(runtime.bar_history().await.is_empty());
    assert!(!runtime.publish_tick(base, 1.1, 1.2, 1.0).await);
}

#[tokio::test]
async fn restart_after_stop_uses_new_config() {
    let runtime = PreprocessorRuntime::new();
    assert!(runtime.try_start(&config()).await);
    runtime.stop().await;

    let config = PreprocessorConfig {
        timeframes: Vec::new(),
        indicators: vec!["EMA:M5:3".parse().unwrap()],
        ..config()
    };
    assert!(runtime.try_start(&config).await);

    let engine = runtime.engine().await.unwrap();
    assert_eq!(engine.orchestrator().list_enabled(), vec!["EMA(M5,3)"]);
    runtime.stop().await;
}
