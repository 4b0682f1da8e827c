//! Push-based status reporter for tickforge
//!
//! Periodically outputs engine status as structured JSON to stdout.

use crate::application::preprocessing::PreprocessingEngine;
use crate::domain::preprocessing::{EngineStatus, Snapshot};
use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Status snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub engine: EngineStatus,
    pub indicators: IndicatorReport,
    pub counters: CounterReport,
}

#[derive(Debug, Serialize)]
pub struct IndicatorReport {
    pub enabled: Vec<String>,
    pub latest: BTreeMap<String, f64>,
    pub snapshot_as_of: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CounterReport {
    pub ticks_processed: f64,
    pub ticks_duplicate: f64,
    pub snapshots_emitted: f64,
    pub degraded_cycles: f64,
}

/// Push-based status reporter
///
/// Outputs status as structured JSON logs on a configurable interval.
pub struct StatusReporter {
    engine: Arc<PreprocessingEngine>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(engine: Arc<PreprocessingEngine>, interval_seconds: u64) -> Self {
        let metrics = engine.metrics().clone();
        Self {
            engine,
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds.max(1)),
        }
    }

    /// Run the reporter until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "StatusReporter: Starting push-based status (interval: {:?})",
            self.interval
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let report = self.collect_report();
            match serde_json::to_string(&report) {
                Ok(json) => {
                    println!("STATUS_JSON:{}", json);
                    info!(
                        "Engine: {} | Ticks: {} | Snapshots: {} | Uptime: {}s",
                        report.engine.state,
                        report.engine.processed_ticks,
                        report.counters.snapshots_emitted,
                        report.uptime_seconds
                    );
                }
                Err(e) => warn!("Failed to serialize status: {}", e),
            }
        }

        info!("StatusReporter: stopped");
    }

    pub fn collect_report(&self) -> StatusReport {
        let snapshot: Option<Snapshot> = self.engine.latest_snapshot();

        StatusReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            engine: self.engine.status(),
            indicators: IndicatorReport {
                enabled: self.engine.orchestrator().list_enabled(),
                latest: snapshot
                    .as_ref()
                    .map(|s| s.indicators.clone())
                    .unwrap_or_default(),
                snapshot_as_of: snapshot.map(|s| s.as_of.to_rfc3339()),
            },
            counters: CounterReport {
                ticks_processed: self.metrics.ticks_processed_total.get(),
                ticks_duplicate: self.metrics.ticks_duplicate_total.get(),
                snapshots_emitted: self.metrics.snapshots_emitted_total.get(),
                degraded_cycles: self.metrics.degraded_cycles_total.get(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indicators::IndicatorOrchestrator;
    use crate::domain::preprocessing::EngineState;

    fn engine() -> Arc<PreprocessingEngine> {
        let metrics = Metrics::new().expect("Failed to create metrics");
        Arc::new(PreprocessingEngine::new(
            Arc::new(IndicatorOrchestrator::new()),
            metrics,
        ))
    }

    #[test]
    fn test_report_for_idle_engine() {
        let reporter = StatusReporter::new(engine(), 60);
        let report = reporter.collect_report();

        assert_eq!(report.engine.state, EngineState::Stopped);
        assert!(report.indicators.latest.is_empty());
        assert!(report.indicators.snapshot_as_of.is_none());
        assert_eq!(report.counters.ticks_processed, 0.0);
        assert!(!report.timestamp.is_empty());
    }

    #[test]
    fn test_report_serialization() {
        let reporter = StatusReporter::new(engine(), 60);
        let json = serde_json::to_string(&reporter.collect_report()).expect("Failed to serialize");
        assert!(json.contains("\"state\":\"Stopped\""));
        assert!(json.contains("ticks_processed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_cancel() {
        let reporter = StatusReporter::new(engine(), 1);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(reporter.run(cancel.clone()));

        tokio::time::advance(Duration::from_millis(1500)).await;
        cancel.cancel();
        handle.await.expect("reporter task panicked");
    }
}
