//! Prometheus metrics definitions for tickforge
//!
//! All metrics use the `tickforge_` prefix and are read-only.

use crate::domain::market::Timeframe;
use prometheus::{
    Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics for the preprocessing pipeline
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Ticks accepted by the cleaner and fully processed
    pub ticks_processed_total: Counter,
    /// Ticks absorbed as duplicates
    pub ticks_duplicate_total: Counter,
    /// Closed bars per timeframe
    pub bars_closed_total: CounterVec,
    /// Snapshots that passed the debounce gate
    pub snapshots_emitted_total: Counter,
    /// Cycles whose indicator pass failed
    pub degraded_cycles_total: Counter,
    /// Wall time of one tick cycle
    pub cycle_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new Metrics instance with all counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_processed_total = Counter::with_opts(Opts::new(
            "tickforge_ticks_processed_total",
            "Total ticks processed",
        ))?;
        registry.register(Box::new(ticks_processed_total.clone()))?;

        let ticks_duplicate_total = Counter::with_opts(Opts::new(
            "tickforge_ticks_duplicate_total",
            "Total duplicate ticks absorbed",
        ))?;
        registry.register(Box::new(ticks_duplicate_total.clone()))?;

        let bars_closed_total = CounterVec::new(
            Opts::new("tickforge_bars_closed_total", "Total bars closed by timeframe"),
            &["timeframe"],
        )?;
        registry.register(Box::new(bars_closed_total.clone()))?;

        let snapshots_emitted_total = Counter::with_opts(Opts::new(
            "tickforge_snapshots_emitted_total",
            "Total snapshots emitted",
        ))?;
        registry.register(Box::new(snapshots_emitted_total.clone()))?;

        let degraded_cycles_total = Counter::with_opts(Opts::new(
            "tickforge_degraded_cycles_total",
            "Total cycles with a failed indicator pass",
        ))?;
        registry.register(Box::new(degraded_cycles_total.clone()))?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "tickforge_cycle_duration_seconds",
                "Tick cycle duration in seconds",
            )
            .buckets(vec![
                0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.1,
            ]),
        )?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            ticks_processed_total,
            ticks_duplicate_total,
            bars_closed_total,
            snapshots_emitted_total,
            degraded_cycles_total,
            cycle_duration_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_bars_closed(&self, timeframe: Timeframe) {
        self.bars_closed_total
            .with_label_values(&[timeframe.code()])
            .inc();
    }

    pub fn bars_closed(&self, timeframe: Timeframe) -> f64 {
        self.bars_closed_total
            .with_label_values(&[timeframe.code()])
            .get()
    }
}
