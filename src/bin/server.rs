//! tickforge Server - Headless preprocessing engine
//!
//! Streams a simulated random-walk feed through the tick-to-snapshot pipeline.
//! Status is pushed via structured JSON logs to stdout.
//!
//! # Usage
//! ```sh
//! PREPROCESSOR_INDICATORS=SMA:M1:14,RSI:M1:14 cargo run --bin server
//! cargo run --bin server -- --config tickforge.toml
//! ```
//!
//! # Environment Variables
//! - `PREPROCESSOR_*` - Pipeline settings (timeframes, indicators, capacities, debounce)
//! - `SIMULATION_*` - Random-walk feed settings
//! - `OBSERVABILITY_ENABLED` - Enable status reporting (default: true)
//! - `OBSERVABILITY_INTERVAL` - Interval in seconds between status outputs (default: 60)

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tickforge::application::indicators::{IndicatorFactory, IndicatorOrchestrator};
use tickforge::application::preprocessing::PreprocessingEngine;
use tickforge::config::Config;
use tickforge::infrastructure::observability::{Metrics, StatusReporter};
use tickforge::infrastructure::{LoggingListener, RandomWalk, SimulatedTickSource};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Tick-to-snapshot preprocessing server", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every pipeline event at debug level
    #[arg(long)]
    log_events: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("tickforge Server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env()?,
    };

    if !config.preprocessor.enabled {
        info!("Preprocessor disabled via config. Exiting.");
        return Ok(());
    }
    if config.preprocessor.indicators.is_empty() {
        bail!("At least one indicator must be configured");
    }

    let options = config.preprocessor.to_options()?;
    let orchestrator = Arc::new(IndicatorOrchestrator::new());
    let names = IndicatorFactory::register_all(&orchestrator, &config.preprocessor.indicators)?;
    info!(
        "Configuration loaded: Timeframes={:?}, Indicators={:?}",
        options.timeframes(),
        names
    );

    let metrics = Metrics::new()?;
    let engine = Arc::new(PreprocessingEngine::new(orchestrator, metrics));
    if cli.log_events {
        engine.subscribe(Arc::new(LoggingListener)).await;
    }

    let sim = &config.simulation;
    let source = Arc::new(SimulatedTickSource::new(
        RandomWalk::new(sim.start_price, sim.spread, sim.step_pct),
        Duration::from_millis(sim.tick_interval_ms.max(1)),
    ));
    engine.start(source, options).await?;
    info!("Preprocessing engine running.");

    let reporter_cancel = CancellationToken::new();
    if config.observability.enabled {
        let interval = config.observability.interval_seconds;
        let reporter = StatusReporter::new(engine.clone(), interval);
        tokio::spawn(reporter.run(reporter_cancel.clone()));
        info!("Status reporter started (interval: {}s)", interval);
    } else {
        info!("Status reporting disabled.");
    }

    info!("Server running. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping...");

    reporter_cancel.cancel();
    engine.stop().await;
    info!(
        "Final status: {:?} ({} ticks)",
        engine.status().state,
        engine.status().processed_ticks
    );

    Ok(())
}
