use crate::domain::market::Tick;
use crate::domain::preprocessing::{IndicatorResult, PreprocessingContext, PreprocessorEvent};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

/// Anything that pushes ticks into the pipeline (broker feed, replay, manual host calls)
#[async_trait]
pub trait TickSource: Send + Sync {
    fn name(&self) -> &str;

    /// Opens a feed; the engine drains the receiver until it closes or the engine stops
    async fn subscribe(&self) -> Result<Receiver<Tick>>;

    /// Stops producing ticks. Must not fail.
    async fn stop(&self);
}

/// A pluggable indicator computed from one context snapshot.
///
/// Implementations must not touch engine state; any memoization stays private
/// to the calculator.
#[async_trait]
pub trait IndicatorCalculator: Send + Sync {
    /// Stable name, used as the result key (case-insensitive for uniqueness)
    fn name(&self) -> &str;

    /// Disabled calculators are skipped by the orchestrator
    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    async fn calculate(
        &self,
        context: &PreprocessingContext,
        cancel: &CancellationToken,
    ) -> Result<IndicatorResult>;
}

/// Synchronous observer of engine events
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &PreprocessorEvent);
}
