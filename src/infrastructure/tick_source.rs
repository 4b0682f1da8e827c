use crate::domain::market::Tick;
use crate::domain::ports::TickSource;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{
    Mutex, RwLock,
    mpsc::{self, Receiver, Sender},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const CHANNEL_CAPACITY: usize = 1024;

/// Tick source fed by the host through [`ManualTickSource::publish`]
#[derive(Clone)]
pub struct ManualTickSource {
    subscribers: Arc<RwLock<Vec<Sender<Tick>>>>,
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Sends the tick to every live subscriber; returns how many received it
    pub async fn publish(&self, tick: Tick) -> usize {
        let mut subs = self.subscribers.write().await;

        // retain only active subscribers
        let mut active_subs = Vec::with_capacity(subs.len());
        for tx in subs.iter() {
            if tx.send(tick).await.is_ok() {
                active_subs.push(tx.clone());
            }
        }
        *subs = active_subs;
        subs.len()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for ManualTickSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TickSource for ManualTickSource {
    fn name(&self) -> &str {
        "manual"
    }

    async fn subscribe(&self) -> Result<Receiver<Tick>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.subscribers.write().await.push(tx);
        debug!("ManualTickSource: subscriber added");
        Ok(rx)
    }

    async fn stop(&self) {
        let mut subs = self.subscribers.write().await;
        if !subs.is_empty() {
            info!("ManualTickSource: closing {} subscriber(s)", subs.len());
        }
        subs.clear();
    }
}

/// Random-walk quote generator
#[derive(Debug, Clone)]
pub struct RandomWalk {
    mid: f64,
    spread: f64,
    step_pct: f64,
}

impl RandomWalk {
    pub fn new(start_mid: f64, spread: f64, step_pct: f64) -> Self {
        Self {
            mid: start_mid,
            spread,
            step_pct,
        }
    }

    pub fn next_tick(&mut self) -> Tick {
        let mut rng = rand::rng();
        let change_pct = rng.random_range(-1.0..=1.0) * self.step_pct;
        self.mid = (self.mid * (1.0 + change_pct)).max(self.spread);
        let volume: u32 = rng.random_range(1..=10);

        let half = self.spread / 2.0;
        Tick::new(
            Utc::now(),
            Decimal::from_f64(self.mid - half).unwrap_or(Decimal::ONE),
            Decimal::from_f64(self.mid + half).unwrap_or(Decimal::ONE),
            Decimal::from(volume),
        )
    }
}

/// Demo tick source emitting a random walk on a fixed cadence
pub struct SimulatedTickSource {
    walk: RandomWalk,
    interval: Duration,
    running: Mutex<Option<CancellationToken>>,
}

impl SimulatedTickSource {
    pub fn new(walk: RandomWalk, interval: Duration) -> Self {
        Self {
            walk,
            interval,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TickSource for SimulatedTickSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn subscribe(&self) -> Result<Receiver<Tick>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = CancellationToken::new();

        if let Some(previous) = self.running.lock().await.replace(token.clone()) {
            previous.cancel();
        }

        let mut walk = self.walk.clone();
        let period = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(walk.next_tick()).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("SimulatedTickSource: generator stopped");
        });

        info!(
            "SimulatedTickSource: streaming random walk every {:?}",
            self.interval
        );
        Ok(rx)
    }

    async fn stop(&self) {
        if let Some(token) = self.running.lock().await.take() {
            token.cancel();
            info!("SimulatedTickSource: stopped");
        }
    }
}
