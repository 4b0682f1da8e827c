use crate::domain::errors::{OrchestrationError, RegistryError};
use crate::domain::ports::IndicatorCalculator;
use crate::domain::preprocessing::{IndicatorResults, PreprocessingContext};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct Registry {
    slots: Vec<Arc<dyn IndicatorCalculator>>,
    by_name: HashMap<String, usize>,
}

/// Registry of indicator calculators plus the per-cycle evaluation loop.
///
/// Calculators run one after another in registration order. The first failure
/// aborts the pass and is handed back to the caller untouched; deciding what a
/// failed pass means for the pipeline is the engine's job.
pub struct IndicatorOrchestrator {
    registry: RwLock<Registry>,
}

impl std::fmt::Debug for IndicatorOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorOrchestrator")
            .field("calculators", &self.names())
            .finish()
    }
}

impl Default for IndicatorOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorOrchestrator {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        match self.registry.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("IndicatorOrchestrator: Lock poisoned during read, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        match self.registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("IndicatorOrchestrator: Lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Adds a calculator; names are unique ignoring case
    pub fn register(&self, calculator: Arc<dyn IndicatorCalculator>) -> Result<(), RegistryError> {
        let key = calculator.name().to_ascii_lowercase();
        let mut registry = self.write();

        if registry.by_name.contains_key(&key) {
            return Err(RegistryError::DuplicateIndicator {
                name: calculator.name().to_string(),
            });
        }

        info!(
            "IndicatorOrchestrator: registered {} (slot {})",
            calculator.name(),
            registry.slots.len()
        );
        let slot = registry.slots.len();
        registry.by_name.insert(key, slot);
        registry.slots.push(calculator);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().slots.is_empty()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.read()
            .slots
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Names of the calculators that currently take part in a pass
    pub fn list_enabled(&self) -> Vec<String> {
        self.read()
            .slots
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IndicatorCalculator>> {
        let registry = self.read();
        registry
            .by_name
            .get(&name.to_ascii_lowercase())
            .map(|&slot| Arc::clone(&registry.slots[slot]))
    }

    /// Enables exactly the named calculators (all of them when `names` is empty).
    ///
    /// Returns the requested names that match no registered calculator; those
    /// are ignored.
    pub fn apply_selection(&self, names: &[String]) -> Vec<String> {
        let registry = self.read();

        if names.is_empty() {
            for calculator in &registry.slots {
                calculator.set_enabled(true);
            }
            return Vec::new();
        }

        let wanted: HashMap<String, &String> =
            names.iter().map(|n| (n.to_ascii_lowercase(), n)).collect();

        for (key, slot) in &registry.by_name {
            registry.slots[*slot].set_enabled(wanted.contains_key(key));
        }

        let mut unknown: Vec<String> = wanted
            .iter()
            .filter(|(key, _)| !registry.by_name.contains_key(*key))
            .map(|(_, name)| (*name).clone())
            .collect();
        unknown.sort();
        unknown
    }

    /// Runs every enabled calculator against `context`.
    ///
    /// The enabled set is captured once up front, so toggling or registering
    /// during a pass only affects the next one. Cancellation is checked before
    /// each calculator and once more after the last.
    pub async fn calculate(
        &self,
        context: &PreprocessingContext,
        cancel: &CancellationToken,
    ) -> Result<IndicatorResults, OrchestrationError> {
        let enabled: Vec<Arc<dyn IndicatorCalculator>> = self
            .read()
            .slots
            .iter()
            .filter(|c| c.is_enabled())
            .cloned()
            .collect();

        let mut results = IndicatorResults::new();

        for calculator in &enabled {
            if cancel.is_cancelled() {
                debug!(
                    "IndicatorOrchestrator: cancelled before {}",
                    calculator.name()
                );
                return Err(OrchestrationError::Cancelled);
            }

            match calculator.calculate(context, cancel).await {
                Ok(mut result) => {
                    if !result.name.eq_ignore_ascii_case(calculator.name()) {
                        debug!(
                            "IndicatorOrchestrator: {} returned result named '{}', renaming",
                            calculator.name(),
                            result.name
                        );
                        result.name = calculator.name().to_string();
                    }
                    results.insert(result);
                }
                Err(e) => {
                    warn!("IndicatorOrchestrator: {} failed: {}", calculator.name(), e);
                    return Err(OrchestrationError::Calculator(e));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }

        Ok(results)
    }
}
