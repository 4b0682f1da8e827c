use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Output of one calculator for one cycle.
///
/// `value` is `None` when the calculator had too little data; that is not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub name: String,
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl IndicatorResult {
    pub fn new(name: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            name: name.into(),
            value,
            metadata: None,
        }
    }

    pub fn value(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Some(value))
    }

    /// Result for a calculator that could not produce a value yet (warm-up)
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Name → result map with case-insensitive lookup, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct IndicatorResults {
    entries: Vec<IndicatorResult>,
    index: HashMap<String, usize>,
}

impl IndicatorResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a result, replacing any earlier result with the same (case-insensitive) name
    pub fn insert(&mut self, result: IndicatorResult) {
        let key = result.name.to_ascii_lowercase();
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot] = result,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(result);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorResult> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorResult> {
        self.entries.iter()
    }

    /// Only the results that carry a value, keyed by their declared name
    pub fn numeric_values(&self) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .filter_map(|r| r.value.map(|v| (r.name.clone(), v)))
            .collect()
    }
}
