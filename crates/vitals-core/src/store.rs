//! Bounded, insertion-ordered metric history
//!
//! The store keeps at most `capacity` metrics. Recording beyond the bound drops
//! the oldest entries first. When a persistence backend is attached, the whole
//! store is written to one key after every mutation and read back once at
//! construction. Persistence is best-effort: failures are logged and the store
//! keeps working in memory.
//!
//! # Example
//!
//! ```
//! use vitals_core::metric::{Metric, Rating};
//! use vitals_core::store::MetricStore;
//!
//! let mut store: MetricStore = MetricStore::new(2);
//! store.record(Metric::new("LCP", 1800.0, Rating::Good, 1));
//! store.record(Metric::new("LCP", 2100.0, Rating::Good, 2));
//! store.record(Metric::new("CLS", 0.02, Rating::Good, 3));
//!
//! assert_eq!(store.len(), 2);
//! assert_eq!(store.query(Some("LCP"), None).len(), 1);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::metric::{system_clock, Clock, Metric};
use crate::storage::{KeyValueStorage, MemoryStorage};

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_STORAGE_KEY: &str = "performance-metrics";

struct Persistence<P> {
    backend: P,
    key: String,
}

pub struct MetricStore<P: KeyValueStorage = MemoryStorage> {
    metrics: VecDeque<Metric>,
    capacity: usize,
    persistence: Option<Persistence<P>>,
    clock: Clock,
}

impl<P: KeyValueStorage> MetricStore<P> {
    /// Create an in-memory store with no persistence
    pub fn new(capacity: usize) -> Self {
        Self {
            metrics: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            persistence: None,
            clock: system_clock,
        }
    }

    /// Create a store mirrored to `backend` under `key`
    ///
    /// Any previously persisted metrics are loaded; if there are more than
    /// `capacity` of them only the newest are kept.
    pub fn with_persistence(capacity: usize, backend: P, key: impl Into<String>) -> Self {
        let key = key.into();
        let mut metrics: VecDeque<Metric> = Self::load(&backend, &key).into();
        while metrics.len() > capacity {
            metrics.pop_front();
        }
        debug!("Rehydrated {} metrics from '{}'", metrics.len(), key);

        Self {
            metrics,
            capacity,
            persistence: Some(Persistence { backend, key }),
            clock: system_clock,
        }
    }

    /// Build a store from configuration
    ///
    /// Persisted only when `config.persist` is set and a backend is available.
    pub fn from_config(config: &MonitorConfig, backend: Option<P>) -> Self {
        match backend {
            Some(backend) if config.persist => {
                Self::with_persistence(config.capacity, backend, config.storage_key.clone())
            }
            _ => Self::new(config.capacity),
        }
    }

    /// Replace the clock used for window queries
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Append a metric, evicting the oldest entries beyond capacity
    pub fn record(&mut self, metric: Metric) {
        self.metrics.push_back(metric);
        while self.metrics.len() > self.capacity {
            self.metrics.pop_front();
        }
        self.persist();
    }

    /// Metrics matching `name` exactly and captured within `since` of now
    ///
    /// Either filter may be omitted. Results keep insertion order.
    pub fn query(&self, name: Option<&str>, since: Option<Duration>) -> Vec<Metric> {
        let cutoff = since.map(|window| {
            let window = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
            self.now().saturating_sub(window)
        });

        self.metrics
            .iter()
            .filter(|m| name.map_or(true, |n| m.name == n))
            .filter(|m| cutoff.map_or(true, |c| m.timestamp >= c))
            .cloned()
            .collect()
    }

    /// Empty the store and drop the persisted copy
    pub fn clear(&mut self) {
        self.metrics.clear();
        if let Some(p) = &self.persistence {
            if let Err(e) = p.backend.remove(&p.key) {
                warn!("Failed to remove persisted metrics '{}': {}", p.key, e);
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Metric> {
        self.metrics.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.metrics.back().map(|m| m.timestamp)
    }

    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    fn load(backend: &P, key: &str) -> Vec<Metric> {
        let raw = match backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read persisted metrics '{}': {}", key, e);
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring malformed persisted metrics '{}': {}", key, e);
            Vec::new()
        })
    }

    fn persist(&self) {
        let Some(p) = &self.persistence else {
            return;
        };

        let result = serde_json::to_string(&self.metrics)
            .map_err(Into::into)
            .and_then(|json| p.backend.set(&p.key, &json));

        if let Err(e) = result {
            warn!("Failed to persist metrics '{}': {}", p.key, e);
        }
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
