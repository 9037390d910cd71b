//! Normalization of raw observations into stored metrics
//!
//! The [`Collector`] is the single entry point for performance data. Each
//! [`Observation`] is rated, stamped and checked, appended to the
//! [`MetricStore`], then handed to the [`Reporter`].
//!
//! # Example
//!
//! ```
//! use vitals_core::collector::{Collector, PageContext};
//! use vitals_core::metric::{Observation, Rating};
//! use vitals_core::config::MonitorConfig;
//! use vitals_core::storage::MemoryStorage;
//!
//! let config = MonitorConfig::default();
//! let mut collector = Collector::from_config(&config, Some(MemoryStorage::new()));
//! let page = PageContext::with_path("/projects");
//!
//! let metric = collector.ingest(Observation::entry("LCP", 3100.0), &page).unwrap();
//! assert_eq!(metric.rating, Rating::NeedsImprovement);
//! assert_eq!(metric.url.as_deref(), Some("/projects"));
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::metric::{system_clock, Clock, Metric, Observation, Rating};
use crate::reporter::Reporter;
use crate::storage::{KeyValueStorage, MemoryStorage};
use crate::store::MetricStore;
use crate::thresholds;

/// Ambient page state at the moment of capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    /// Current path, stamped onto metrics as `url`
    pub path: Option<String>,
    /// Full page URL, sent to analytics
    pub href: Option<String>,
    pub user_agent: Option<String>,
}

impl PageContext {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Outcome of probing the runtime for an optional capability
///
/// Holds the handle needed to use the capability when it is present.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability<H> {
    Supported(H),
    Unsupported,
}

impl<H> Capability<H> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }

    pub fn handle(&self) -> Option<&H> {
        match self {
            Capability::Supported(handle) => Some(handle),
            Capability::Unsupported => None,
        }
    }

    pub fn into_handle(self) -> Option<H> {
        match self {
            Capability::Supported(handle) => Some(handle),
            Capability::Unsupported => None,
        }
    }
}

impl<H> From<Option<H>> for Capability<H> {
    fn from(handle: Option<H>) -> Self {
        match handle {
            Some(handle) => Capability::Supported(handle),
            None => Capability::Unsupported,
        }
    }
}

pub struct Collector<P: KeyValueStorage = MemoryStorage> {
    store: MetricStore<P>,
    reporter: Reporter,
    supported: bool,
    monotonic: bool,
    clock: Clock,
}

impl<P: KeyValueStorage> Collector<P> {
    pub fn new(store: MetricStore<P>, reporter: Reporter) -> Self {
        Self {
            store,
            reporter,
            supported: true,
            monotonic: true,
            clock: system_clock,
        }
    }

    /// Build a collector from configuration, with a reporter that has no sinks
    ///
    /// See [`MetricStore::from_config`] for when the store is persisted.
    pub fn from_config(config: &MonitorConfig, backend: Option<P>) -> Self {
        Self::new(
            MetricStore::from_config(config, backend),
            Reporter::new(config.reporter.clone()),
        )
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Clamp timestamps so they never go backwards (on by default)
    ///
    /// Only meaningful when every observation comes from one clock. A
    /// collector fed by many senders should keep their timestamps as given.
    pub fn with_monotonic_timestamps(mut self, enabled: bool) -> Self {
        self.monotonic = enabled;
        self
    }

    /// Stop collecting; further observations are ignored
    pub fn mark_unsupported(&mut self) {
        if self.supported {
            debug!("Performance instrumentation unavailable, collection disabled");
        }
        self.supported = false;
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Turn an observation into a metric without recording it
    ///
    /// Returns `None` for observations that would break the metric invariants
    /// (empty name, negative or non-finite value).
    pub fn normalize(&self, observation: Observation, page: &PageContext) -> Option<Metric> {
        if let Err(e) = observation.validate() {
            warn!("Dropping observation: {}", e);
            return None;
        }

        let rating = observation
            .rating
            .or_else(|| thresholds::rate(&observation.name, observation.value))
            .unwrap_or(Rating::Good);

        let now = observation.timestamp.unwrap_or_else(self.clock);
        let timestamp = match self.store.last_timestamp() {
            Some(last) if self.monotonic => now.max(last),
            _ => now,
        };

        Some(Metric {
            name: observation.name,
            value: observation.value,
            rating,
            timestamp,
            url: observation.url.or_else(|| page.path.clone()),
            delta: observation.delta,
        })
    }

    /// Normalize, record and report one observation
    ///
    /// Returns the recorded metric, or `None` when collection is unsupported or
    /// the observation was dropped.
    pub fn ingest(&mut self, observation: Observation, page: &PageContext) -> Option<Metric> {
        if !self.supported {
            return None;
        }

        let metric = self.normalize(observation, page)?;
        debug!(
            "Recording {} = {} ({})",
            metric.name, metric.value, metric.rating
        );

        self.store.record(metric.clone());
        self.reporter.report(&metric, page);
        Some(metric)
    }

    pub fn store(&self) -> &MetricStore<P> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MetricStore<P> {
        &mut self.store
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReporterConfig;
    use crate::reporter::{AnalyticsPayload, MetricSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn fixed_now() -> u64 {
        5_000
    }

    fn collector() -> Collector {
        Collector::new(MetricStore::new(100), Reporter::default()).with_clock(fixed_now)
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        payloads: Arc<Mutex<Vec<AnalyticsPayload>>>,
    }

    impl MetricSink for RecordingSink {
        fn send(&self, payload: &AnalyticsPayload) {
            self.payloads.lock().unwrap().push(payload.clone());
        }
    }

    static CONSOLE_LINES: AtomicUsize = AtomicUsize::new(0);

    fn count_console(_metric: &Metric) {
        CONSOLE_LINES.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_assigns_rating_from_thresholds() {
        let mut collector = collector();
        let page = PageContext::default();

        let good = collector.ingest(Observation::entry("CLS", 0.05), &page).unwrap();
        let poor = collector.ingest(Observation::entry("FID", 450.0), &page).unwrap();

        assert_eq!(good.rating, Rating::Good);
        assert_eq!(poor.rating, Rating::Poor);
    }

    #[test]
    fn test_keeps_caller_rating() {
        let mut collector = collector();
        let metric = collector
            .ingest(
                Observation::custom("LCP", 100.0, Rating::Poor),
                &PageContext::default(),
            )
            .unwrap();
        assert_eq!(metric.rating, Rating::Poor);
    }

    #[test]
    fn test_unrated_custom_names_default_to_good() {
        let mut collector = collector();
        let metric = collector
            .ingest(Observation::entry("hero-render", 9000.0), &PageContext::default())
            .unwrap();
        assert_eq!(metric.rating, Rating::Good);
    }

    #[test]
    fn test_stamps_timestamp_and_path() {
        let mut collector = collector();
        let page = PageContext::with_path("/contact");

        let stamped = collector.ingest(Observation::entry("TTFB", 300.0), &page).unwrap();
        assert_eq!(stamped.timestamp, 5_000);
        assert_eq!(stamped.url.as_deref(), Some("/contact"));

        let explicit = collector
            .ingest(
                Observation::entry("TTFB", 300.0).at(9_000).with_url("/blog"),
                &page,
            )
            .unwrap();
        assert_eq!(explicit.timestamp, 9_000);
        assert_eq!(explicit.url.as_deref(), Some("/blog"));
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut collector = collector();
        let page = PageContext::default();

        collector.ingest(Observation::entry("LCP", 1.0).at(8_000), &page);
        let late = collector
            .ingest(Observation::entry("LCP", 1.0).at(7_000), &page)
            .unwrap();
        assert_eq!(late.timestamp, 8_000);
    }

    #[test]
    fn test_sender_timestamps_kept_without_clamping() {
        let mut collector = collector().with_monotonic_timestamps(false);
        let page = PageContext::default();

        let skewed = 10 * 365 * 24 * 60 * 60 * 1000;
        collector.ingest(Observation::entry("LCP", 1.0).at(skewed), &page);
        let honest = collector
            .ingest(Observation::entry("LCP", 1.0).at(7_000), &page)
            .unwrap();

        assert_eq!(honest.timestamp, 7_000);
        let timestamps: Vec<u64> = collector.store().iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![skewed, 7_000]);
    }

    #[test]
    fn test_drops_invalid_values() {
        let mut collector = collector();
        let page = PageContext::default();

        assert!(collector.ingest(Observation::entry("LCP", -5.0), &page).is_none());
        assert!(collector.ingest(Observation::entry("LCP", f64::NAN), &page).is_none());
        assert!(collector.store().is_empty());
    }

    #[test]
    fn test_unsupported_collects_nothing() {
        let mut collector = collector();
        collector.mark_unsupported();

        assert!(!collector.is_supported());
        assert!(collector
            .ingest(Observation::entry("LCP", 1200.0), &PageContext::default())
            .is_none());
        assert!(collector.store().is_empty());
    }

    #[test]
    fn test_reports_after_recording() {
        let sink = RecordingSink::default();
        let reporter = Reporter::new(ReporterConfig {
            report_to_analytics: true,
            enable_console_logging: true,
            ..Default::default()
        })
        .with_sink(sink.clone())
        .with_console(count_console);

        let mut collector: Collector = Collector::new(MetricStore::new(10), reporter);
        collector.ingest(Observation::entry("INP", 120.0), &PageContext::default());

        assert_eq!(collector.store().len(), 1);
        assert_eq!(sink.payloads.lock().unwrap()[0].name, "INP");
        assert!(CONSOLE_LINES.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_from_config_respects_persist_flag() {
        let storage = MemoryStorage::new();
        let config = MonitorConfig {
            persist: false,
            ..Default::default()
        };

        let mut collector = Collector::from_config(&config, Some(storage.clone()));
        collector.ingest(Observation::entry("LCP", 1.0), &PageContext::default());
        assert_eq!(storage.get("performance-metrics").unwrap(), None);

        let mut collector = Collector::from_config(&MonitorConfig::default(), Some(storage.clone()));
        collector.ingest(Observation::entry("LCP", 1.0), &PageContext::default());
        assert!(storage.get("performance-metrics").unwrap().is_some());
    }

    #[test]
    fn test_capability_from_option() {
        let supported: Capability<u8> = Some(3).into();
        assert!(supported.is_supported());
        assert_eq!(supported.handle(), Some(&3));

        let unsupported: Capability<u8> = None.into();
        assert!(!unsupported.is_supported());
        assert_eq!(unsupported.into_handle(), None);
    }
}
