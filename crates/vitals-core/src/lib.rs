//! Client-side performance telemetry for the portfolio site
//!
//! This crate holds the target-independent half of the Web Vitals pipeline:
//!
//! - **Collector**: normalizes raw performance observations into [`Metric`]s
//! - **Metric Store**: bounded, insertion-ordered history with optional persistence
//! - **Aggregator**: per-metric averages, rating votes and trends
//! - **Reporter**: sampled, best-effort delivery to analytics sinks
//! - **Export**: JSON and CSV dumps of the history
//!
//! Browser bindings live in `portfolio-wasm`; the analytics endpoint lives in
//! `vitals-api`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vitals_core::{Aggregator, Collector, MonitorConfig, Observation, PageContext};
//! use vitals_core::storage::MemoryStorage;
//!
//! let mut collector = Collector::from_config(&MonitorConfig::default(), Some(MemoryStorage::new()));
//! let page = PageContext::with_path("/");
//!
//! collector.ingest(Observation::entry("LCP", 1900.0), &page);
//! collector.ingest(Observation::entry("FID", 350.0), &page);
//!
//! let averages = Aggregator::averages_by_name(collector.store(), Some(Duration::from_secs(3600)));
//! assert_eq!(averages["LCP"].count, 1);
//!
//! // good (100) and poor (25), rounded
//! assert_eq!(Aggregator::overall_score(collector.store(), None), Some(63));
//! ```

pub mod aggregate;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod metric;
pub mod reporter;
pub mod storage;
pub mod store;
pub mod thresholds;

// Re-export main types for convenience
pub use aggregate::{Aggregate, Aggregator, Trend};
pub use collector::{Capability, Collector, PageContext};
pub use config::{MonitorConfig, ReporterConfig};
pub use error::{Result, VitalsError};
pub use metric::{Metric, Observation, Rating};
pub use reporter::{AnalyticsPayload, MetricSink, Reporter};
pub use storage::{KeyValueStorage, MemoryStorage};
pub use store::MetricStore;
