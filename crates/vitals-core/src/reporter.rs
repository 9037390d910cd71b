//! Best-effort delivery of normalized metrics
//!
//! The [`Reporter`] decides per metric whether it is sampled in, optionally
//! logs it, and hands an [`AnalyticsPayload`] to every registered
//! [`MetricSink`]. Sinks are fire-and-forget: they own their own error
//! handling and never report failures back.

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collector::PageContext;
use crate::config::ReporterConfig;
use crate::metric::{system_clock, Clock, Metric, Rating};

/// Source of uniform draws in `[0, 1)`
pub type Sampler = fn() -> f64;

/// Logs a metric when console logging is enabled
pub type ConsoleLogger = fn(&Metric);

/// Uniform draw in `[0, 1)` from the operating system RNG
pub fn os_sampler() -> f64 {
    (OsRng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/// Default console logger, emits a `tracing` event on the `vitals` target
pub fn log_metric(metric: &Metric) {
    info!(
        target: "vitals",
        rating = %metric.rating,
        "[Web Vitals] {}: {}",
        metric.name,
        metric.value
    );
}

/// Body sent to the analytics endpoint
///
/// The metric's own fields plus ambient context. `url` is the full page URL
/// when known and `timestamp` is the time of sending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPayload {
    pub name: String,
    pub value: f64,
    pub rating: Rating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub timestamp: u64,
}

impl AnalyticsPayload {
    pub fn new(metric: &Metric, page: &PageContext, timestamp: u64) -> Self {
        Self {
            name: metric.name.clone(),
            value: metric.value,
            rating: metric.rating,
            delta: metric.delta,
            url: page.href.clone().or_else(|| metric.url.clone()),
            user_agent: page.user_agent.clone(),
            timestamp,
        }
    }
}

/// Destination for analytics payloads
///
/// Implementations must not block and must swallow their own failures.
pub trait MetricSink: Send + Sync {
    fn send(&self, payload: &AnalyticsPayload);
}

pub struct Reporter {
    config: ReporterConfig,
    sinks: Vec<Box<dyn MetricSink>>,
    sampler: Sampler,
    console: ConsoleLogger,
    clock: Clock,
}

impl Reporter {
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
            sampler: os_sampler,
            console: log_metric,
            clock: system_clock,
        }
    }

    /// Register an analytics sink
    pub fn with_sink(mut self, sink: impl MetricSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_console(mut self, console: ConsoleLogger) -> Self {
        self.console = console;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Report one metric
    ///
    /// Returns `false` when the metric was sampled out and no sink was called.
    pub fn report(&self, metric: &Metric, page: &PageContext) -> bool {
        if !self.sampled_in() {
            debug!("Metric {} sampled out", metric.name);
            return false;
        }

        if self.config.enable_console_logging {
            (self.console)(metric);
        }

        if self.config.report_to_analytics {
            let payload = AnalyticsPayload::new(metric, page, (self.clock)());
            for sink in &self.sinks {
                sink.send(&payload);
            }
        }

        true
    }

    fn sampled_in(&self) -> bool {
        let rate = self.config.sample_rate;
        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 || rate.is_nan() {
            return false;
        }
        (self.sampler)() < rate
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(ReporterConfig::default())
    }
}
