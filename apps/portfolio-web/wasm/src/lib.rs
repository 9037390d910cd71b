//! Portfolio Web Vitals - browser bindings
//!
//! Wires the `vitals-core` collector to the browser: PerformanceObserver
//! subscriptions, `localStorage` persistence, `fetch` reporting and the
//! screen-reader announcer.
//!
//! ```js
//! import init, { PerformanceMonitor, Announcer } from "./pkg/portfolio_wasm.js";
//!
//! await init();
//! const monitor = new PerformanceMonitor({ reporter: { reportToAnalytics: true, sampleRate: 0.5 } });
//! const averages = monitor.averages(60 * 60 * 1000);
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use vitals_core::export;
use vitals_core::{
    Aggregator, Collector, MetricStore, MonitorConfig, Observation, Rating, Reporter,
};
use wasm_bindgen::prelude::*;

pub mod announcer;
pub mod observer;
pub mod page;
pub mod sink;
pub mod storage;

pub use announcer::Announcer;

use observer::EntryObserver;
use sink::{console_metric, FetchSink};
use storage::BrowserStorage;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
}

/// Convert a JS millisecond window; negative, NaN or missing means unbounded
pub fn window_from_ms(window_ms: Option<f64>) -> Option<Duration> {
    window_ms
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| Duration::from_millis(ms as u64))
}

/// Serialize to plain JS objects rather than `Map`s
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(Into::into)
}

fn parse_config(config: JsValue) -> Result<MonitorConfig, JsValue> {
    let config: MonitorConfig = if config.is_undefined() || config.is_null() {
        MonitorConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config)?
    };
    config
        .validate()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(config)
}

/// Web Vitals monitor for dashboard widgets
#[wasm_bindgen]
pub struct PerformanceMonitor {
    collector: Rc<RefCell<Collector<BrowserStorage>>>,
    observers: Vec<EntryObserver>,
}

#[wasm_bindgen]
impl PerformanceMonitor {
    /// Start collecting with an optional `MonitorConfig`-shaped object
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<PerformanceMonitor, JsValue> {
        let config = parse_config(config)?;

        let mut reporter = Reporter::new(config.reporter.clone()).with_console(console_metric);
        if config.reporter.report_to_analytics {
            reporter = reporter.with_sink(FetchSink::new(config.reporter.endpoint.clone()));
        }

        let store = MetricStore::from_config(&config, BrowserStorage::local());
        let collector = Rc::new(RefCell::new(Collector::new(store, reporter)));

        let observers = match observer::probe().into_handle() {
            Some(supported) => observer::observe_all(&collector, &supported),
            None => {
                collector.borrow_mut().mark_unsupported();
                Vec::new()
            }
        };

        Ok(Self {
            collector,
            observers,
        })
    }

    #[wasm_bindgen(js_name = isSupported)]
    pub fn is_supported(&self) -> bool {
        self.collector.borrow().is_supported()
    }

    /// Record a page-defined metric; `rating` defaults to the thresholds
    ///
    /// Returns the recorded metric, or `undefined` when it was dropped.
    #[wasm_bindgen(js_name = recordCustom)]
    pub fn record_custom(
        &self,
        name: &str,
        value: f64,
        rating: Option<String>,
    ) -> Result<JsValue, JsValue> {
        let mut observation = Observation::entry(name, value);
        if let Some(rating) = rating {
            let rating: Rating = rating
                .parse()
                .map_err(|e: vitals_core::VitalsError| JsValue::from_str(&e.to_string()))?;
            observation = observation.with_rating(rating);
        }

        let recorded = self
            .collector
            .borrow_mut()
            .ingest(observation, &page::current());
        match recorded {
            Some(metric) => to_js(&metric),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Metrics filtered by exact name and/or a trailing window in ms
    #[wasm_bindgen]
    pub fn query(&self, name: Option<String>, window_ms: Option<f64>) -> Result<JsValue, JsValue> {
        let collector = self.collector.borrow();
        let metrics = collector
            .store()
            .query(name.as_deref(), window_from_ms(window_ms));
        to_js(&metrics)
    }

    /// Per-name aggregates keyed by metric name
    #[wasm_bindgen]
    pub fn averages(&self, window_ms: Option<f64>) -> Result<JsValue, JsValue> {
        let collector = self.collector.borrow();
        to_js(&Aggregator::averages_by_name(
            collector.store(),
            window_from_ms(window_ms),
        ))
    }

    #[wasm_bindgen(js_name = overallScore)]
    pub fn overall_score(&self, window_ms: Option<f64>) -> Option<u32> {
        Aggregator::overall_score(self.collector.borrow().store(), window_from_ms(window_ms))
    }

    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> Result<String, JsValue> {
        export::to_json(&self.collector.borrow().store().snapshot(), true)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = exportCsv)]
    pub fn export_csv(&self) -> String {
        export::to_csv(&self.collector.borrow().store().snapshot())
    }

    /// Drop all metrics, including the persisted copy
    #[wasm_bindgen]
    pub fn clear(&self) {
        self.collector.borrow_mut().store_mut().clear();
    }

    /// Disconnect every observer; recorded metrics stay queryable
    #[wasm_bindgen]
    pub fn dispose(&mut self) {
        for observer in self.observers.drain(..) {
            observer.disconnect();
        }
    }
}
