//! PerformanceObserver subscriptions and entry-to-observation mapping
//!
//! Each supported entry type gets its own buffered observer. Entries are
//! copied into a [`RawEntry`] and mapped by an [`EntryMapper`], which holds the
//! running state some metrics need (the CLS sum, the worst interaction). The
//! mapping itself has no browser dependency.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Object, Reflect};
use vitals_core::{Capability, Collector, Observation};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{PerformanceObserver, PerformanceObserverEntryList, PerformanceObserverInit};

use crate::page;
use crate::storage::{describe, BrowserStorage};

/// Entry types observed, in subscription order
pub const ENTRY_TYPES: [&str; 6] = [
    "largest-contentful-paint",
    "layout-shift",
    "first-input",
    "event",
    "paint",
    "navigation",
];

/// Minimum event duration reported to the INP observer, in ms
const EVENT_DURATION_THRESHOLD: f64 = 16.0;

/// Probe for the Performance Observation API
///
/// Supported when running in a window that defines `PerformanceObserver`. The
/// handle holds the entry types listed in `PerformanceObserver.supportedEntryTypes`;
/// browsers that predate that list are assumed to accept every observed type.
pub fn probe() -> Capability<Vec<String>> {
    let Some(window) = web_sys::window() else {
        return Capability::Unsupported;
    };

    let ctor = match Reflect::get(&window, &"PerformanceObserver".into()) {
        Ok(ctor) if ctor.is_function() => ctor,
        _ => return Capability::Unsupported,
    };

    let listed = Reflect::get(&ctor, &"supportedEntryTypes".into())
        .ok()
        .filter(Array::is_array)
        .map(|types| {
            Array::from(&types)
                .iter()
                .filter_map(|t| t.as_string())
                .collect()
        });

    Capability::Supported(
        listed.unwrap_or_else(|| ENTRY_TYPES.iter().map(|t| t.to_string()).collect()),
    )
}

/// Observed entry types the browser supports, in subscription order
pub fn subscribed_types(supported: &[String]) -> Vec<&'static str> {
    ENTRY_TYPES
        .iter()
        .copied()
        .filter(|entry_type| supported.iter().any(|s| s == entry_type))
        .collect()
}

/// Fields of a `PerformanceEntry` and its subtypes, zeroed when absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub entry_type: String,
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    /// `layout-shift` score
    pub value: f64,
    pub had_recent_input: bool,
    pub render_time: f64,
    pub load_time: f64,
    pub processing_start: f64,
    pub interaction_id: u64,
    pub response_start: f64,
}

impl RawEntry {
    pub fn from_js(entry: &JsValue) -> Self {
        Self {
            entry_type: string_field(entry, "entryType"),
            name: string_field(entry, "name"),
            start_time: number_field(entry, "startTime"),
            duration: number_field(entry, "duration"),
            value: number_field(entry, "value"),
            had_recent_input: Reflect::get(entry, &"hadRecentInput".into())
                .map(|v| v.is_truthy())
                .unwrap_or(false),
            render_time: number_field(entry, "renderTime"),
            load_time: number_field(entry, "loadTime"),
            processing_start: number_field(entry, "processingStart"),
            interaction_id: number_field(entry, "interactionId") as u64,
            response_start: number_field(entry, "responseStart"),
        }
    }
}

fn number_field(entry: &JsValue, key: &str) -> f64 {
    Reflect::get(entry, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

fn string_field(entry: &JsValue, key: &str) -> String {
    Reflect::get(entry, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_default()
}

/// Running cumulative layout shift
#[derive(Debug, Default)]
pub struct ClsAccumulator {
    total: f64,
}

impl ClsAccumulator {
    /// Add one shift; shifts right after user input don't count
    pub fn add(&mut self, value: f64, had_recent_input: bool) -> Option<Observation> {
        if had_recent_input || !value.is_finite() || value <= 0.0 {
            return None;
        }
        self.total += value;
        Some(Observation::entry("CLS", self.total).with_delta(value))
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

/// Longest interaction seen so far
#[derive(Debug, Default)]
pub struct InpTracker {
    worst: f64,
}

impl InpTracker {
    /// Reports only when the worst interaction grows
    pub fn add(&mut self, interaction_id: u64, duration: f64) -> Option<Observation> {
        // events outside an interaction carry id 0
        if interaction_id == 0 || !duration.is_finite() || duration <= self.worst {
            return None;
        }
        let delta = duration - self.worst;
        self.worst = duration;
        Some(
            Observation::entry("INP", duration)
                .with_delta(delta)
                .with_id(interaction_id.to_string()),
        )
    }
}

/// Maps raw entries to observations for the collector
#[derive(Debug, Default)]
pub struct EntryMapper {
    cls: ClsAccumulator,
    inp: InpTracker,
    last_lcp: Option<f64>,
    fid_seen: bool,
}

impl EntryMapper {
    pub fn map(&mut self, entry: &RawEntry) -> Option<Observation> {
        match entry.entry_type.as_str() {
            "largest-contentful-paint" => {
                let value = first_nonzero(&[entry.render_time, entry.load_time, entry.start_time]);
                let delta = value - self.last_lcp.unwrap_or(0.0);
                self.last_lcp = Some(value);
                Some(Observation::entry("LCP", value).with_delta(delta))
            }
            "layout-shift" => self.cls.add(entry.value, entry.had_recent_input),
            "first-input" if !self.fid_seen => {
                self.fid_seen = true;
                let delay = (entry.processing_start - entry.start_time).max(0.0);
                Some(Observation::entry("FID", delay).with_delta(delay))
            }
            "event" => self.inp.add(entry.interaction_id, entry.duration),
            "paint" if entry.name == "first-contentful-paint" => {
                Some(Observation::entry("FCP", entry.start_time).with_delta(entry.start_time))
            }
            "navigation" => Some(
                Observation::entry("TTFB", entry.response_start).with_delta(entry.response_start),
            ),
            _ => None,
        }
    }
}

/// `a || b || c` over numbers
fn first_nonzero(values: &[f64]) -> f64 {
    values.iter().copied().find(|v| *v != 0.0).unwrap_or(0.0)
}

type EntryCallback = Closure<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>;

/// A live observer; disconnected when dropped
pub struct EntryObserver {
    observer: PerformanceObserver,
    _callback: EntryCallback,
}

impl EntryObserver {
    pub fn disconnect(&self) {
        self.observer.disconnect();
    }
}

impl Drop for EntryObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Subscribe the collector to every observed entry type in `supported`
pub fn observe_all(
    collector: &Rc<RefCell<Collector<BrowserStorage>>>,
    supported: &[String],
) -> Vec<EntryObserver> {
    let mapper = Rc::new(RefCell::new(EntryMapper::default()));

    subscribed_types(supported)
        .into_iter()
        .filter_map(
            |entry_type| match observe(entry_type, collector.clone(), mapper.clone()) {
                Ok(observer) => Some(observer),
                Err(e) => {
                    web_sys::console::warn_1(
                        &format!("Cannot observe '{}': {}", entry_type, describe(&e)).into(),
                    );
                    None
                }
            },
        )
        .collect()
}

fn observe(
    entry_type: &str,
    collector: Rc<RefCell<Collector<BrowserStorage>>>,
    mapper: Rc<RefCell<EntryMapper>>,
) -> Result<EntryObserver, JsValue> {
    let callback: EntryCallback = Closure::wrap(Box::new(
        move |list: PerformanceObserverEntryList, _observer: PerformanceObserver| {
            let page = page::current();
            for entry in list.get_entries().iter() {
                let raw = RawEntry::from_js(&entry);
                let observation = mapper.borrow_mut().map(&raw);
                if let Some(observation) = observation {
                    collector.borrow_mut().ingest(observation, &page);
                }
            }
        },
    )
        as Box<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>);

    let observer = PerformanceObserver::new(callback.as_ref().unchecked_ref())?;

    let init: PerformanceObserverInit = Object::new().unchecked_into();
    Reflect::set(&init, &"type".into(), &entry_type.into())?;
    init.set_buffered(true);
    if entry_type == "event" {
        // not in the web-sys dictionary yet
        Reflect::set(
            &init,
            &"durationThreshold".into(),
            &EVENT_DURATION_THRESHOLD.into(),
        )?;
    }
    Reflect::get(&observer, &"observe".into())?
        .unchecked_into::<js_sys::Function>()
        .call1(&observer, &init)?;

    Ok(EntryObserver {
        observer,
        _callback: callback,
    })
}
