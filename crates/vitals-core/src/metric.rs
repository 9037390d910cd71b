//! Metric data model
//!
//! A [`Metric`] is the normalized record kept by the
//! [`MetricStore`](crate::store::MetricStore). Metrics are built by the
//! [`Collector`](crate::collector::Collector) from an [`Observation`], which is
//! either a raw entry delivered by the browser's performance instrumentation or
//! a custom measurement supplied by the page.
//!
//! The serialized form matches the persisted schema:
//!
//! ```json
//! {"name":"LCP","value":1834.2,"rating":"good","timestamp":1700000000000,"url":"/projects"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VitalsError};

/// Source of epoch milliseconds
pub type Clock = fn() -> u64;

/// Current time in epoch milliseconds
///
/// Backed by `chrono`, which reads `Date.now()` when compiled for `wasm32`.
pub fn system_clock() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Qualitative bucket assigned to a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
        }
    }

    /// Numeric score used by [`overall_score`](crate::aggregate::Aggregator::overall_score)
    pub fn score(&self) -> u32 {
        match self {
            Rating::Good => 100,
            Rating::NeedsImprovement => 75,
            Rating::Poor => 25,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = VitalsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "good" => Ok(Rating::Good),
            "needs-improvement" => Ok(Rating::NeedsImprovement),
            "poor" => Ok(Rating::Poor),
            other => Err(VitalsError::InvalidRating(other.to_string())),
        }
    }
}

/// A normalized performance measurement
///
/// Metrics are never mutated once recorded; the store only appends and evicts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    /// Metric identifier: "LCP", "CLS", "FID", "INP", "FCP", "TTFB" or a custom name
    pub name: String,
    /// Milliseconds for timing metrics, unitless score for CLS
    pub value: f64,
    pub rating: Rating,
    /// Capture time in epoch milliseconds
    pub timestamp: u64,
    /// Page path active when the metric was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Change since the previous report of the same metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, rating: Rating, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            value,
            rating,
            timestamp,
            url: None,
            delta: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }
}

/// An observation handed to the collector before normalization
///
/// Anything left as `None` is filled in by the collector: the rating from the
/// per-metric thresholds, the timestamp from the clock, the url from the
/// current [`PageContext`](crate::collector::PageContext).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Observation {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub delta: Option<f64>,
    /// Navigation or interaction id reported by the instrumentation
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Observation {
    /// A raw entry from the performance instrumentation
    pub fn entry(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            ..Default::default()
        }
    }

    /// A custom measurement with a caller-assigned rating
    pub fn custom(name: impl Into<String>, value: f64, rating: Rating) -> Self {
        Self {
            name: name.into(),
            value,
            rating: Some(rating),
            ..Default::default()
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Check the fields a [`Metric`] requires to hold its invariants
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VitalsError::InvalidMetric("name is empty".to_string()));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(VitalsError::InvalidMetric(format!(
                "{} value must be finite and non-negative, got {}",
                self.name, self.value
            )));
        }
        Ok(())
    }
}
