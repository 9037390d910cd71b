//! Derived statistics over a store snapshot
//!
//! The aggregator holds no state. Every call reads the store once and computes
//! from that snapshot, so repeated calls without an intervening `record` give
//! identical results.
//!
//! The windowing constants below are fixed: a 5-sample rating vote, a
//! 10-sample minimum for a trend and a 10% change threshold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::metric::{Metric, Rating};
use crate::storage::KeyValueStorage;
use crate::store::MetricStore;
use crate::thresholds::{is_lower_better, CORE_METRICS};

/// Number of most recent samples that vote on a rating
pub const RATING_WINDOW: usize = 5;
/// Minimum samples before a trend other than stable is reported
pub const TREND_MIN_SAMPLES: usize = 10;
/// Relative change between halves that still counts as stable
pub const TREND_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

/// Per-name summary of the considered metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub name: String,
    /// Arithmetic mean of `value`
    pub average: f64,
    pub count: usize,
    /// Majority vote of the most recent samples
    pub rating: Rating,
    pub trend: Trend,
}

pub struct Aggregator;

impl Aggregator {
    /// Summarize each metric name in the store, optionally limited to `window`
    pub fn averages_by_name<P: KeyValueStorage>(
        store: &MetricStore<P>,
        window: Option<Duration>,
    ) -> BTreeMap<String, Aggregate> {
        Self::summarize(&store.query(None, window))
    }

    /// Simplified overall score from the latest LCP, FID and CLS ratings
    ///
    /// Each present core metric contributes 100 (good), 75 (needs-improvement)
    /// or 25 (poor); the result is the unweighted mean, rounded. This is a
    /// dashboard heuristic, not a Lighthouse-style weighted performance score.
    /// Returns `None` when none of the three metrics is present.
    pub fn overall_score<P: KeyValueStorage>(
        store: &MetricStore<P>,
        window: Option<Duration>,
    ) -> Option<u32> {
        Self::score(&store.query(None, window))
    }

    /// Group metrics by name and summarize each group
    pub fn summarize(metrics: &[Metric]) -> BTreeMap<String, Aggregate> {
        let mut groups: BTreeMap<&str, Vec<&Metric>> = BTreeMap::new();
        for metric in metrics {
            groups.entry(metric.name.as_str()).or_default().push(metric);
        }

        groups
            .into_iter()
            .map(|(name, group)| {
                let values: Vec<f64> = group.iter().map(|m| m.value).collect();
                let ratings: Vec<Rating> = group.iter().map(|m| m.rating).collect();
                let aggregate = Aggregate {
                    name: name.to_string(),
                    average: mean(&values),
                    count: group.len(),
                    rating: Self::majority_rating(&ratings),
                    trend: Self::trend(name, &values),
                };
                (name.to_string(), aggregate)
            })
            .collect()
    }

    /// Overall score over an already-filtered list of metrics
    pub fn score(metrics: &[Metric]) -> Option<u32> {
        let scores: Vec<u32> = CORE_METRICS
            .iter()
            .filter_map(|name| metrics.iter().rev().find(|m| m.name == *name))
            .map(|m| m.rating.score())
            .collect();

        if scores.is_empty() {
            return None;
        }

        let total: u32 = scores.iter().sum();
        Some((total as f64 / scores.len() as f64).round() as u32)
    }

    /// Vote over the last [`RATING_WINDOW`] ratings, given in insertion order
    ///
    /// A strict majority of good votes rates good. No good votes, or a strict
    /// majority of poor votes, rates poor. Everything else (ties, a good
    /// minority) rates needs-improvement.
    pub fn majority_rating(ratings: &[Rating]) -> Rating {
        let recent = &ratings[ratings.len().saturating_sub(RATING_WINDOW)..];
        let good = recent.iter().filter(|r| **r == Rating::Good).count();
        let poor = recent.iter().filter(|r| **r == Rating::Poor).count();

        if good * 2 > recent.len() {
            Rating::Good
        } else if good == 0 || poor * 2 > recent.len() {
            Rating::Poor
        } else {
            Rating::NeedsImprovement
        }
    }

    /// Compare the mean of the first half of `values` against the second half
    pub fn trend(name: &str, values: &[f64]) -> Trend {
        if values.len() < TREND_MIN_SAMPLES {
            return Trend::Stable;
        }

        let (first, second) = values.split_at(values.len() / 2);
        let first_mean = mean(first);
        if first_mean == 0.0 {
            return Trend::Stable;
        }

        let change = (mean(second) - first_mean) / first_mean;
        if change.abs() <= TREND_THRESHOLD {
            return Trend::Stable;
        }

        let rising = change > 0.0;
        match (is_lower_better(name), rising) {
            (true, false) | (false, true) => Trend::Improving,
            (true, true) | (false, false) => Trend::Declining,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
