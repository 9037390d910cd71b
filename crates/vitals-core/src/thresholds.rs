//! Fixed rating thresholds per Core Web Vital
//!
//! Values follow the published web-vitals boundaries. They are constants, not
//! configuration: a value at or below `good` rates good, at or below `poor`
//! rates needs-improvement, anything above rates poor.

use crate::metric::Rating;

/// Upper bounds for the good and needs-improvement buckets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub good: f64,
    pub poor: f64,
}

pub const LCP: Thresholds = Thresholds { good: 2500.0, poor: 4000.0 };
pub const FID: Thresholds = Thresholds { good: 100.0, poor: 300.0 };
pub const INP: Thresholds = Thresholds { good: 200.0, poor: 500.0 };
pub const CLS: Thresholds = Thresholds { good: 0.1, poor: 0.25 };
pub const FCP: Thresholds = Thresholds { good: 1800.0, poor: 3000.0 };
pub const TTFB: Thresholds = Thresholds { good: 800.0, poor: 1800.0 };

/// Metrics whose trend improves as the value goes down.
///
/// Every other name, including INP and FCP, is treated as higher-is-better by
/// the trend classifier.
pub const LOWER_IS_BETTER: [&str; 4] = ["LCP", "CLS", "FID", "TTFB"];

/// The metrics that contribute to the overall score
pub const CORE_METRICS: [&str; 3] = ["LCP", "FID", "CLS"];

impl Thresholds {
    /// Look up the thresholds for a metric name, if it has any
    pub fn for_metric(name: &str) -> Option<Thresholds> {
        match name {
            "LCP" => Some(LCP),
            "FID" => Some(FID),
            "INP" => Some(INP),
            "CLS" => Some(CLS),
            "FCP" => Some(FCP),
            "TTFB" => Some(TTFB),
            _ => None,
        }
    }

    pub fn rate(&self, value: f64) -> Rating {
        if value <= self.good {
            Rating::Good
        } else if value <= self.poor {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        }
    }
}

/// Rate a value for the named metric, or `None` when the name has no thresholds
pub fn rate(name: &str, value: f64) -> Option<Rating> {
    Thresholds::for_metric(name).map(|t| t.rate(value))
}

pub fn is_lower_better(name: &str) -> bool {
    LOWER_IS_BETTER.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcp_buckets() {
        assert_eq!(rate("LCP", 1200.0), Some(Rating::Good));
        assert_eq!(rate("LCP", 2500.0), Some(Rating::Good));
        assert_eq!(rate("LCP", 2500.1), Some(Rating::NeedsImprovement));
        assert_eq!(rate("LCP", 4000.0), Some(Rating::NeedsImprovement));
        assert_eq!(rate("LCP", 4000.1), Some(Rating::Poor));
    }

    #[test]
    fn test_cls_buckets() {
        assert_eq!(rate("CLS", 0.0), Some(Rating::Good));
        assert_eq!(rate("CLS", 0.2), Some(Rating::NeedsImprovement));
        assert_eq!(rate("CLS", 0.3), Some(Rating::Poor));
    }

    #[test]
    fn test_remaining_vitals() {
        assert_eq!(rate("FID", 250.0), Some(Rating::NeedsImprovement));
        assert_eq!(rate("INP", 600.0), Some(Rating::Poor));
        assert_eq!(rate("FCP", 900.0), Some(Rating::Good));
        assert_eq!(rate("TTFB", 1000.0), Some(Rating::NeedsImprovement));
    }

    #[test]
    fn test_unknown_metric_has_no_thresholds() {
        assert_eq!(rate("hero-render", 10.0), None);
        // names are case sensitive
        assert_eq!(rate("lcp", 10.0), None);
    }

    #[test]
    fn test_polarity() {
        assert!(is_lower_better("LCP"));
        assert!(is_lower_better("TTFB"));
        assert!(!is_lower_better("INP"));
        assert!(!is_lower_better("custom"));
    }
}
