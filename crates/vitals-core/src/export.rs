//! JSON and CSV export of the metric history

use std::fmt::Write;

use crate::error::Result;
use crate::metric::Metric;

pub const CSV_HEADER: &str = "name,value,rating,timestamp,url";

/// Serialize metrics in the persisted schema
pub fn to_json(metrics: &[Metric], pretty: bool) -> Result<String> {
    let output = if pretty {
        serde_json::to_string_pretty(metrics)?
    } else {
        serde_json::to_string(metrics)?
    };
    Ok(output)
}

/// Parse metrics previously produced by [`to_json`]
pub fn from_json(json: &str) -> Result<Vec<Metric>> {
    Ok(serde_json::from_str(json)?)
}

/// Flat CSV with columns `name,value,rating,timestamp,url`
pub fn to_csv(metrics: &[Metric]) -> String {
    let mut output = String::with_capacity(64 * (metrics.len() + 1));
    output.push_str(CSV_HEADER);
    output.push('\n');

    for metric in metrics {
        // writing to a String cannot fail
        let _ = writeln!(
            output,
            "{},{},{},{},{}",
            escape_csv(&metric.name),
            metric.value,
            metric.rating,
            metric.timestamp,
            escape_csv(metric.url.as_deref().unwrap_or(""))
        );
    }

    output
}

/// Quote a CSV field when it contains a delimiter, quote or line break
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
