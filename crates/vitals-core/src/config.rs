//! Monitor configuration
//!
//! One configuration struct covers every collector/reporter variant the site
//! uses. It deserializes from TOML (service) or from a JS object (browser) and
//! every field has a default.
//!
//! ```toml
//! capacity = 1000
//! storage_key = "performance-metrics"
//! persist = true
//!
//! [reporter]
//! report_to_analytics = true
//! sample_rate = 0.5
//! enable_console_logging = false
//! endpoint = "/api/analytics/web-vitals"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, VitalsError};
use crate::store::{DEFAULT_CAPACITY, DEFAULT_STORAGE_KEY};

pub const DEFAULT_ENDPOINT: &str = "/api/analytics/web-vitals";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum number of metrics kept by the store
    pub capacity: usize,
    /// Key the store is persisted under
    #[serde(alias = "storageKey")]
    pub storage_key: String,
    /// Mirror the store to key-value storage
    pub persist: bool,
    pub reporter: ReporterConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            persist: true,
            reporter: ReporterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Forward each metric to the analytics endpoint
    #[serde(alias = "reportToAnalytics")]
    pub report_to_analytics: bool,
    /// Fraction of metrics reported, in `[0, 1]`
    #[serde(alias = "sampleRate")]
    pub sample_rate: f64,
    /// Log each metric to the console
    #[serde(alias = "enableConsoleLogging")]
    pub enable_console_logging: bool,
    /// Analytics endpoint path or URL
    pub endpoint: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            report_to_analytics: false,
            sample_rate: 1.0,
            enable_console_logging: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(VitalsError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.persist && self.storage_key.is_empty() {
            return Err(VitalsError::InvalidConfig(
                "storage_key must not be empty when persist is enabled".to_string(),
            ));
        }
        self.reporter.validate()
    }
}

impl ReporterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(VitalsError::InvalidConfig(format!(
                "sample_rate must be within [0, 1], got {}",
                self.sample_rate
            )));
        }
        if self.report_to_analytics && self.endpoint.is_empty() {
            return Err(VitalsError::InvalidConfig(
                "endpoint must be set when report_to_analytics is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
