//! Analytics configuration
//!
//! Tunables for display bounds, anomaly limits and source reconciliation,
//! loadable from TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ComputeError;
use crate::types::Source;

const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Configuration for a [`crate::pipeline::PulseProcessor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Maximum number of samples returned for display
    pub downsample_target: usize,
    /// Anomalies kept in the analysis summary
    pub anomaly_summary_limit: usize,
    /// Anomalies kept for detail views
    pub anomaly_detail_limit: usize,
    pub high_stress_limit: usize,
    /// Fixed offset applied to naive vendor dates and to display strings
    pub utc_offset_minutes: i32,
    /// Tie-break order for automatic source selection
    pub source_priority: Vec<Source>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            downsample_target: 1000,
            anomaly_summary_limit: 3,
            anomaly_detail_limit: 5,
            high_stress_limit: 3,
            utc_offset_minutes: 0,
            source_priority: vec![
                Source::GoogleFit,
                Source::Fitbit,
                Source::AppleHealth,
                Source::Mock,
            ],
        }
    }
}

impl AnalyticsConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ComputeError> {
        let config: AnalyticsConfig =
            toml::from_str(content).map_err(|e| ComputeError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.downsample_target < 2 {
            return Err(ComputeError::ConfigError(format!(
                "downsample_target must be at least 2, got {}",
                self.downsample_target
            )));
        }

        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ComputeError::ConfigError(format!(
                "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}, got {}",
                self.utc_offset_minutes
            )));
        }

        if self.source_priority.is_empty() {
            return Err(ComputeError::ConfigError(
                "source_priority must not be empty".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for source in &self.source_priority {
            if !seen.insert(*source) {
                return Err(ComputeError::ConfigError(format!(
                    "source_priority lists {source} more than once"
                )));
            }
        }

        Ok(())
    }
}
