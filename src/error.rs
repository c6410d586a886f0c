//! Error types for Synheart Pulse

use crate::types::Source;
use thiserror::Error;

/// Errors that can occur while ingesting or reconciling heart-rate data.
///
/// The analytics stages themselves (zones, metrics, anomalies, quality) never
/// fail: insufficient data degrades to neutral results instead.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported vendor: {0}")]
    UnsupportedVendor(String),

    #[error("Source unavailable: {0} has no data for the requested period")]
    SourceUnavailable(Source),

    #[error("No heart rate data available from any source")]
    NoData,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
