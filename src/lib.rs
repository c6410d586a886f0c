//! Synheart Pulse - heart-rate analytics engine for multi-source wearable data
//!
//! Pulse turns raw heart-rate payloads from several wearable vendors into one
//! canonical series and analyzes it through a deterministic pipeline:
//! vendor adaptation → normalization → quality scoring → source reconciliation
//! → zones, metrics, anomalies and display downsampling.
//!
//! ## Modules
//!
//! - **Ingestion**: vendor adapters (Fitbit, Google Fit, Apple Health) and the normalizer
//! - **Analytics**: zones, metrics, anomalies, quality scores, downsampling
//! - **Reconciliation**: automatic, combined or explicit source policies

pub mod adapters;
pub mod anomaly;
pub mod config;
pub mod downsample;
pub mod error;
#[cfg(feature = "cli")]
pub mod logging;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod quality;
pub mod reconcile;
pub mod types;
pub mod zones;

pub use anomaly::AnomalyDetector;
pub use config::AnalyticsConfig;
pub use error::ComputeError;
pub use metrics::MetricsEngine;
pub use normalizer::Normalizer;
pub use pipeline::{normalize_payload, PulseProcessor};
pub use quality::QualityScorer;
pub use reconcile::{select_source, SourcePolicy};
pub use types::{HeartRateAnalysis, HeartRateSample, Source, SourceDatasets};

/// Pulse version reported by the CLI
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported alongside analysis output
pub const PRODUCER_NAME: &str = "synheart-pulse";
