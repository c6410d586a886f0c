//! Core types for the Synheart Pulse pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw vendor records, canonical samples, derived metrics, anomalies,
//! quality scores and reconciled datasets.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ComputeError;

/// Data source identifier for provenance tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    Fitbit,
    GoogleFit,
    AppleHealth,
    Combined,
    Mock,
}

impl Source {
    /// Vendor sources that can carry their own dataset
    pub const VENDORS: [Source; 3] = [Source::Fitbit, Source::GoogleFit, Source::AppleHealth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Fitbit => "fitbit",
            Source::GoogleFit => "googleFit",
            Source::AppleHealth => "appleHealth",
            Source::Combined => "combined",
            Source::Mock => "mock",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "fitbit" => Ok(Source::Fitbit),
            "googlefit" => Ok(Source::GoogleFit),
            "applehealth" | "apple" => Ok(Source::AppleHealth),
            "combined" => Ok(Source::Combined),
            "mock" => Ok(Source::Mock),
            _ => Err(ComputeError::UnsupportedVendor(s.to_string())),
        }
    }
}

/// Time information carried by a raw vendor record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordTime {
    /// Explicit epoch timestamp in seconds
    Epoch(i64),
    /// Calendar date with an optional wall-clock time, in the user's local offset
    Local { date: String, time: Option<String> },
    /// No usable time information
    Missing,
}

/// A single raw reading, resolved from whichever shape the vendor sent.
///
/// Adapters produce these; the normalizer is the only consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub time: RecordTime,
    /// Aggregated reading (Fitbit / Apple Health summaries)
    pub avg: Option<f64>,
    /// Point reading (Google Fit, intraday rows)
    pub value: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub resting_heart_rate: Option<f64>,
}

impl RawRecord {
    /// Convenience constructor for a point reading at an epoch timestamp
    pub fn point(timestamp: i64, value: f64) -> Self {
        Self {
            time: RecordTime::Epoch(timestamp),
            avg: None,
            value: Some(value),
            min: None,
            max: None,
            resting_heart_rate: None,
        }
    }

    /// The authoritative reading: `avg`, then `value`, then 0.
    pub fn reading(&self) -> f64 {
        self.avg.or(self.value).unwrap_or(0.0)
    }
}

/// How precisely a sample's timestamp is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampResolution {
    /// Resolved from an epoch value or a date plus clock time
    Second,
    /// Only a calendar date was available
    Day,
}

/// Canonical heart-rate sample produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateSample {
    /// Epoch seconds
    pub timestamp: i64,
    /// Beats per minute, the authoritative reading
    pub value: f64,
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resting_heart_rate: Option<f64>,
    pub source: Source,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`, 24-hour
    pub time: String,
    /// `hh:mm:ss AM/PM`
    pub formatted_time: String,
    pub zone_name: Option<String>,
    pub zone_color: Option<String>,
    /// Set when the timestamp could not be parsed and the normalization clock was used
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    pub resolution: TimestampResolution,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub min_estimated: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub max_estimated: bool,
}

/// Normalized datasets keyed by source
pub type SourceDatasets = BTreeMap<Source, Vec<HeartRateSample>>;

/// Quality score (0-100) per source
pub type QualityScores = BTreeMap<Source, u32>;

/// One zone's share of a sample set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneShare {
    pub name: &'static str,
    /// Percentage of samples, 0-100
    pub value: u32,
    pub count: usize,
    pub color: &'static str,
    pub gradient: &'static str,
    pub intensity: &'static str,
    pub description: &'static str,
    pub benefits: &'static str,
    pub recommendation: &'static str,
}

/// HRV status band derived from the HRV score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HrvStatus {
    Excellent,
    Good,
    Moderate,
    Fair,
    Poor,
    #[default]
    Unknown,
}

/// Aggregate cardiovascular metrics for one sample set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartMetrics {
    /// Number of valid samples (value > 30) the metrics were computed from
    pub sample_count: usize,
    pub avg_hr: f64,
    pub max_hr: f64,
    pub min_hr: f64,
    pub median_hr: f64,
    pub resting_hr: f64,
    /// Root mean square of successive differences
    pub rmssd: f64,
    pub hrv_score: u32,
    pub hrv_status: HrvStatus,
    pub recovery_rate: f64,
    pub vo2_max: f64,
    pub cardiac_efficiency: f64,
    pub recovery_score: u32,
    pub stress_level: u32,
    pub heart_age_estimate: u32,
    pub cardio_fitness_score: u32,
}

/// Anomaly severity, ordered Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Detection rule that produced an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    SuddenChange,
    SustainedHigh,
    UnusuallyLow,
    UnusuallyHigh,
    AlternatingPattern,
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::SuddenChange => "Sudden change",
            AnomalyKind::SustainedHigh => "Sustained high heart rate",
            AnomalyKind::UnusuallyLow => "Unusually low HR",
            AnomalyKind::UnusuallyHigh => "Unusually high HR",
            AnomalyKind::AlternatingPattern => "Alternating pattern",
        }
    }
}

/// A flagged statistical or pattern anomaly
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    /// BPM for level rules, BPM delta for sudden changes
    pub value: f64,
    /// Position in the caller's sample slice
    pub index: usize,
    pub severity: Severity,
    /// Formatted time of the flagged sample
    pub time: String,
    pub timestamp: i64,
    pub detail: String,
}

/// Per-component quality breakdown for one dataset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityBreakdown {
    pub data_points: f64,
    pub completeness: f64,
    pub recency: f64,
    /// Rounded sum, 0-100
    pub total: u32,
}

/// One source's reading inside a combined record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceReading {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// A minute-aligned record merging every source that reported in that minute.
///
/// Serializes flat, with `{source}Avg`, `{source}Min` and `{source}Max` keys.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSample {
    /// Epoch seconds rounded to the nearest minute
    pub timestamp: i64,
    pub date: String,
    pub time: String,
    pub formatted_time: String,
    pub readings: BTreeMap<Source, SourceReading>,
}

impl CombinedSample {
    pub fn reading(&self, source: Source) -> Option<&SourceReading> {
        self.readings.get(&source)
    }
}

impl Serialize for CombinedSample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4 + self.readings.len() * 3))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("date", &self.date)?;
        map.serialize_entry("time", &self.time)?;
        map.serialize_entry("formattedTime", &self.formatted_time)?;
        for (source, reading) in &self.readings {
            map.serialize_entry(&format!("{source}Avg"), &reading.avg)?;
            map.serialize_entry(&format!("{source}Min"), &reading.min)?;
            map.serialize_entry(&format!("{source}Max"), &reading.max)?;
        }
        map.end()
    }
}

/// Records returned by reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "records", rename_all = "camelCase")]
pub enum ReconciledData {
    Single(Vec<HeartRateSample>),
    Combined(Vec<CombinedSample>),
}

/// Reconciled dataset plus the source actually used
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
    pub source_used: Source,
    pub data: ReconciledData,
}

/// Full analysis of one reconciled dataset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateAnalysis {
    pub source_used: Source,
    pub quality_scores: QualityScores,
    /// Reconciled samples at full resolution
    pub samples: Vec<HeartRateSample>,
    /// Samples bounded for rendering
    pub display: Vec<HeartRateSample>,
    pub zones: Vec<ZoneShare>,
    pub metrics: HeartMetrics,
    pub anomalies: Vec<Anomaly>,
    pub high_stress: Vec<HeartRateSample>,
}
