//! Vendor payload adapters
//!
//! This module provides adapters that parse raw vendor JSON payloads and resolve
//! them into [`RawRecord`]s. Every vendor-specific shape is handled here so the
//! normalizer only ever sees one record type.

mod apple_health;
mod fitbit;
mod google_fit;

pub use apple_health::AppleHealthAdapter;
pub use fitbit::FitbitAdapter;
pub use google_fit::GoogleFitAdapter;

use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ComputeError;
use crate::types::{RawRecord, RecordTime, Source};

/// Trait for vendor payload adapters
pub trait VendorPayloadAdapter {
    /// Source the adapter produces records for
    fn source(&self) -> Source;

    /// Parse raw JSON into raw records
    fn parse(&self, raw_json: &str) -> Result<Vec<RawRecord>, ComputeError>;
}

/// Adapter for payloads that are already a flat record array (mock data,
/// pre-processed exports).
pub struct RecordArrayAdapter {
    pub source: Source,
}

impl VendorPayloadAdapter for RecordArrayAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn parse(&self, raw_json: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let records: Vec<VendorRecord> = serde_json::from_str(raw_json)?;
        Ok(records
            .into_iter()
            .map(|r| r.into_raw(EpochPolicy::Any))
            .collect())
    }
}

/// Pick the adapter for a source
pub fn adapter_for(source: Source) -> Result<Box<dyn VendorPayloadAdapter>, ComputeError> {
    match source {
        Source::Fitbit => Ok(Box::new(FitbitAdapter)),
        Source::GoogleFit => Ok(Box::new(GoogleFitAdapter)),
        Source::AppleHealth => Ok(Box::new(AppleHealthAdapter)),
        Source::Mock => Ok(Box::new(RecordArrayAdapter {
            source: Source::Mock,
        })),
        Source::Combined => Err(ComputeError::UnsupportedVendor(
            "combined is a reconciliation result, not a payload source".to_string(),
        )),
    }
}

/// Timestamps at or above this are epoch milliseconds rather than seconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Below this a "timestamp" is a row index (2001-09-09 in epoch seconds)
const EPOCH_SECONDS_FLOOR: f64 = 1e9;

#[derive(Debug, Clone, Copy)]
pub(crate) enum EpochPolicy {
    /// Any finite number is an epoch value
    Any,
    /// Small numbers are row indices and must be ignored
    RejectRowIndex,
}

/// Convert a numeric vendor timestamp to epoch seconds.
///
/// Values outside the representable date range are rejected rather than clamped.
pub(crate) fn epoch_seconds(raw: f64, policy: EpochPolicy) -> Option<i64> {
    if !raw.is_finite() {
        return None;
    }
    let seconds = if raw.abs() >= EPOCH_MILLIS_THRESHOLD {
        (raw / 1000.0).floor()
    } else {
        match policy {
            EpochPolicy::RejectRowIndex if raw < EPOCH_SECONDS_FLOOR => return None,
            _ => raw.floor(),
        }
    };

    // `as` saturates, which lands outside chrono's range
    let seconds = seconds as i64;
    DateTime::from_timestamp(seconds, 0).map(|_| seconds)
}

/// The flat record shape shared by Fitbit, Apple Health and pre-processed exports
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VendorRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub timestamp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max: Option<f64>,
    #[serde(default, alias = "resting", deserialize_with = "lenient_f64")]
    pub resting_heart_rate: Option<f64>,
}

impl VendorRecord {
    pub(crate) fn into_raw(self, policy: EpochPolicy) -> RawRecord {
        let epoch = self.timestamp.and_then(|ts| epoch_seconds(ts, policy));
        let time = match (epoch, self.date) {
            (Some(ts), _) => RecordTime::Epoch(ts),
            (None, Some(date)) if !date.trim().is_empty() => RecordTime::Local {
                date,
                time: self.time.filter(|t| !t.trim().is_empty()),
            },
            _ => RecordTime::Missing,
        };

        RawRecord {
            time,
            avg: self.avg,
            value: self.value,
            // vendors report 0 for "not measured"
            min: positive(self.min),
            max: positive(self.max),
            resting_heart_rate: positive(self.resting_heart_rate),
        }
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// Accept a number or a numeric string; anything else becomes `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()))
}

/// Accept a string (or a number rendered as one); anything else becomes `None`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
