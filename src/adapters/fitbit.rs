//! Fitbit vendor adapter
//!
//! Accepts either the dashboard's flat record array
//! (`{date, time, avg, min, max, restingHeartRate}`) or the raw Web API envelope
//! (`activities-heart` plus optional `activities-heart-intraday`).

use serde::Deserialize;
use serde_json::Value;

use crate::error::ComputeError;
use crate::types::{RawRecord, RecordTime, Source};

use super::{lenient_f64, lenient_string, EpochPolicy, VendorPayloadAdapter, VendorRecord};

/// Fitbit payload adapter
pub struct FitbitAdapter;

impl VendorPayloadAdapter for FitbitAdapter {
    fn source(&self) -> Source {
        Source::Fitbit
    }

    fn parse(&self, raw_json: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let payload: FitbitPayload = serde_json::from_str(raw_json)?;

        let records = match payload {
            // Intraday rows carry a row index in `timestamp`
            FitbitPayload::Records(rows) => rows
                .into_iter()
                .map(|r| r.into_raw(EpochPolicy::RejectRowIndex))
                .collect(),
            FitbitPayload::Envelope(envelope) => envelope.into_records(),
        };

        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FitbitPayload {
    Records(Vec<VendorRecord>),
    Envelope(FitbitEnvelope),
}

#[derive(Debug, Deserialize)]
struct FitbitEnvelope {
    #[serde(rename = "activities-heart", default)]
    activities_heart: Vec<FitbitDay>,
    #[serde(rename = "activities-heart-intraday", default)]
    intraday: Option<FitbitIntraday>,
}

#[derive(Debug, Deserialize)]
struct FitbitDay {
    #[serde(rename = "dateTime", default, deserialize_with = "lenient_string")]
    date_time: Option<String>,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Default, Deserialize)]
struct FitbitIntraday {
    #[serde(default)]
    dataset: Vec<FitbitIntradayPoint>,
}

#[derive(Debug, Deserialize)]
struct FitbitIntradayPoint {
    #[serde(default, deserialize_with = "lenient_string")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    value: Option<f64>,
}

impl FitbitDay {
    fn resting_heart_rate(&self) -> Option<f64> {
        self.value
            .get("restingHeartRate")
            .and_then(Value::as_f64)
            .filter(|v| *v > 0.0)
    }
}

impl FitbitEnvelope {
    fn into_records(self) -> Vec<RawRecord> {
        let dataset = self.intraday.unwrap_or_default().dataset;

        if !dataset.is_empty() {
            let base_date = self
                .activities_heart
                .first()
                .and_then(|d| d.date_time.clone());
            return dataset
                .into_iter()
                .map(|point| RawRecord {
                    time: match &base_date {
                        Some(date) => RecordTime::Local {
                            date: date.clone(),
                            time: point.time,
                        },
                        None => RecordTime::Missing,
                    },
                    avg: None,
                    value: point.value,
                    min: None,
                    max: None,
                    resting_heart_rate: None,
                })
                .collect();
        }

        self.activities_heart
            .iter()
            // a daily summary has no measured reading; its zone table is
            // configuration, not a band around one
            .map(|day| RawRecord {
                time: match &day.date_time {
                    Some(date) => RecordTime::Local {
                        date: date.clone(),
                        time: None,
                    },
                    None => RecordTime::Missing,
                },
                avg: None,
                value: None,
                min: None,
                max: None,
                resting_heart_rate: day.resting_heart_rate(),
            })
            .collect()
    }
}
