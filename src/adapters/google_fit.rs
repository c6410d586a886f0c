//! Google Fit vendor adapter
//!
//! Accepts the processed point array (`{timestamp, value}` in epoch seconds) or
//! the raw `dataset:aggregate` response with its bucket envelope.

use serde::Deserialize;

use crate::error::ComputeError;
use crate::types::{RawRecord, RecordTime, Source};

use super::{epoch_seconds, lenient_f64, EpochPolicy, VendorPayloadAdapter, VendorRecord};

/// Google Fit payload adapter
pub struct GoogleFitAdapter;

impl VendorPayloadAdapter for GoogleFitAdapter {
    fn source(&self) -> Source {
        Source::GoogleFit
    }

    fn parse(&self, raw_json: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let payload: GoogleFitPayload = serde_json::from_str(raw_json)?;

        let records = match payload {
            GoogleFitPayload::Points(points) => points
                .into_iter()
                .map(|p| p.into_raw(EpochPolicy::Any))
                .collect(),
            GoogleFitPayload::Aggregate(aggregate) => aggregate.into_records(),
        };

        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GoogleFitPayload {
    Points(Vec<VendorRecord>),
    Aggregate(AggregateResponse),
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    bucket: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bucket {
    /// Sent as a string by the REST API
    #[serde(default, deserialize_with = "lenient_f64")]
    start_time_millis: Option<f64>,
    #[serde(default)]
    dataset: Vec<Dataset>,
}

#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(default)]
    point: Vec<DataPoint>,
}

#[derive(Debug, Deserialize)]
struct DataPoint {
    #[serde(default)]
    value: Vec<DataValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataValue {
    #[serde(default, deserialize_with = "lenient_f64")]
    fp_val: Option<f64>,
}

impl AggregateResponse {
    fn into_records(self) -> Vec<RawRecord> {
        let mut records = Vec::new();

        for bucket in self.bucket {
            let time = bucket
                .start_time_millis
                .map(|ms| ms / 1000.0)
                .and_then(|secs| epoch_seconds(secs, EpochPolicy::Any))
                .map_or(RecordTime::Missing, RecordTime::Epoch);

            let readings = bucket
                .dataset
                .iter()
                .flat_map(|d| d.point.iter())
                .flat_map(|p| p.value.iter())
                .filter_map(|v| v.fp_val);

            for reading in readings {
                records.push(RawRecord {
                    time: time.clone(),
                    avg: None,
                    value: Some(reading),
                    min: None,
                    max: None,
                    resting_heart_rate: None,
                });
            }
        }

        records
    }
}
