//! Apple Health vendor adapter
//!
//! Daily summaries use `resting` for the resting heart rate; intraday exports
//! arrive wrapped as `{heart_rate: {date, intraday: [{time, value}]}}` and
//! multi-day exports as `{heart_rate: {data: [...]}}`.

use serde::Deserialize;

use crate::error::ComputeError;
use crate::types::{RawRecord, RecordTime, Source};

use super::{lenient_f64, lenient_string, EpochPolicy, VendorPayloadAdapter, VendorRecord};

/// Apple Health payload adapter
pub struct AppleHealthAdapter;

impl VendorPayloadAdapter for AppleHealthAdapter {
    fn source(&self) -> Source {
        Source::AppleHealth
    }

    fn parse(&self, raw_json: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let payload: ApplePayload = serde_json::from_str(raw_json)?;

        let records = match payload {
            ApplePayload::Records(rows) => rows
                .into_iter()
                .map(|r| r.into_raw(EpochPolicy::Any))
                .collect(),
            ApplePayload::Envelope { heart_rate } => heart_rate.into_records(),
        };

        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApplePayload {
    Records(Vec<VendorRecord>),
    Envelope { heart_rate: AppleHeartRate },
}

#[derive(Debug, Deserialize)]
struct AppleHeartRate {
    #[serde(default, deserialize_with = "lenient_string")]
    date: Option<String>,
    #[serde(default)]
    intraday: Vec<IntradayPoint>,
    #[serde(default)]
    data: Vec<VendorRecord>,
}

#[derive(Debug, Deserialize)]
struct IntradayPoint {
    #[serde(default, deserialize_with = "lenient_string")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    value: Option<f64>,
}

impl AppleHeartRate {
    fn into_records(self) -> Vec<RawRecord> {
        let date = self.date;
        let mut records: Vec<RawRecord> = self
            .intraday
            .into_iter()
            .map(|point| RawRecord {
                time: match &date {
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

        records.extend(
            self.data
                .into_iter()
                .map(|r| r.into_raw(EpochPolicy::Any)),
        );

        records
    }
}
