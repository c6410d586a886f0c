//! Sample normalization
//!
//! This module maps raw vendor records onto the canonical [`HeartRateSample`]:
//! - authoritative reading resolved (`avg`, then `value`, then 0)
//! - timestamps resolved to epoch seconds, with a fallback that is flagged
//! - ±10% band filled in when the vendor sent no min/max
//! - display strings and zone regenerated from the timestamp and value

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use tracing::{debug, warn};

use crate::types::{HeartRateSample, RawRecord, RecordTime, Source, TimestampResolution};
use crate::zones;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Clock formats vendors use, 24-hour first
const TIME_FORMATS: [&str; 4] = ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Display strings for a timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockLabels {
    pub date: String,
    pub time: String,
    pub formatted_time: String,
}

/// Normalizer for converting raw records to canonical samples
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    offset: FixedOffset,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self { offset: utc() }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl Normalizer {
    /// Normalizer reading naive vendor times at a fixed UTC offset.
    ///
    /// Offsets outside ±24h fall back to UTC.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(utc);
        Self { offset }
    }

    /// Normalize records, using the current time for unparsable timestamps
    pub fn normalize(&self, records: &[RawRecord], source: Source) -> Vec<HeartRateSample> {
        self.normalize_at(records, source, Utc::now())
    }

    /// Normalize records with an explicit fallback clock
    pub fn normalize_at(
        &self,
        records: &[RawRecord],
        source: Source,
        now: DateTime<Utc>,
    ) -> Vec<HeartRateSample> {
        let samples: Vec<HeartRateSample> = records
            .iter()
            .map(|record| self.normalize_record(record, source, now))
            .collect();

        let fallbacks = samples.iter().filter(|s| s.error).count();
        if fallbacks > 0 {
            warn!(%source, fallbacks, "Substituted normalization time for unparsable timestamps");
        }
        debug!(%source, records = records.len(), "Normalized records");

        samples
    }

    pub fn normalize_record(
        &self,
        record: &RawRecord,
        source: Source,
        now: DateTime<Utc>,
    ) -> HeartRateSample {
        let value = record.reading();

        let (timestamp, resolution, error) = match self.resolve_time(&record.time) {
            Some((ts, resolution)) => (ts, resolution, false),
            None => (now.timestamp(), TimestampResolution::Second, true),
        };

        let labels = self.labels(timestamp);
        let zone = zones::classify(value);

        HeartRateSample {
            timestamp,
            value,
            min: record.min.unwrap_or(value * 0.9),
            max: record.max.unwrap_or(value * 1.1),
            resting_heart_rate: record.resting_heart_rate,
            source,
            date: labels.date,
            time: labels.time,
            formatted_time: labels.formatted_time,
            zone_name: zone.map(|z| z.name.to_string()),
            zone_color: zone.map(|z| z.color.to_string()),
            error,
            resolution,
            min_estimated: record.min.is_none(),
            max_estimated: record.max.is_none(),
        }
    }

    /// Date and clock strings for `timestamp` at this normalizer's offset.
    ///
    /// Normalized samples always carry representable timestamps; anything
    /// outside chrono's range renders as the Unix epoch.
    pub fn labels(&self, timestamp: i64) -> ClockLabels {
        let local = DateTime::from_timestamp(timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&self.offset);

        ClockLabels {
            date: local.format(DATE_FORMAT).to_string(),
            time: local.format("%H:%M:%S").to_string(),
            formatted_time: local.format("%I:%M:%S %p").to_string(),
        }
    }

    fn resolve_time(&self, time: &RecordTime) -> Option<(i64, TimestampResolution)> {
        match time {
            RecordTime::Epoch(ts) => {
                DateTime::from_timestamp(*ts, 0).map(|_| (*ts, TimestampResolution::Second))
            }
            RecordTime::Local { date, time } => {
                let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
                let (clock, resolution) = match time {
                    Some(t) => (parse_clock(t)?, TimestampResolution::Second),
                    None => (NaiveTime::from_hms_opt(0, 0, 0)?, TimestampResolution::Day),
                };
                let local = self
                    .offset
                    .from_local_datetime(&date.and_time(clock))
                    .single()?;
                Some((local.timestamp(), resolution))
            }
            RecordTime::Missing => None,
        }
    }
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
}
