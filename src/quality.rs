//! Data quality scoring
//!
//! Scores a dataset 0-100 from three bounded components:
//! - volume: up to 40, one point per ten samples
//! - completeness: up to 30, from populated reading and band fields
//! - recency: up to 30, decaying with the age of the newest sample

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::metrics::round_half_up;
use crate::types::{HeartRateSample, QualityBreakdown, QualityScores, SourceDatasets, TimestampResolution};

const MAX_DATA_POINTS: f64 = 40.0;
const MAX_COMPLETENESS: f64 = 30.0;
const MAX_RECENCY: f64 = 30.0;

/// Completeness points available per sample: reading x2, min, max, resting
const POINTS_PER_SAMPLE: f64 = 5.0;

/// Recency points lost per hour of age for clock-resolution data
const HOURS_PER_POINT: f64 = 8.0;
/// Recency points lost per day of age for date-only data
const POINTS_PER_DAY: f64 = 5.0;

/// Quality scorer for normalized datasets
pub struct QualityScorer;

impl QualityScorer {
    /// Overall score, 0 for an empty dataset
    pub fn score(samples: &[HeartRateSample], now: DateTime<Utc>) -> u32 {
        Self::breakdown(samples, now).total
    }

    /// Per-component scores and their rounded total
    pub fn breakdown(samples: &[HeartRateSample], now: DateTime<Utc>) -> QualityBreakdown {
        if samples.is_empty() {
            return QualityBreakdown::default();
        }

        let data_points = (samples.len() as f64 / 10.0).min(MAX_DATA_POINTS);
        let completeness = completeness(samples);
        let recency = recency(samples, now);
        let total = round_half_up(data_points + completeness + recency).clamp(0.0, 100.0) as u32;

        QualityBreakdown {
            data_points,
            completeness,
            recency,
            total,
        }
    }

    /// Score every dataset in the map
    pub fn score_all(datasets: &SourceDatasets, now: DateTime<Utc>) -> QualityScores {
        let scores: QualityScores = datasets
            .iter()
            .map(|(source, samples)| (*source, Self::score(samples, now)))
            .collect();
        debug!(?scores, "Scored sources");
        scores
    }
}

fn completeness(samples: &[HeartRateSample]) -> f64 {
    let points: f64 = samples
        .iter()
        .map(|s| {
            let mut p = 0.0;
            if s.value > 0.0 {
                p += 2.0;
            }
            if !s.min_estimated && s.min > 0.0 {
                p += 1.0;
            }
            if !s.max_estimated && s.max > 0.0 {
                p += 1.0;
            }
            if s.resting_heart_rate.is_some_and(|r| r > 0.0) {
                p += 1.0;
            }
            p
        })
        .sum();

    let max_possible = samples.len() as f64 * POINTS_PER_SAMPLE;
    (points / max_possible * MAX_COMPLETENESS).min(MAX_COMPLETENESS)
}

/// Clock-resolution samples win; date-only samples are used only when nothing better exists.
fn recency(samples: &[HeartRateSample], now: DateTime<Utc>) -> f64 {
    let latest = |resolution: TimestampResolution| {
        samples
            .iter()
            .filter(|s| !s.error && s.resolution == resolution)
            .map(|s| s.timestamp)
            .max()
    };

    let age_seconds = |ts: i64| now.timestamp().saturating_sub(ts).unsigned_abs() as f64;

    if let Some(ts) = latest(TimestampResolution::Second) {
        let hours = age_seconds(ts) / 3600.0;
        (MAX_RECENCY - hours / HOURS_PER_POINT).max(0.0)
    } else if let Some(ts) = latest(TimestampResolution::Day) {
        let days = age_seconds(ts) / 86_400.0;
        (MAX_RECENCY - days * POINTS_PER_DAY).max(0.0)
    } else {
        0.0
    }
}
