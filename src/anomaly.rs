//! Anomaly detection
//!
//! Statistical thresholds (mean ± 2σ) combined with fixed rules for sudden
//! changes, sustained high rates and alternating rhythms.

use tracing::debug;

use crate::metrics::{round_half_up, MIN_VALID_BPM};
use crate::types::{Anomaly, AnomalyKind, HeartRateSample, Severity};

/// Minimum valid samples before anything is flagged
pub const MIN_SAMPLES: usize = 10;

const SUDDEN_CHANGE_BPM: f64 = 20.0;
const SUDDEN_CHANGE_HIGH_BPM: f64 = 35.0;
const SUSTAINED_HIGH_BPM: f64 = 100.0;
const SUSTAINED_HIGH_SEVERE_BPM: f64 = 120.0;
const SUSTAINED_RUN: usize = 5;
const LOW_FLOOR_BPM: f64 = 40.0;
const LOW_IGNORE_BPM: f64 = 35.0;
const ALTERNATION_RUN: usize = 5;
/// Samples skipped after a threshold alert so one episode is reported once
const ALERT_SKIP: usize = 5;

/// A valid reading and its position in the caller's slice
struct Point<'a> {
    index: usize,
    sample: &'a HeartRateSample,
}

impl Point<'_> {
    fn value(&self) -> f64 {
        self.sample.value
    }

    fn anomaly(&self, kind: AnomalyKind, value: f64, severity: Severity, detail: String) -> Anomaly {
        Anomaly {
            kind,
            value,
            index: self.index,
            severity,
            time: self.sample.formatted_time.clone(),
            timestamp: self.sample.timestamp,
            detail,
        }
    }
}

/// Anomaly detector over normalized samples
pub struct AnomalyDetector;

impl AnomalyDetector {
    /// Flag anomalies, most severe first, keeping at most `limit`.
    ///
    /// Readings at or below 30 BPM are ignored. Fewer than [`MIN_SAMPLES`] valid
    /// readings yields no anomalies.
    pub fn detect(samples: &[HeartRateSample], limit: usize) -> Vec<Anomaly> {
        let points: Vec<Point> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.value > MIN_VALID_BPM)
            .map(|(index, sample)| Point { index, sample })
            .collect();

        if points.len() < MIN_SAMPLES {
            return Vec::new();
        }

        let n = points.len() as f64;
        let mean = points.iter().map(Point::value).sum::<f64>() / n;
        let variance = points
            .iter()
            .map(|p| (p.value() - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();
        let high_threshold = mean + 2.0 * std_dev;
        let low_threshold = (mean - 2.0 * std_dev).max(LOW_FLOOR_BPM);

        let mut anomalies = Vec::new();
        sudden_changes(&points, &mut anomalies);
        sustained_high(&points, &mut anomalies);
        unusually_low(&points, low_threshold, &mut anomalies);
        unusually_high(&points, high_threshold, &mut anomalies);
        alternating(&points, &mut anomalies);

        debug!(
            found = anomalies.len(),
            mean,
            std_dev,
            "Anomaly scan complete"
        );

        // stable: equal severities keep rule order
        anomalies.sort_by(|a, b| b.severity.cmp(&a.severity));
        anomalies.truncate(limit);
        anomalies
    }
}

fn sudden_changes(points: &[Point], out: &mut Vec<Anomaly>) {
    for pair in points.windows(2) {
        let change = (pair[1].value() - pair[0].value()).abs();
        if change > SUDDEN_CHANGE_BPM {
            let severity = if change > SUDDEN_CHANGE_HIGH_BPM {
                Severity::High
            } else {
                Severity::Medium
            };
            out.push(pair[1].anomaly(
                AnomalyKind::SuddenChange,
                change,
                severity,
                format!("Change of {} BPM", round_half_up(change)),
            ));
        }
    }
}

fn sustained_high(points: &[Point], out: &mut Vec<Anomaly>) {
    let mut run = 0;
    for point in points {
        if point.value() <= SUSTAINED_HIGH_BPM {
            run = 0;
            continue;
        }
        run += 1;
        if run == SUSTAINED_RUN {
            let severity = if point.value() > SUSTAINED_HIGH_SEVERE_BPM {
                Severity::High
            } else {
                Severity::Medium
            };
            out.push(point.anomaly(
                AnomalyKind::SustainedHigh,
                point.value(),
                severity,
                format!("{} BPM sustained", round_half_up(point.value())),
            ));
            run = 0;
        }
    }
}

fn unusually_low(points: &[Point], threshold: f64, out: &mut Vec<Anomaly>) {
    let mut i = 0;
    while i < points.len() {
        let point = &points[i];
        let v = point.value();
        if v < threshold && v > LOW_IGNORE_BPM {
            let severity = if v < LOW_FLOOR_BPM {
                Severity::High
            } else {
                Severity::Medium
            };
            out.push(point.anomaly(
                AnomalyKind::UnusuallyLow,
                v,
                severity,
                format!("{} BPM detected", round_half_up(v)),
            ));
            i += ALERT_SKIP;
        }
        i += 1;
    }
}

fn unusually_high(points: &[Point], threshold: f64, out: &mut Vec<Anomaly>) {
    let mut i = 0;
    while i < points.len() {
        let point = &points[i];
        let v = point.value();
        if v > threshold {
            out.push(point.anomaly(
                AnomalyKind::UnusuallyHigh,
                v,
                Severity::Medium,
                format!("{} BPM (>{})", round_half_up(v), round_half_up(threshold)),
            ));
            i += ALERT_SKIP;
        }
        i += 1;
    }
}

/// Successive differences flipping sign [`ALTERNATION_RUN`] times in a row
fn alternating(points: &[Point], out: &mut Vec<Anomaly>) {
    let mut run = 0;
    let mut previous = 0.0;
    for (i, pair) in points.windows(2).enumerate() {
        let diff = pair[1].value() - pair[0].value();
        if i > 0 && diff * previous < 0.0 {
            run += 1;
            if run == ALTERNATION_RUN {
                out.push(pair[1].anomaly(
                    AnomalyKind::AlternatingPattern,
                    pair[1].value(),
                    Severity::Medium,
                    format!("Direction changed {ALTERNATION_RUN} times in a row"),
                ));
                run = 0;
            }
        } else {
            run = 0;
        }
        previous = diff;
    }
}
