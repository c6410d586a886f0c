//! Cardiovascular metrics
//!
//! Aggregate heart-rate statistics plus the heuristic HRV, recovery, stress,
//! fitness and heart-age scores. These are non-clinical approximations; the
//! constants are fixed and must not drift.

use tracing::debug;

use crate::types::{HeartMetrics, HeartRateSample, HrvStatus};

/// Readings at or below this are sensor noise, not heart rate
pub const MIN_VALID_BPM: f64 = 30.0;

/// Minimum valid samples before any metric is computed
pub const MIN_SAMPLES: usize = 5;

/// Samples that must follow the peak for a recovery reading
const RECOVERY_WINDOW: usize = 5;

/// Readings at or below this are ignored when finding the stress baseline
const STRESS_BASELINE_FLOOR: f64 = 40.0;

const STRESS_MIN_SAMPLES: usize = 10;

/// Metrics engine over normalized samples
pub struct MetricsEngine;

impl MetricsEngine {
    /// Compute metrics from samples in temporal order.
    ///
    /// Fewer than [`MIN_SAMPLES`] valid readings yields the neutral default.
    pub fn compute(samples: &[HeartRateSample]) -> HeartMetrics {
        let values = valid_values(samples);
        let n = values.len();
        if n < MIN_SAMPLES {
            debug!(valid = n, "Too few valid samples for metrics");
            return HeartMetrics::default();
        }

        let mut sorted = values.clone();
        sorted.sort_by(f64::total_cmp);

        let avg_hr = values.iter().sum::<f64>() / n as f64;
        let max_hr = sorted[n - 1];
        let min_hr = sorted[0];
        let median_hr = sorted[n / 2];

        let resting_hr = resting_heart_rate(samples, &sorted);
        let rmssd = rmssd(&values);
        let hrv_score = hrv_score(rmssd);

        let vo2_max = if resting_hr > 0.0 {
            15.3 * (max_hr / resting_hr)
        } else {
            0.0
        };
        let cardiac_efficiency = if resting_hr > 0.0 {
            (1.0 - resting_hr / max_hr) * 100.0
        } else {
            0.0
        };

        HeartMetrics {
            sample_count: n,
            avg_hr,
            max_hr,
            min_hr,
            median_hr,
            resting_hr,
            rmssd,
            hrv_score,
            hrv_status: hrv_status(hrv_score),
            recovery_rate: recovery_rate(&values),
            vo2_max,
            cardiac_efficiency,
            recovery_score: recovery_score(resting_hr, hrv_score),
            stress_level: stress_level(resting_hr, hrv_score),
            heart_age_estimate: heart_age(resting_hr, hrv_score),
            cardio_fitness_score: cardio_fitness(vo2_max, resting_hr, hrv_score),
        }
    }
}

/// Values above [`MIN_VALID_BPM`], in input order
pub(crate) fn valid_values(samples: &[HeartRateSample]) -> Vec<f64> {
    samples
        .iter()
        .map(|s| s.value)
        .filter(|v| *v > MIN_VALID_BPM)
        .collect()
}

/// Half-up rounding, matching the dashboard's scores
pub(crate) fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Mean of vendor-reported resting rates, else of the lowest tenth of readings
fn resting_heart_rate(samples: &[HeartRateSample], sorted: &[f64]) -> f64 {
    let explicit: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.resting_heart_rate)
        .filter(|r| *r > 0.0)
        .collect();

    let pool = if explicit.is_empty() {
        let count = (sorted.len() / 10).max(1);
        &sorted[..count]
    } else {
        &explicit[..]
    };

    round_half_up(pool.iter().sum::<f64>() / pool.len() as f64)
}

/// Root mean square of successive differences over values in temporal order.
///
/// Returns 0 for fewer than two values.
pub fn rmssd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

pub fn hrv_score(rmssd: f64) -> u32 {
    round_half_up(rmssd * 1.5).clamp(0.0, 100.0) as u32
}

pub fn hrv_status(score: u32) -> HrvStatus {
    if score >= 70 {
        HrvStatus::Excellent
    } else if score >= 50 {
        HrvStatus::Good
    } else if score >= 30 {
        HrvStatus::Moderate
    } else if score >= 15 {
        HrvStatus::Fair
    } else {
        HrvStatus::Poor
    }
}

/// Drop from the peak to the reading five samples later; 0 without that trailing data
pub fn recovery_rate(values: &[f64]) -> f64 {
    let peak_index = match values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if *v <= b => best,
            _ => Some((i, *v)),
        }) {
        Some((i, _)) => i,
        None => return 0.0,
    };

    match values.get(peak_index + RECOVERY_WINDOW) {
        Some(later) => (values[peak_index] - later).max(0.0),
        None => 0.0,
    }
}

fn recovery_score(resting: f64, hrv: u32) -> u32 {
    let resting_tier = if resting < 50.0 {
        15
    } else if resting < 60.0 {
        10
    } else if resting < 70.0 {
        5
    } else if resting > 80.0 {
        -5
    } else {
        0
    };

    let hrv_tier = if hrv > 70 {
        15
    } else if hrv > 50 {
        10
    } else if hrv > 30 {
        5
    } else if hrv < 15 {
        -5
    } else {
        0
    };

    (70 + resting_tier + hrv_tier).clamp(0, 100) as u32
}

fn stress_level(resting: f64, hrv: u32) -> u32 {
    let penalty = if resting > 85.0 {
        15
    } else if resting > 75.0 {
        10
    } else if resting > 65.0 {
        5
    } else {
        0
    };

    (100 - hrv as i64 + penalty).clamp(0, 100) as u32
}

fn heart_age(resting: f64, hrv: u32) -> u32 {
    let hrv_term = 30.0 - (hrv as f64 / 2.0).min(30.0);
    let age = round_half_up(40.0 + (resting - 60.0) * 0.7 + hrv_term * 0.5);
    age.max(20.0) as u32
}

fn cardio_fitness(vo2_max: f64, resting: f64, hrv: u32) -> u32 {
    let vo2_bonus = if vo2_max > 35.0 {
        (vo2_max - 35.0) * 1.2
    } else {
        0.0
    };
    let rest_bonus = (60.0 - resting.min(60.0)) * 0.5;
    let hrv_bonus = (hrv as f64 - 20.0) * 0.3;

    round_half_up(50.0 + vo2_bonus + rest_bonus + hrv_bonus).clamp(0.0, 100.0) as u32
}

/// Samples whose value exceeds 1.5x the lowest reading above 40 BPM, first `limit`.
///
/// Needs at least ten samples.
pub fn high_stress_periods(samples: &[HeartRateSample], limit: usize) -> Vec<HeartRateSample> {
    if samples.len() < STRESS_MIN_SAMPLES {
        return Vec::new();
    }

    let baseline = samples
        .iter()
        .map(|s| s.value)
        .filter(|v| *v > STRESS_BASELINE_FLOOR)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));

    let threshold = match baseline {
        Some(b) => b * 1.5,
        None => return Vec::new(),
    };

    samples
        .iter()
        .filter(|s| s.value > threshold)
        .take(limit)
        .cloned()
        .collect()
}
