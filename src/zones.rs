//! Heart-rate zones
//!
//! A fixed five-zone table over BPM and the distribution of samples across it.

use serde::Serialize;

use crate::types::{HeartRateSample, ZoneShare};

/// One heart-rate intensity zone, covering `[min, max)` BPM
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Zone {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub color: &'static str,
    pub gradient: &'static str,
    pub intensity: &'static str,
    pub description: &'static str,
    pub benefits: &'static str,
    pub recommendation: &'static str,
}

impl Zone {
    pub fn contains(&self, bpm: f64) -> bool {
        bpm >= self.min && bpm < self.max
    }
}

pub const ZONES: [Zone; 5] = [
    Zone {
        name: "Rest",
        min: 0.0,
        max: 60.0,
        color: "#3f51b5",
        gradient: "linear-gradient(135deg, #3f51b5 0%, #5c6bc0 100%)",
        intensity: "Very Light",
        description: "Resting heart rate, typically during sleep or complete relaxation",
        benefits: "Recovery, restoration, and stress reduction",
        recommendation: "Important for recovery days and overall heart health",
    },
    Zone {
        name: "Fat Burn",
        min: 60.0,
        max: 70.0,
        color: "#2196f3",
        gradient: "linear-gradient(135deg, #2196f3 0%, #42a5f5 100%)",
        intensity: "Light",
        description: "Light activity like walking or gentle movement",
        benefits: "Improves basic endurance and fat metabolism",
        recommendation: "Aim for 30-60 minutes of this zone most days",
    },
    Zone {
        name: "Cardio",
        min: 70.0,
        max: 85.0,
        color: "#009688",
        gradient: "linear-gradient(135deg, #009688 0%, #26a69a 100%)",
        intensity: "Moderate",
        description: "Moderate activity that raises breathing and heart rate",
        benefits: "Improves aerobic capacity and cardiovascular efficiency",
        recommendation: "Target 20-40 minutes, 3-5 times per week",
    },
    Zone {
        name: "Peak",
        min: 85.0,
        max: 100.0,
        color: "#ff9800",
        gradient: "linear-gradient(135deg, #ff9800 0%, #ffa726 100%)",
        intensity: "Hard",
        description: "Vigorous exercise that is difficult to sustain",
        benefits: "Increases performance capacity and lactate threshold",
        recommendation: "Limit to 10-20 minutes within structured workouts",
    },
    Zone {
        name: "Extreme",
        min: 100.0,
        max: 220.0,
        color: "#f44336",
        gradient: "linear-gradient(135deg, #f44336 0%, #ef5350 100%)",
        intensity: "Maximum",
        description: "Maximum effort, only sustainable for short periods",
        benefits: "Develops speed and power, improves maximum performance",
        recommendation: "Short intervals only, with full recovery between efforts",
    },
];

/// Zone containing `bpm`, or `None` for non-readings and out-of-range values.
///
/// `0` means "no reading" and is distinct from Rest.
pub fn classify(bpm: f64) -> Option<&'static Zone> {
    zone_index(bpm).map(|i| &ZONES[i])
}

fn zone_index(bpm: f64) -> Option<usize> {
    if bpm.is_nan() || bpm <= 0.0 {
        return None;
    }
    ZONES.iter().position(|zone| zone.contains(bpm))
}

/// Percentage of samples in each zone, in table order.
///
/// Samples that don't classify are ignored; if none classify every zone is 0.
/// Otherwise the percentages sum to exactly 100.
pub fn distribution(samples: &[HeartRateSample]) -> Vec<ZoneShare> {
    let mut counts = [0usize; ZONES.len()];
    for sample in samples {
        if let Some(index) = zone_index(sample.value) {
            counts[index] += 1;
        }
    }

    let percents = apportion(&counts);

    ZONES
        .iter()
        .zip(counts.into_iter().zip(percents))
        .map(|(zone, (count, value))| ZoneShare {
            name: zone.name,
            value,
            count,
            color: zone.color,
            gradient: zone.gradient,
            intensity: zone.intensity,
            description: zone.description,
            benefits: zone.benefits,
            recommendation: zone.recommendation,
        })
        .collect()
}

/// Largest-remainder rounding of counts to whole percentages
fn apportion(counts: &[usize; ZONES.len()]) -> [u32; ZONES.len()] {
    let mut percents = [0u32; ZONES.len()];
    let total: usize = counts.iter().sum();
    if total == 0 {
        return percents;
    }

    let mut remainders = [(0usize, 0usize); ZONES.len()];
    for (i, count) in counts.iter().enumerate() {
        percents[i] = (count * 100 / total) as u32;
        remainders[i] = (count * 100 % total, i);
    }

    let assigned: u32 = percents.iter().sum();
    // stable: equal remainders favour the earlier zone
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, i) in remainders.iter().take(100 - assigned as usize) {
        percents[i] += 1;
    }

    percents
}
