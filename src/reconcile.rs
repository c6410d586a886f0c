//! Source reconciliation
//!
//! Chooses which source's dataset to analyze, or merges every source into a
//! minute-aligned comparison series. Selection is a pure function of the
//! datasets, their quality scores and the caller's policy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::ComputeError;
use crate::normalizer::Normalizer;
use crate::types::{
    CombinedSample, QualityScores, Reconciled, ReconciledData, Source, SourceDatasets,
    SourceReading,
};

/// How the caller wants sources reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcePolicy {
    /// Highest quality non-empty source
    #[default]
    Auto,
    /// Merge every source by minute
    Combined,
    /// Exactly this source, never a substitute
    Source(Source),
}

impl fmt::Display for SourcePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePolicy::Auto => f.write_str("auto"),
            SourcePolicy::Combined => f.write_str("combined"),
            SourcePolicy::Source(source) => write!(f, "{source}"),
        }
    }
}

impl FromStr for SourcePolicy {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SourcePolicy::Auto),
            "combined" => Ok(SourcePolicy::Combined),
            _ => s.parse().map(SourcePolicy::Source),
        }
    }
}

fn has_data(datasets: &SourceDatasets, source: Source) -> bool {
    datasets.get(&source).is_some_and(|d| !d.is_empty())
}

/// Decide which source a policy resolves to.
///
/// `Auto` takes the best-scoring non-empty source; equal scores fall back to
/// the order of `priority` (unlisted sources last). `Combined` resolves to
/// [`Source::Combined`] when any source has data.
pub fn select_source(
    datasets: &SourceDatasets,
    scores: &QualityScores,
    policy: SourcePolicy,
    priority: &[Source],
) -> Result<Source, ComputeError> {
    let mut available = datasets
        .keys()
        .copied()
        .filter(|s| *s != Source::Combined && has_data(datasets, *s));

    match policy {
        SourcePolicy::Auto => {
            let rank = |s: Source| priority.iter().position(|p| *p == s).unwrap_or(priority.len());
            let selected = available
                .max_by(|a, b| {
                    let score_a = scores.get(a).copied().unwrap_or(0);
                    let score_b = scores.get(b).copied().unwrap_or(0);
                    score_a.cmp(&score_b).then(rank(*b).cmp(&rank(*a)))
                })
                .ok_or(ComputeError::NoData)?;
            info!(source = %selected, score = scores.get(&selected).copied().unwrap_or(0), "Selected source");
            Ok(selected)
        }
        SourcePolicy::Combined | SourcePolicy::Source(Source::Combined) => {
            if available.next().is_none() {
                return Err(ComputeError::NoData);
            }
            Ok(Source::Combined)
        }
        SourcePolicy::Source(source) => {
            if has_data(datasets, source) {
                Ok(source)
            } else {
                warn!(%source, "Requested source has no data");
                Err(ComputeError::SourceUnavailable(source))
            }
        }
    }
}

/// Apply a policy, returning the chosen dataset or the merged series
pub fn reconcile(
    datasets: &SourceDatasets,
    scores: &QualityScores,
    policy: SourcePolicy,
    priority: &[Source],
    normalizer: &Normalizer,
) -> Result<Reconciled, ComputeError> {
    let source_used = select_source(datasets, scores, policy, priority)?;

    let data = if source_used == Source::Combined {
        ReconciledData::Combined(combine(datasets, normalizer))
    } else {
        let samples = datasets.get(&source_used).cloned().unwrap_or_default();
        ReconciledData::Single(samples)
    };

    Ok(Reconciled { source_used, data })
}

/// Round to the nearest minute, half up
fn nearest_minute(timestamp: i64) -> i64 {
    timestamp.saturating_add(30).div_euclid(60).saturating_mul(60)
}

/// Merge all sources into one record per minute, ascending.
///
/// Timestamps round to the nearest minute (half up). If a source reports more
/// than once in the same minute its last sample wins. Samples carrying a
/// substituted timestamp are left out.
pub fn combine(datasets: &SourceDatasets, normalizer: &Normalizer) -> Vec<CombinedSample> {
    let mut minutes: BTreeMap<i64, BTreeMap<Source, SourceReading>> = BTreeMap::new();

    for (source, samples) in datasets {
        if *source == Source::Combined {
            continue;
        }
        // fallback timestamps say nothing about when a reading was taken
        for sample in samples.iter().filter(|s| !s.error) {
            let minute = nearest_minute(sample.timestamp);
            minutes.entry(minute).or_default().insert(
                *source,
                SourceReading {
                    avg: sample.value,
                    min: sample.min,
                    max: sample.max,
                },
            );
        }
    }

    minutes
        .into_iter()
        .map(|(timestamp, readings)| {
            let labels = normalizer.labels(timestamp);
            CombinedSample {
                timestamp,
                date: labels.date,
                time: labels.time,
                formatted_time: labels.formatted_time,
                readings,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HeartRateSample, TimestampResolution};
    use pretty_assertions::assert_eq;

    const PRIORITY: [Source; 4] = [
        Source::GoogleFit,
        Source::Fitbit,
        Source::AppleHealth,
        Source::Mock,
    ];

    fn sample(source: Source, timestamp: i64, value: f64) -> HeartRateSample {
        HeartRateSample {
            timestamp,
            value,
            min: value - 5.0,
            max: value + 5.0,
            resting_heart_rate: None,
            source,
            date: String::new(),
            time: String::new(),
            formatted_time: String::new(),
            zone_name: None,
            zone_color: None,
            error: false,
            resolution: TimestampResolution::Second,
            min_estimated: false,
            max_estimated: false,
        }
    }

    fn datasets(entries: &[(Source, usize)]) -> SourceDatasets {
        entries
            .iter()
            .map(|(source, n)| {
                let samples = (0..*n).map(|i| sample(*source, i as i64 * 60, 70.0)).collect();
                (*source, samples)
            })
            .collect()
    }

    fn scores(entries: &[(Source, u32)]) -> QualityScores {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_auto_picks_highest_quality() {
        let data = datasets(&[(Source::GoogleFit, 3), (Source::Fitbit, 3)]);
        let q = scores(&[(Source::GoogleFit, 40), (Source::Fitbit, 85)]);

        assert_eq!(
            select_source(&data, &q, SourcePolicy::Auto, &PRIORITY).unwrap(),
            Source::Fitbit
        );
    }

    #[test]
    fn test_auto_ties_follow_priority() {
        let data = datasets(&[(Source::AppleHealth, 3), (Source::Fitbit, 3)]);
        let q = scores(&[(Source::AppleHealth, 70), (Source::Fitbit, 70)]);

        assert_eq!(
            select_source(&data, &q, SourcePolicy::Auto, &PRIORITY).unwrap(),
            Source::Fitbit
        );

        let reversed = [Source::AppleHealth, Source::Fitbit];
        assert_eq!(
            select_source(&data, &q, SourcePolicy::Auto, &reversed).unwrap(),
            Source::AppleHealth
        );
    }

    #[test]
    fn test_auto_skips_empty_sources() {
        let data = datasets(&[(Source::GoogleFit, 0), (Source::AppleHealth, 2)]);
        let q = scores(&[(Source::GoogleFit, 99), (Source::AppleHealth, 10)]);

        assert_eq!(
            select_source(&data, &q, SourcePolicy::Auto, &PRIORITY).unwrap(),
            Source::AppleHealth
        );
    }

    #[test]
    fn test_auto_with_no_data() {
        let data = datasets(&[(Source::GoogleFit, 0), (Source::Fitbit, 0)]);
        assert!(matches!(
            select_source(&data, &QualityScores::new(), SourcePolicy::Auto, &PRIORITY),
            Err(ComputeError::NoData)
        ));
        assert!(matches!(
            select_source(&data, &QualityScores::new(), SourcePolicy::Combined, &PRIORITY),
            Err(ComputeError::NoData)
        ));
    }

    #[test]
    fn test_explicit_source_never_falls_back() {
        let data = datasets(&[(Source::GoogleFit, 5), (Source::Fitbit, 0)]);
        let q = scores(&[(Source::GoogleFit, 90)]);

        let err = select_source(&data, &q, SourcePolicy::Source(Source::Fitbit), &PRIORITY)
            .unwrap_err();
        assert!(matches!(err, ComputeError::SourceUnavailable(Source::Fitbit)));

        let err = select_source(&data, &q, SourcePolicy::Source(Source::AppleHealth), &PRIORITY)
            .unwrap_err();
        assert!(matches!(err, ComputeError::SourceUnavailable(Source::AppleHealth)));
    }

    #[test]
    fn test_explicit_source_returns_dataset_verbatim() {
        let data = datasets(&[(Source::GoogleFit, 5), (Source::Fitbit, 2)]);
        let result = reconcile(
            &data,
            &QualityScores::new(),
            SourcePolicy::Source(Source::Fitbit),
            &PRIORITY,
            &Normalizer::default(),
        )
        .unwrap();

        assert_eq!(result.source_used, Source::Fitbit);
        assert_eq!(result.data, ReconciledData::Single(data[&Source::Fitbit].clone()));
    }

    #[test]
    fn test_combined_merges_by_minute() {
        let mut data = SourceDatasets::new();
        data.insert(
            Source::Fitbit,
            vec![sample(Source::Fitbit, 600, 70.0), sample(Source::Fitbit, 660, 72.0)],
        );
        data.insert(
            Source::GoogleFit,
            vec![
                sample(Source::GoogleFit, 610, 71.0),
                sample(Source::GoogleFit, 689, 73.0),
                sample(Source::GoogleFit, 760, 75.0),
            ],
        );

        let result = reconcile(
            &data,
            &QualityScores::new(),
            SourcePolicy::Combined,
            &PRIORITY,
            &Normalizer::default(),
        )
        .unwrap();
        assert_eq!(result.source_used, Source::Combined);

        let merged = match result.data {
            ReconciledData::Combined(records) => records,
            other => panic!("expected combined data, got {other:?}"),
        };

        let minutes: Vec<i64> = merged.iter().map(|r| r.timestamp).collect();
        assert_eq!(minutes, vec![600, 660, 780]);

        assert_eq!(merged[0].reading(Source::Fitbit).map(|r| r.avg), Some(70.0));
        assert_eq!(merged[0].reading(Source::GoogleFit).map(|r| r.avg), Some(71.0));
        assert_eq!(merged[1].reading(Source::GoogleFit).map(|r| r.avg), Some(73.0));
        assert_eq!(merged[2].reading(Source::Fitbit), None);
        assert_eq!(merged[0].formatted_time, "12:10:00 AM");

        let json = serde_json::to_value(&merged[0]).unwrap();
        assert_eq!(json["fitbitAvg"], 70.0);
        assert_eq!(json["googleFitAvg"], 71.0);
        assert_eq!(json["googleFitMax"], 76.0);
    }

    #[test]
    fn test_combine_rounds_half_up() {
        let mut data = SourceDatasets::new();
        data.insert(
            Source::Mock,
            vec![sample(Source::Mock, 29, 60.0), sample(Source::Mock, 90, 61.0)],
        );

        let merged = combine(&data, &Normalizer::default());
        let minutes: Vec<i64> = merged.iter().map(|r| r.timestamp).collect();
        assert_eq!(minutes, vec![0, 120]);
    }

    #[test]
    fn test_combine_skips_fallback_timestamps() {
        let mut guessed = sample(Source::Fitbit, 1_705_399_980, 150.0);
        guessed.error = true;

        let mut data = SourceDatasets::new();
        data.insert(
            Source::Fitbit,
            vec![sample(Source::Fitbit, 1_705_309_200, 70.0), guessed],
        );

        let merged = combine(&data, &Normalizer::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].timestamp, 1_705_309_200);
        assert_eq!(merged[0].reading(Source::Fitbit).map(|r| r.avg), Some(70.0));
    }

    #[test]
    fn test_nearest_minute_saturates() {
        assert_eq!(nearest_minute(89), 60);
        assert_eq!(nearest_minute(-31), -60);
        assert_eq!(nearest_minute(i64::MAX), i64::MAX.div_euclid(60) * 60);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("auto".parse::<SourcePolicy>().unwrap(), SourcePolicy::Auto);
        assert_eq!("Combined".parse::<SourcePolicy>().unwrap(), SourcePolicy::Combined);
        assert_eq!(
            "googleFit".parse::<SourcePolicy>().unwrap(),
            SourcePolicy::Source(Source::GoogleFit)
        );
        assert!("strava".parse::<SourcePolicy>().is_err());
        assert_eq!(SourcePolicy::Source(Source::AppleHealth).to_string(), "appleHealth");
    }
}
