//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Pulse.
//! It orchestrates the full pipeline from raw vendor JSON to a heart-rate analysis.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::adapters::adapter_for;
use crate::anomaly::AnomalyDetector;
use crate::config::AnalyticsConfig;
use crate::downsample::downsample;
use crate::error::ComputeError;
use crate::metrics::{high_stress_periods, MetricsEngine};
use crate::normalizer::Normalizer;
use crate::quality::QualityScorer;
use crate::reconcile::{combine, reconcile, SourcePolicy};
use crate::types::{
    Anomaly, CombinedSample, HeartRateAnalysis, HeartRateSample, ReconciledData, Source,
    SourceDatasets, TimestampResolution,
};
use crate::zones;

/// Parse and normalize one vendor payload in UTC.
///
/// # Arguments
/// * `source` - Vendor the payload came from
/// * `raw_json` - Raw record array or vendor envelope
///
/// # Example
/// ```ignore
/// let samples = normalize_payload(Source::GoogleFit, r#"[{"timestamp": 1705312800, "value": 72}]"#)?;
/// ```
pub fn normalize_payload(source: Source, raw_json: &str) -> Result<Vec<HeartRateSample>, ComputeError> {
    PulseProcessor::default().normalize_payload(source, raw_json, Utc::now())
}

/// Analyzer holding its configuration. Stateless between calls.
#[derive(Debug, Clone)]
pub struct PulseProcessor {
    config: AnalyticsConfig,
    normalizer: Normalizer,
}

impl Default for PulseProcessor {
    fn default() -> Self {
        let config = AnalyticsConfig::default();
        Self {
            normalizer: Normalizer::new(config.utc_offset_minutes),
            config,
        }
    }
}

impl PulseProcessor {
    /// Create a processor from a validated configuration
    pub fn new(config: AnalyticsConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(config.utc_offset_minutes),
            config,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Parse a vendor payload and normalize it at this processor's offset
    pub fn normalize_payload(
        &self,
        source: Source,
        raw_json: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<HeartRateSample>, ComputeError> {
        let adapter = adapter_for(source)?;
        let records = adapter.parse(raw_json)?;
        Ok(self.normalizer.normalize_at(&records, adapter.source(), now))
    }

    /// Normalize a JSON object mapping source names to their raw payloads
    pub fn load_datasets(&self, input_json: &str, now: DateTime<Utc>) -> Result<SourceDatasets, ComputeError> {
        let input: BTreeMap<String, Value> = serde_json::from_str(input_json)?;

        let mut datasets = SourceDatasets::new();
        for (name, payload) in input {
            let source: Source = name.parse()?;
            let samples = self.normalize_payload(source, &payload.to_string(), now)?;
            datasets.insert(source, samples);
        }

        Ok(datasets)
    }

    /// Run reconciliation and every analytics stage.
    ///
    /// With [`SourcePolicy::Combined`] the analysis runs over one sample per
    /// minute: the mean of the sources reporting in that minute.
    pub fn analyze(
        &self,
        datasets: &SourceDatasets,
        policy: SourcePolicy,
        now: DateTime<Utc>,
    ) -> Result<HeartRateAnalysis, ComputeError> {
        let quality_scores = QualityScorer::score_all(datasets, now);
        let reconciled = reconcile(
            datasets,
            &quality_scores,
            policy,
            &self.config.source_priority,
            &self.normalizer,
        )?;

        let samples = match reconciled.data {
            ReconciledData::Single(samples) => samples,
            ReconciledData::Combined(merged) => merged.iter().map(combined_sample).collect(),
        };

        debug!(source = %reconciled.source_used, samples = samples.len(), "Analyzing samples");

        Ok(HeartRateAnalysis {
            source_used: reconciled.source_used,
            quality_scores,
            display: downsample(&samples, self.config.downsample_target),
            zones: zones::distribution(&samples),
            metrics: MetricsEngine::compute(&samples),
            anomalies: AnomalyDetector::detect(&samples, self.config.anomaly_summary_limit),
            high_stress: high_stress_periods(&samples, self.config.high_stress_limit),
            samples,
        })
    }

    /// Minute-aligned comparison series across every source with data
    pub fn analyze_combined(&self, datasets: &SourceDatasets) -> Result<Vec<CombinedSample>, ComputeError> {
        let merged = combine(datasets, &self.normalizer);
        if merged.is_empty() {
            return Err(ComputeError::NoData);
        }
        Ok(merged)
    }

    /// Anomalies for a detail view, up to the configured detail limit
    pub fn anomaly_details(&self, samples: &[HeartRateSample]) -> Vec<Anomaly> {
        AnomalyDetector::detect(samples, self.config.anomaly_detail_limit)
    }
}

/// Collapse a merged minute into one sample: mean reading, widest band
fn combined_sample(record: &CombinedSample) -> HeartRateSample {
    let readings = record.readings.values();
    let count = record.readings.len().max(1) as f64;
    let value = readings.clone().map(|r| r.avg).sum::<f64>() / count;
    let min = readings.clone().map(|r| r.min).fold(f64::INFINITY, f64::min);
    let max = readings.map(|r| r.max).fold(f64::NEG_INFINITY, f64::max);
    let zone = zones::classify(value);

    HeartRateSample {
        timestamp: record.timestamp,
        value,
        min: if min.is_finite() { min } else { value * 0.9 },
        max: if max.is_finite() { max } else { value * 1.1 },
        resting_heart_rate: None,
        source: Source::Combined,
        date: record.date.clone(),
        time: record.time.clone(),
        formatted_time: record.formatted_time.clone(),
        zone_name: zone.map(|z| z.name.to_string()),
        zone_color: zone.map(|z| z.color.to_string()),
        error: false,
        resolution: TimestampResolution::Second,
        min_estimated: false,
        max_estimated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnomalyKind, HrvStatus};

    const NOW: i64 = 1_705_400_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    /// Google Fit points one minute apart ending at `NOW`
    fn google_fit_json(values: &[f64]) -> String {
        let start = NOW - (values.len() as i64 - 1) * 60;
        let points: Vec<Value> = values
            .iter()
            .enumerate()
            .map(|(i, v)| serde_json::json!({"timestamp": start + i as i64 * 60, "value": v}))
            .collect();
        Value::Array(points).to_string()
    }

    fn fitbit_json() -> &'static str {
        r#"[
            {"date": "2024-01-16", "time": "09:00:00", "avg": 64, "min": 60, "max": 70, "restingHeartRate": 58},
            {"date": "2024-01-16", "time": "09:01:00", "avg": 66, "min": 61, "max": 72, "restingHeartRate": 58},
            {"date": "2024-01-16", "time": "09:02:00", "avg": 65, "min": 60, "max": 71, "restingHeartRate": 58}
        ]"#
    }

    fn scenario() -> Vec<f64> {
        vec![60.0, 62.0, 61.0, 63.0, 95.0, 96.0, 94.0, 97.0, 98.0, 61.0, 60.0]
    }

    #[test]
    fn test_normalize_payload() {
        let samples = normalize_payload(Source::GoogleFit, &google_fit_json(&[70.0, 72.0])).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].source, Source::GoogleFit);
        assert_eq!(samples[1].timestamp, NOW);
    }

    #[test]
    fn test_normalize_payload_rejects_combined() {
        assert!(matches!(
            normalize_payload(Source::Combined, "[]"),
            Err(ComputeError::UnsupportedVendor(_))
        ));
    }

    #[test]
    fn test_load_datasets() {
        let input = format!(
            r#"{{"googleFit": {}, "fitbit": {}}}"#,
            google_fit_json(&scenario()),
            fitbit_json()
        );
        let processor = PulseProcessor::default();
        let datasets = processor.load_datasets(&input, now()).unwrap();

        assert_eq!(datasets[&Source::GoogleFit].len(), 11);
        assert_eq!(datasets[&Source::Fitbit].len(), 3);
        assert_eq!(datasets[&Source::Fitbit][0].resting_heart_rate, Some(58.0));

        let err = processor.load_datasets(r#"{"strava": []}"#, now()).unwrap_err();
        assert!(matches!(err, ComputeError::UnsupportedVendor(_)));
    }

    #[test]
    fn test_demo_input() {
        let processor = PulseProcessor::default();
        // 2024-01-15 09:00 UTC, an hour after the first demo reading
        let now = DateTime::from_timestamp(1_705_309_200, 0).unwrap();
        let datasets = processor
            .load_datasets(include_str!("../demos/sample_input.json"), now)
            .unwrap();

        assert_eq!(datasets[&Source::Fitbit].len(), 6);
        assert_eq!(datasets[&Source::GoogleFit].len(), 4);
        assert_eq!(datasets[&Source::AppleHealth].len(), 2);
        assert!(datasets.values().flatten().all(|s| !s.error));
        assert_eq!(datasets[&Source::Fitbit][3].timestamp, 1_705_305_780);

        // fitbit carries bands and resting HR, the others only readings
        let analysis = processor.analyze(&datasets, SourcePolicy::Auto, now).unwrap();
        assert_eq!(analysis.source_used, Source::Fitbit);

        let merged = processor.analyze_combined(&datasets).unwrap();
        assert_eq!(merged.len(), 6);
        assert_eq!(merged[0].readings.len(), 3);
        assert_eq!(merged[0].reading(Source::AppleHealth).map(|r| r.avg), Some(63.0));
    }

    #[test]
    fn test_out_of_range_epochs_are_flagged() {
        let processor = PulseProcessor::default();
        let datasets = processor
            .load_datasets(
                r#"{"googleFit": [{"timestamp": -1e22, "value": 70}, {"timestamp": 1e22, "value": 72}]}"#,
                now(),
            )
            .unwrap();

        let samples = &datasets[&Source::GoogleFit];
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.error && s.timestamp == NOW));

        let analysis = processor.analyze(&datasets, SourcePolicy::Auto, now()).unwrap();
        assert_eq!(analysis.source_used, Source::GoogleFit);
        assert!(matches!(
            processor.analyze_combined(&datasets),
            Err(ComputeError::NoData)
        ));
    }

    #[test]
    fn test_analyze_auto() {
        let processor = PulseProcessor::default();
        let mut datasets = SourceDatasets::new();
        datasets.insert(
            Source::GoogleFit,
            processor
                .normalize_payload(Source::GoogleFit, &google_fit_json(&scenario()), now())
                .unwrap(),
        );
        datasets.insert(Source::AppleHealth, Vec::new());

        let analysis = processor.analyze(&datasets, SourcePolicy::Auto, now()).unwrap();

        assert_eq!(analysis.source_used, Source::GoogleFit);
        assert_eq!(analysis.samples.len(), 11);
        assert_eq!(analysis.display.len(), 11);
        assert_eq!(analysis.quality_scores[&Source::AppleHealth], 0);
        assert_eq!(analysis.metrics.sample_count, 11);
        assert_ne!(analysis.metrics.hrv_status, HrvStatus::Unknown);
        assert_eq!(analysis.zones.iter().map(|z| z.value).sum::<u32>(), 100);
        assert_eq!(analysis.anomalies.len(), 2);
        assert_eq!(analysis.anomalies[0].kind, AnomalyKind::SuddenChange);
        assert_eq!(analysis.anomalies[0].index, 9);
    }

    #[test]
    fn test_analyze_explicit_unavailable() {
        let processor = PulseProcessor::default();
        let mut datasets = SourceDatasets::new();
        datasets.insert(
            Source::GoogleFit,
            processor
                .normalize_payload(Source::GoogleFit, &google_fit_json(&scenario()), now())
                .unwrap(),
        );

        let err = processor
            .analyze(&datasets, SourcePolicy::Source(Source::Fitbit), now())
            .unwrap_err();
        assert!(matches!(err, ComputeError::SourceUnavailable(Source::Fitbit)));
    }

    #[test]
    fn test_analyze_combined_policy() {
        let processor = PulseProcessor::default();
        let mut datasets = SourceDatasets::new();
        datasets.insert(
            Source::GoogleFit,
            processor
                .normalize_payload(Source::GoogleFit, &google_fit_json(&[70.0, 80.0]), now())
                .unwrap(),
        );
        datasets.insert(
            Source::Mock,
            processor
                .normalize_payload(Source::Mock, &google_fit_json(&[74.0, 90.0]), now())
                .unwrap(),
        );

        let analysis = processor.analyze(&datasets, SourcePolicy::Combined, now()).unwrap();
        assert_eq!(analysis.source_used, Source::Combined);
        assert_eq!(analysis.samples.len(), 2);
        assert_eq!(analysis.samples[0].value, 72.0);
        assert_eq!(analysis.samples[1].value, 85.0);
        assert_eq!(analysis.samples[1].source, Source::Combined);

        let merged = processor.analyze_combined(&datasets).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].reading(Source::Mock).map(|r| r.avg), Some(90.0));
    }

    #[test]
    fn test_analyze_combined_without_data() {
        let processor = PulseProcessor::default();
        assert!(matches!(
            processor.analyze_combined(&SourceDatasets::new()),
            Err(ComputeError::NoData)
        ));
    }

    #[test]
    fn test_display_is_downsampled() {
        let config = AnalyticsConfig {
            downsample_target: 10,
            ..Default::default()
        };
        let processor = PulseProcessor::new(config).unwrap();
        let values: Vec<f64> = (0..100).map(|i| 60.0 + (i % 7) as f64).collect();

        let mut datasets = SourceDatasets::new();
        datasets.insert(
            Source::GoogleFit,
            processor
                .normalize_payload(Source::GoogleFit, &google_fit_json(&values), now())
                .unwrap(),
        );

        let analysis = processor.analyze(&datasets, SourcePolicy::Auto, now()).unwrap();
        assert_eq!(analysis.samples.len(), 100);
        // factor 10: 98 interior samples in 10 chunks plus both endpoints
        assert_eq!(analysis.display.len(), 12);
        assert_eq!(analysis.display.first(), analysis.samples.first());
        assert_eq!(analysis.display.last(), analysis.samples.last());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AnalyticsConfig {
            downsample_target: 0,
            ..Default::default()
        };
        assert!(matches!(
            PulseProcessor::new(config),
            Err(ComputeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let processor = PulseProcessor::default();
        assert!(matches!(
            processor.normalize_payload(Source::Fitbit, "not json", now()),
            Err(ComputeError::JsonError(_))
        ));
    }

    #[test]
    fn test_analysis_serializes() {
        let processor = PulseProcessor::default();
        let mut datasets = SourceDatasets::new();
        datasets.insert(
            Source::GoogleFit,
            processor
                .normalize_payload(Source::GoogleFit, &google_fit_json(&scenario()), now())
                .unwrap(),
        );

        let analysis = processor.analyze(&datasets, SourcePolicy::Auto, now()).unwrap();
        let json = serde_json::to_value(&analysis).unwrap();

        assert_eq!(json["sourceUsed"], "googleFit");
        assert_eq!(json["qualityScores"]["googleFit"], analysis.quality_scores[&Source::GoogleFit]);
        assert_eq!(json["anomalies"][0]["type"], "sudden_change");
        assert_eq!(json["metrics"]["sampleCount"], 11);
    }
}
