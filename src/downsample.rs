//! Display downsampling
//!
//! Bounds a sample series to roughly `target` points while keeping the exact
//! endpoints and the true extremes of every collapsed chunk.

use tracing::debug;

use crate::types::HeartRateSample;

/// Downsample `samples` to about `target` points.
///
/// Series no longer than `target` are returned unchanged. Otherwise the first and
/// last samples are kept verbatim and the interior is split into chunks of
/// `ceil(len / target)`; each chunk becomes a copy of its first sample carrying
/// the chunk's lowest `min` and highest `max`. A `target` below 2 is treated as 2.
pub fn downsample(samples: &[HeartRateSample], target: usize) -> Vec<HeartRateSample> {
    let target = target.max(2);
    let len = samples.len();
    if len <= target {
        return samples.to_vec();
    }

    let factor = len.div_ceil(target);
    let (first, rest) = match samples.split_first() {
        Some(split) => split,
        None => return Vec::new(),
    };
    let (last, interior) = match rest.split_last() {
        Some(split) => split,
        None => return vec![first.clone()],
    };

    let mut output = Vec::with_capacity(2 + interior.len().div_ceil(factor));
    output.push(first.clone());
    output.extend(interior.chunks(factor).filter_map(representative));
    output.push(last.clone());

    debug!(input = len, output = output.len(), factor, "Downsampled series");

    output
}

fn representative(chunk: &[HeartRateSample]) -> Option<HeartRateSample> {
    let mut sample = chunk.first()?.clone();
    for other in &chunk[1..] {
        sample.min = sample.min.min(other.min);
        sample.max = sample.max.max(other.max);
    }
    Some(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Source, TimestampResolution};
    use proptest::prelude::*;

    fn sample(i: usize, value: f64) -> HeartRateSample {
        HeartRateSample {
            timestamp: i as i64 * 60,
            value,
            min: value - 3.0,
            max: value + 3.0,
            resting_heart_rate: None,
            source: Source::Mock,
            date: "1970-01-01".to_string(),
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

    fn series(values: &[f64]) -> Vec<HeartRateSample> {
        values.iter().enumerate().map(|(i, v)| sample(i, *v)).collect()
    }

    #[test]
    fn test_short_series_is_identity() {
        let data = series(&[70.0, 72.0, 74.0]);
        assert_eq!(downsample(&data, 3), data);
        assert_eq!(downsample(&data, 1000), data);
        assert!(downsample(&[], 10).is_empty());
    }

    #[test]
    fn test_chunks_keep_extremes() {
        // 10 samples, target 5 -> factor 2, interior chunks [1,2] [3,4] [5,6] [7,8]
        let data = series(&[60.0, 70.0, 140.0, 65.0, 66.0, 40.0, 80.0, 75.0, 76.0, 62.0]);
        let out = downsample(&data, 5);

        assert_eq!(out.len(), 6);
        assert_eq!(out[0], data[0]);
        assert_eq!(out[5], data[9]);

        assert_eq!(out[1].timestamp, data[1].timestamp);
        assert_eq!(out[1].value, 70.0);
        assert_eq!(out[1].min, 67.0);
        assert_eq!(out[1].max, 143.0);

        assert_eq!(out[3].min, 37.0);
        assert_eq!(out[3].max, 83.0);
    }

    #[test]
    fn test_trailing_partial_chunk() {
        // 9 samples, target 4 -> factor 3, interior chunks [1,2,3] [4,5,6] [7]
        let data = series(&[60.0, 61.0, 62.0, 63.0, 64.0, 65.0, 66.0, 99.0, 67.0]);
        let out = downsample(&data, 4);

        assert_eq!(out.len(), 5);
        assert_eq!(out[3].timestamp, data[7].timestamp);
        assert_eq!(out[3].max, 102.0);
        assert_eq!(out[4], data[8]);
    }

    #[test]
    fn test_tiny_target_is_clamped() {
        let data = series(&[60.0, 61.0, 62.0, 63.0]);
        let out = downsample(&data, 0);

        assert_eq!(out.first(), data.first());
        assert_eq!(out.last(), data.last());
        assert_eq!(out.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_endpoints_and_extremes_survive(
            values in prop::collection::vec(30.0f64..200.0, 0..400),
            target in 2usize..120,
        ) {
            let data = series(&values);
            let out = downsample(&data, target);

            if data.len() <= target {
                prop_assert_eq!(&out, &data);
            } else {
                prop_assert_eq!(out.first(), data.first());
                prop_assert_eq!(out.last(), data.last());

                let factor = data.len().div_ceil(target);
                prop_assert_eq!(out.len(), 2 + (data.len() - 2).div_ceil(factor));

                let lowest = |s: &[HeartRateSample]| s.iter().map(|x| x.min).fold(f64::INFINITY, f64::min);
                let highest = |s: &[HeartRateSample]| s.iter().map(|x| x.max).fold(f64::NEG_INFINITY, f64::max);
                prop_assert_eq!(lowest(&out), lowest(&data));
                prop_assert_eq!(highest(&out), highest(&data));

                prop_assert!(out.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            }
        }
    }
}
