//! High-energy window detection
//!
//! Finds runs of outlier buckets in one dense aggregate series (one value per
//! consecutive bucket, zeros included). Unlike burst detection every
//! qualifying run is returned.

use serde::{Deserialize, Serialize};

use crate::analytics::stats::{flagged_runs, mean_sample_std, z_score};
use crate::types::Series;

/// Fallback bucket width when it cannot be inferred from the series
const DEFAULT_BUCKET_SEC: i64 = 10;

/// Thresholds for peak detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakParams {
    pub z_threshold: f64,
    pub min_count: u64,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            z_threshold: 2.0,
            min_count: 10,
        }
    }
}

/// A contiguous run of outlier buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSegment {
    pub start_sec: i64,
    pub end_sec: i64,
    pub peak_count: u64,
}

/// `high_energy_segments` summary document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighEnergySegments {
    pub segments: Vec<PeakSegment>,
    pub count: usize,
}

impl From<Vec<PeakSegment>> for HighEnergySegments {
    fn from(segments: Vec<PeakSegment>) -> Self {
        Self {
            count: segments.len(),
            segments,
        }
    }
}

/// Peak detector over a dense series
#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    params: PeakParams,
}

impl PeakDetector {
    pub fn new(params: PeakParams) -> Self {
        Self { params }
    }

    /// Detect every outlier run in `series`, in chronological order
    pub fn detect(&self, series: &Series<u64>) -> Vec<PeakSegment> {
        let values: Vec<u64> = series.iter().map(|p| p.value).collect();
        let samples: Vec<f64> = values.iter().map(|&v| v as f64).collect();

        let (mean, std) = mean_sample_std(&samples);
        if std == 0.0 {
            return Vec::new();
        }

        let flags: Vec<bool> = values
            .iter()
            .map(|&v| {
                v >= self.params.min_count && z_score(v as f64, mean, std) >= self.params.z_threshold
            })
            .collect();

        let bucket_sec = infer_bucket_sec(series);
        let points = series.points();

        flagged_runs(&values, &flags)
            .into_iter()
            .map(|run| PeakSegment {
                start_sec: points[run.start].bucket_start.as_secs(),
                end_sec: points[run.end].bucket_start.as_secs().saturating_add(bucket_sec),
                peak_count: values[run.peak],
            })
            .collect()
    }
}

/// Bucket width from the spacing of the first two samples
fn infer_bucket_sec<V>(series: &Series<V>) -> i64 {
    match series.points() {
        [first, second, ..] => {
            let delta = second.bucket_start.as_secs() - first.bucket_start.as_secs();
            if delta > 0 {
                delta
            } else {
                DEFAULT_BUCKET_SEC
            }
        }
        _ => DEFAULT_BUCKET_SEC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BucketStart, BucketWidth};
    use pretty_assertions::assert_eq;

    fn dense(width: i64, values: &[u64]) -> Series<u64> {
        Series::from_sorted(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (BucketStart::from_secs(i as i64 * width), v))
                .collect(),
        )
    }

    #[test]
    fn test_detects_separate_segments() {
        let mut values = vec![2u64; 30];
        values[5] = 40;
        values[6] = 35;
        values[20] = 45;
        let segments = PeakDetector::default().detect(&dense(10, &values));

        assert_eq!(
            segments,
            vec![
                PeakSegment {
                    start_sec: 50,
                    end_sec: 70,
                    peak_count: 40,
                },
                PeakSegment {
                    start_sec: 200,
                    end_sec: 210,
                    peak_count: 45,
                },
            ]
        );
    }

    #[test]
    fn test_constant_series_has_no_segments() {
        let segments = PeakDetector::default().detect(&dense(10, &[20; 12]));
        assert!(segments.is_empty());
    }

    #[test]
    fn test_min_count_floor() {
        let mut values = vec![0u64; 30];
        values[10] = 8;
        let segments = PeakDetector::default().detect(&dense(10, &values));
        assert!(segments.is_empty());
    }

    #[test]
    fn test_width_inferred_from_spacing() {
        let mut values = vec![1u64; 20];
        values[19] = 50;
        let segments = PeakDetector::default().detect(&dense(60, &values));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_sec, 19 * 60);
        assert_eq!(segments[0].end_sec, 20 * 60);
    }

    #[test]
    fn test_segment_end_saturates_at_timeline_end() {
        let mut values = vec![2u64; 30];
        values[29] = 40;
        let series = Series::from_sorted(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (BucketStart::from_secs(i64::MAX - (29 - i as i64) * 10), v))
                .collect(),
        );
        let segments = PeakDetector::default().detect(&series);

        assert_eq!(
            segments,
            vec![PeakSegment {
                start_sec: i64::MAX,
                end_sec: i64::MAX,
                peak_count: 40,
            }]
        );
    }

    #[test]
    fn test_infer_bucket_sec_fallback() {
        assert_eq!(infer_bucket_sec(&dense(10, &[5])), DEFAULT_BUCKET_SEC);
        assert_eq!(infer_bucket_sec(&Series::<u64>::default()), DEFAULT_BUCKET_SEC);
        assert_eq!(infer_bucket_sec(&dense(30, &[1, 2])), 30);
    }

    #[test]
    fn test_densified_gaps_count_as_zeros() {
        let sparse = Series::from_sorted(vec![
            (BucketStart::from_secs(0), 3u64),
            (BucketStart::from_secs(10), 2),
            (BucketStart::from_secs(150), 30),
            (BucketStart::from_secs(200), 2),
        ]);
        let series = sparse.densify(BucketWidth::TEN_SECONDS);
        assert_eq!(series.len(), 21);

        let segments = PeakDetector::default().detect(&series);
        assert_eq!(
            segments,
            vec![PeakSegment {
                start_sec: 150,
                end_sec: 160,
                peak_count: 30,
            }]
        );
    }

    #[test]
    fn test_high_energy_summary_counts_segments() {
        let summary = HighEnergySegments::from(vec![PeakSegment {
            start_sec: 0,
            end_sec: 10,
            peak_count: 12,
        }]);
        assert_eq!(summary.count, 1);
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            serde_json::json!({
                "segments": [{"start_sec": 0, "end_sec": 10, "peak_count": 12}],
                "count": 1
            })
        );
    }
}
