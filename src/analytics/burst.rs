//! Bursty token detection
//!
//! A token bursts when its peak per-bucket frequency is a statistical outlier
//! against its own series. Statistics are sampled over the active bucket
//! index only: buckets where no token at all was seen are not part of the
//! series, so long silences do not count as zeros.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::buckets::TokenAggregate;
use crate::analytics::stats::{flagged_runs, mean_sample_std, z_score, FlaggedRun};
use crate::types::{BucketStart, BucketWidth};

/// Thresholds and limits for burst detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstParams {
    /// Candidate vocabulary size, by total frequency
    pub token_top_k: usize,
    /// Maximum number of tokens reported
    pub burst_top_k: usize,
    /// Minimum z-score for a bucket to count as an outlier
    pub z_threshold: f64,
    /// Absolute per-bucket count floor
    pub min_count: u64,
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            token_top_k: 200,
            burst_top_k: 30,
            z_threshold: 3.0,
            min_count: 10,
        }
    }
}

/// The strongest contiguous outlier run of a bursty token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstSegment {
    pub start_sec: i64,
    /// One bucket past the last bucket of the run
    pub end_sec: i64,
    pub peak_sec: i64,
    pub peak_count: u64,
}

/// A token whose peak frequency is an outlier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstToken {
    pub token: String,
    pub peak_bucket_start_sec: i64,
    pub peak_count: u64,
    pub z_score: f64,
    pub segment: Option<BurstSegment>,
}

/// Bursty tokens ordered by z-score, strongest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurstReport {
    pub items: Vec<BurstToken>,
}

/// Detector for bursty tokens over a token aggregate
#[derive(Debug, Clone, Default)]
pub struct BurstDetector {
    params: BurstParams,
}

impl BurstDetector {
    pub fn new(params: BurstParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BurstParams {
        &self.params
    }

    /// Detect bursty tokens
    pub fn detect(&self, aggregate: &TokenAggregate) -> BurstReport {
        let buckets = aggregate.buckets();
        let candidates = aggregate.global().top(self.params.token_top_k);
        if buckets.is_empty() || candidates.is_empty() {
            return BurstReport::default();
        }

        debug!(
            buckets = buckets.len(),
            candidates = candidates.len(),
            "scoring burst candidates"
        );

        let mut items: Vec<BurstToken> = candidates
            .into_iter()
            .filter_map(|(token, _)| self.score_token(aggregate, &buckets, token))
            .collect();

        // stable: equal z-scores keep candidate order
        items.sort_by(|a, b| b.z_score.total_cmp(&a.z_score));
        items.truncate(self.params.burst_top_k);

        BurstReport { items }
    }

    fn score_token(
        &self,
        aggregate: &TokenAggregate,
        buckets: &[BucketStart],
        token: &str,
    ) -> Option<BurstToken> {
        let series: Vec<u64> = buckets
            .iter()
            .map(|&b| aggregate.token_count(b, token))
            .collect();
        let values: Vec<f64> = series.iter().map(|&v| v as f64).collect();

        let (mean, std) = mean_sample_std(&values);
        if std <= 0.0 {
            return None;
        }

        let (max_idx, max_val) = first_max(&series)?;
        if max_val < self.params.min_count {
            return None;
        }

        let z = z_score(max_val as f64, mean, std);
        if z < self.params.z_threshold {
            return None;
        }

        let flags: Vec<bool> = series
            .iter()
            .map(|&v| {
                v >= self.params.min_count && z_score(v as f64, mean, std) >= self.params.z_threshold
            })
            .collect();
        let segment = best_run(&series, &flags)
            .map(|run| to_segment(run, buckets, &series, aggregate.width()));

        Some(BurstToken {
            token: token.to_string(),
            peak_bucket_start_sec: buckets[max_idx].as_secs(),
            peak_count: max_val,
            z_score: z,
            segment,
        })
    }
}

/// Index and value of the first maximum
fn first_max(series: &[u64]) -> Option<(usize, u64)> {
    let mut best: Option<(usize, u64)> = None;
    for (i, &v) in series.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Run with the strictly highest peak; ties keep the earliest run
fn best_run(series: &[u64], flags: &[bool]) -> Option<FlaggedRun> {
    let mut best: Option<FlaggedRun> = None;
    for run in flagged_runs(series, flags) {
        match best {
            Some(b) if series[run.peak] <= series[b.peak] => {}
            _ => best = Some(run),
        }
    }
    best
}

fn to_segment(
    run: FlaggedRun,
    buckets: &[BucketStart],
    series: &[u64],
    width: BucketWidth,
) -> BurstSegment {
    BurstSegment {
        start_sec: buckets[run.start].as_secs(),
        end_sec: buckets[run.end].next(width).as_secs(),
        peak_sec: buckets[run.peak].as_secs(),
        peak_count: series[run.peak],
    }
}
