//! Cognitive load metrics
//!
//! Per active bucket: token throughput, lexical diversity and Shannon entropy
//! of the token distribution. All three series share the same bucket set.

use serde::{Deserialize, Serialize};

use crate::analytics::buckets::TokenAggregate;
use crate::types::Series;

/// Parallel per-bucket cognitive series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveSeries {
    /// Tokens per second of playback
    pub tokens_per_sec: Series<f64>,
    /// Shannon entropy in nats
    pub entropy: Series<f64>,
    /// Distinct tokens / total tokens
    pub unique_ratio: Series<f64>,
}

/// Compute cognitive metrics for every bucket with token activity
pub fn cognitive_metrics(aggregate: &TokenAggregate) -> CognitiveSeries {
    let width = aggregate.width().get() as f64;
    let buckets = aggregate.buckets();

    let mut tokens_per_sec = Vec::with_capacity(buckets.len());
    let mut entropy = Vec::with_capacity(buckets.len());
    let mut unique_ratio = Vec::with_capacity(buckets.len());

    for bucket in buckets {
        let total = aggregate.bucket_total(bucket) as f64;
        let distinct = aggregate.distinct_count(bucket) as f64;

        tokens_per_sec.push((bucket, total / width));
        unique_ratio.push((bucket, if total > 0.0 { distinct / total } else { 0.0 }));
        entropy.push((
            bucket,
            aggregate
                .bucket_tokens(bucket)
                .map_or(0.0, |t| shannon_entropy(t.iter().map(|(_, c)| c))),
        ));
    }

    CognitiveSeries {
        tokens_per_sec: Series::from_sorted(tokens_per_sec),
        entropy: Series::from_sorted(entropy),
        unique_ratio: Series::from_sorted(unique_ratio),
    }
}

/// Shannon entropy (natural log) of a frequency distribution
pub fn shannon_entropy(counts: impl IntoIterator<Item = u64>) -> f64 {
    let counts: Vec<u64> = counts.into_iter().filter(|&c| c > 0).collect();
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum::<f64>()
        .max(0.0)
}
