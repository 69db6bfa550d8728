//! Time bucketing and frequency aggregation
//!
//! Two aggregates are built from the event stream:
//!
//! - `MessageAggregate` counts messages (any event with a usable timestamp)
//!   and their sentiment labels per bucket.
//! - `TokenAggregate` counts tokens per bucket and across the whole stream.
//!   Events without a usable timestamp or without tokens are skipped.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::schema::DanmuEvent;
use crate::types::{BucketStart, BucketWidth, SentimentLabel, Series, Tally};

/// Map a playback timestamp to its bucket key
pub fn bucket_start(timestamp_sec: f64, width: BucketWidth) -> BucketStart {
    BucketStart::of(timestamp_sec, width)
}

/// Message counts per bucket, with per-label sentiment matches
#[derive(Debug, Clone)]
pub struct MessageAggregate {
    width: BucketWidth,
    totals: BTreeMap<BucketStart, u64>,
    by_label: HashMap<SentimentLabel, BTreeMap<BucketStart, u64>>,
    skipped: usize,
}

impl MessageAggregate {
    pub fn build<'a>(events: impl IntoIterator<Item = &'a DanmuEvent>, width: BucketWidth) -> Self {
        let mut totals: BTreeMap<BucketStart, u64> = BTreeMap::new();
        let mut by_label: HashMap<SentimentLabel, BTreeMap<BucketStart, u64>> = HashMap::new();
        let mut skipped = 0;

        for event in events {
            let Some(ts) = event.playback_sec() else {
                skipped += 1;
                continue;
            };
            let bucket = bucket_start(ts, width);
            *totals.entry(bucket).or_insert(0) += 1;
            if let Some(label) = event.sentiment {
                *by_label.entry(label).or_default().entry(bucket).or_insert(0) += 1;
            }
        }

        debug!(
            width = width.get(),
            buckets = totals.len(),
            skipped,
            "aggregated message buckets"
        );

        Self {
            width,
            totals,
            by_label,
            skipped,
        }
    }

    pub fn width(&self) -> BucketWidth {
        self.width
    }

    /// Events excluded for lacking a usable timestamp
    pub fn skipped_events(&self) -> usize {
        self.skipped
    }

    /// Messages in `bucket`, zero when the bucket saw none
    pub fn message_count(&self, bucket: BucketStart) -> u64 {
        self.totals.get(&bucket).copied().unwrap_or(0)
    }

    /// Messages in `bucket` labeled `label`, zero when absent
    pub fn label_count(&self, bucket: BucketStart, label: SentimentLabel) -> u64 {
        self.by_label
            .get(&label)
            .and_then(|m| m.get(&bucket))
            .copied()
            .unwrap_or(0)
    }

    /// Sparse message-count series
    pub fn count_series(&self) -> Series<u64> {
        Series::from_map(self.totals.clone())
    }

    /// Fraction of each bucket's messages carrying `label`
    pub fn sentiment_ratio(&self, label: SentimentLabel) -> Series<f64> {
        let ratios = self
            .totals
            .iter()
            .map(|(&bucket, &total)| {
                let matched = self.label_count(bucket, label);
                let ratio = if total > 0 {
                    matched as f64 / total as f64
                } else {
                    0.0
                };
                (bucket, ratio)
            })
            .collect();
        Series::from_map(ratios)
    }
}

/// Messages per bucket
pub fn count_by_bucket<'a>(
    events: impl IntoIterator<Item = &'a DanmuEvent>,
    width: BucketWidth,
) -> Series<u64> {
    MessageAggregate::build(events, width).count_series()
}

/// Fraction of messages per bucket labeled `label`
pub fn sentiment_ratio_by_bucket<'a>(
    events: impl IntoIterator<Item = &'a DanmuEvent>,
    width: BucketWidth,
    label: SentimentLabel,
) -> Series<f64> {
    MessageAggregate::build(events, width).sentiment_ratio(label)
}

/// Token frequencies per bucket and across the stream
#[derive(Debug, Clone)]
pub struct TokenAggregate {
    width: BucketWidth,
    per_bucket: BTreeMap<BucketStart, Tally<String>>,
    totals: BTreeMap<BucketStart, u64>,
    global: Tally<String>,
    skipped: usize,
}

impl TokenAggregate {
    pub fn build<'a>(events: impl IntoIterator<Item = &'a DanmuEvent>, width: BucketWidth) -> Self {
        let mut per_bucket: BTreeMap<BucketStart, Tally<String>> = BTreeMap::new();
        let mut totals: BTreeMap<BucketStart, u64> = BTreeMap::new();
        let mut global = Tally::new();
        let mut skipped = 0;

        for event in events {
            let ts = match event.playback_sec() {
                Some(ts) if !event.tokens.is_empty() => ts,
                _ => {
                    skipped += 1;
                    continue;
                }
            };
            let bucket = bucket_start(ts, width);
            for token in event.tokens.iter().filter(|t| !t.is_empty()) {
                per_bucket.entry(bucket).or_default().add(token.clone());
                *totals.entry(bucket).or_insert(0) += 1;
                global.add(token.clone());
            }
        }

        debug!(
            width = width.get(),
            buckets = per_bucket.len(),
            vocabulary = global.len(),
            skipped,
            "aggregated token buckets"
        );

        Self {
            width,
            per_bucket,
            totals,
            global,
            skipped,
        }
    }

    pub fn width(&self) -> BucketWidth {
        self.width
    }

    /// Events excluded for lacking a usable timestamp or tokens
    pub fn skipped_events(&self) -> usize {
        self.skipped
    }

    /// Buckets that received at least one token, in chronological order
    pub fn buckets(&self) -> Vec<BucketStart> {
        self.per_bucket.keys().copied().collect()
    }

    /// Occurrences of `token` in `bucket`, zero when absent
    pub fn token_count(&self, bucket: BucketStart, token: &str) -> u64 {
        self.per_bucket.get(&bucket).map_or(0, |t| t.get(token))
    }

    /// Total token occurrences in `bucket`
    pub fn bucket_total(&self, bucket: BucketStart) -> u64 {
        self.totals.get(&bucket).copied().unwrap_or(0)
    }

    /// Distinct tokens seen in `bucket`
    pub fn distinct_tokens(&self, bucket: BucketStart) -> impl Iterator<Item = &String> {
        self.per_bucket
            .get(&bucket)
            .into_iter()
            .flat_map(|t| t.iter().map(|(token, _)| token))
    }

    pub fn distinct_count(&self, bucket: BucketStart) -> usize {
        self.per_bucket.get(&bucket).map_or(0, Tally::len)
    }

    /// Token frequency table of one bucket
    pub fn bucket_tokens(&self, bucket: BucketStart) -> Option<&Tally<String>> {
        self.per_bucket.get(&bucket)
    }

    /// Token totals over the whole stream, in first-seen order
    pub fn global(&self) -> &Tally<String> {
        &self.global
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(ts: f64, tokens: &[&str]) -> DanmuEvent {
        DanmuEvent::new("bilibili", "BV1", ts, tokens.join("")).with_tokens(tokens.iter().copied())
    }

    fn pairs<V: Copy>(series: &Series<V>) -> Vec<(i64, V)> {
        series
            .iter()
            .map(|p| (p.bucket_start.as_secs(), p.value))
            .collect()
    }

    #[test]
    fn test_count_by_bucket_end_to_end() {
        let events: Vec<DanmuEvent> = [0.2, 5.1, 10.0, 12.3, 40.0, 41.0, 80.0]
            .iter()
            .map(|&ts| event(ts, &["x"]))
            .collect();

        let series = count_by_bucket(&events, BucketWidth::TEN_SECONDS);
        assert_eq!(pairs(&series), vec![(0, 2), (10, 2), (40, 2), (80, 1)]);

        let minute = count_by_bucket(&events, BucketWidth::ONE_MINUTE);
        assert_eq!(pairs(&minute), vec![(0, 6), (60, 1)]);
    }

    #[test]
    fn test_count_ignores_tokens_but_needs_timestamp() {
        let mut missing = event(1.0, &["a"]);
        missing.video_ts = None;
        let events = vec![event(1.0, &[]), missing];

        let agg = MessageAggregate::build(&events, BucketWidth::TEN_SECONDS);
        assert_eq!(pairs(&agg.count_series()), vec![(0, 1)]);
        assert_eq!(agg.skipped_events(), 1);
    }

    #[test]
    fn test_sentiment_ratio() {
        let events = vec![
            event(1.0, &["a"]).with_sentiment(SentimentLabel::Positive),
            event(2.0, &["b"]).with_sentiment(SentimentLabel::Negative),
            event(3.0, &["c"]),
            event(4.0, &["d"]).with_sentiment(SentimentLabel::Positive),
            event(15.0, &["e"]).with_sentiment(SentimentLabel::Neutral),
        ];

        let positive =
            sentiment_ratio_by_bucket(&events, BucketWidth::TEN_SECONDS, SentimentLabel::Positive);
        assert_eq!(pairs(&positive), vec![(0, 0.5), (10, 0.0)]);

        let negative =
            sentiment_ratio_by_bucket(&events, BucketWidth::TEN_SECONDS, SentimentLabel::Negative);
        assert_eq!(pairs(&negative), vec![(0, 0.25), (10, 0.0)]);
    }

    #[test]
    fn test_token_aggregate_counters() {
        let events = vec![
            event(1.0, &["a", "b", "a"]),
            event(9.0, &["a", ""]),
            event(12.0, &["c"]),
            event(25.0, &[]),
        ];
        let agg = TokenAggregate::build(&events, BucketWidth::TEN_SECONDS);
        let b0 = BucketStart::from_secs(0);
        let b10 = BucketStart::from_secs(10);

        assert_eq!(agg.buckets(), vec![b0, b10]);
        assert_eq!(agg.token_count(b0, "a"), 3);
        assert_eq!(agg.token_count(b0, "c"), 0);
        assert_eq!(agg.bucket_total(b0), 4);
        assert_eq!(agg.distinct_count(b0), 2);
        assert_eq!(agg.distinct_tokens(b10).cloned().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(agg.global().get("a"), 3);
        assert_eq!(agg.skipped_events(), 1);
    }

    #[test]
    fn test_bucket_with_only_empty_tokens_is_inactive() {
        let events = vec![event(1.0, &[""]), event(11.0, &["z"])];
        let agg = TokenAggregate::build(&events, BucketWidth::TEN_SECONDS);
        assert_eq!(agg.buckets(), vec![BucketStart::from_secs(10)]);
    }

    #[test]
    fn test_empty_stream() {
        let events: Vec<DanmuEvent> = Vec::new();
        assert!(count_by_bucket(&events, BucketWidth::TEN_SECONDS).is_empty());
        let agg = TokenAggregate::build(&events, BucketWidth::TEN_SECONDS);
        assert!(agg.buckets().is_empty());
        assert!(agg.global().is_empty());
    }
}
