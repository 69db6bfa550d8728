//! Core types for the Danmaku Pulse engine
//!
//! This module defines the values shared by every analysis stage: bucket
//! widths and anchors, sparse time series, and the first-seen ordered counter
//! used for reproducible top-N rankings. It also defines the run identity and
//! the metric report envelope.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::analytics::{
    BurstReport, HighEnergySegments, KeywordReport, MentionNetworkSummary, TypeDistribution,
    UserActivity, UserSegmentation,
};
use crate::error::ComputeError;

/// Sentiment label attached upstream to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

/// Width of a playback-time bucket, in whole seconds (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BucketWidth(u32);

impl BucketWidth {
    pub const TEN_SECONDS: BucketWidth = BucketWidth(10);
    pub const ONE_MINUTE: BucketWidth = BucketWidth(60);

    pub fn new(seconds: u32) -> Result<Self, ComputeError> {
        if seconds == 0 {
            return Err(ComputeError::InvalidBucketWidth(seconds));
        }
        Ok(Self(seconds))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn as_secs(&self) -> i64 {
        i64::from(self.0)
    }
}

impl TryFrom<u32> for BucketWidth {
    type Error = ComputeError;

    fn try_from(seconds: u32) -> Result<Self, Self::Error> {
        Self::new(seconds)
    }
}

impl From<BucketWidth> for u32 {
    fn from(width: BucketWidth) -> Self {
        width.0
    }
}

/// Start of a bucket on the playback axis, as whole seconds from epoch zero.
///
/// Only ordering and differences are meaningful; serializes as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketStart(i64);

impl BucketStart {
    /// Map a playback timestamp to its bucket: `floor(ts / width) * width`
    pub fn of(timestamp_sec: f64, width: BucketWidth) -> Self {
        let w = width.as_secs();
        let index = (timestamp_sec / w as f64).floor() as i64;
        Self(index.saturating_mul(w))
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// The instant one bucket later
    pub fn next(&self, width: BucketWidth) -> Self {
        Self(self.0.saturating_add(width.as_secs()))
    }
}

/// One sample of a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint<V> {
    pub bucket_start: BucketStart,
    pub value: V,
}

/// Ordered, strictly increasing sequence of bucket samples.
///
/// Series are sparse unless stated otherwise: an absent bucket means the
/// producing stage saw no qualifying activity there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series<V> {
    points: Vec<SeriesPoint<V>>,
}

impl<V> Default for Series<V> {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

impl<V> Series<V> {
    pub fn from_map(map: BTreeMap<BucketStart, V>) -> Self {
        Self {
            points: map
                .into_iter()
                .map(|(bucket_start, value)| SeriesPoint {
                    bucket_start,
                    value,
                })
                .collect(),
        }
    }

    /// Build from pairs; pairs must already be strictly increasing by bucket
    pub fn from_sorted(pairs: Vec<(BucketStart, V)>) -> Self {
        debug_assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0));
        Self {
            points: pairs
                .into_iter()
                .map(|(bucket_start, value)| SeriesPoint {
                    bucket_start,
                    value,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SeriesPoint<V>] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesPoint<V>> {
        self.points.iter()
    }

    /// Same buckets, transformed values
    pub fn map<U>(&self, f: impl Fn(&V) -> U) -> Series<U> {
        Series {
            points: self
                .points
                .iter()
                .map(|p| SeriesPoint {
                    bucket_start: p.bucket_start,
                    value: f(&p.value),
                })
                .collect(),
        }
    }
}

impl<V: Copy + Default> Series<V> {
    /// Number of points `densify(width)` would produce.
    ///
    /// `None` when the span does not fit in a `u64` bucket count.
    pub fn dense_len(&self, width: BucketWidth) -> Option<u64> {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(f), Some(l)) => (f.bucket_start.as_secs(), l.bucket_start.as_secs()),
            _ => return Some(0),
        };
        let span = i128::from(last) - i128::from(first);
        u64::try_from(span / i128::from(width.as_secs()) + 1).ok()
    }

    /// Fill every missing bucket between the first and last sample with zero.
    ///
    /// The cost follows the time span, not the sample count; check
    /// `dense_len` first when the span is untrusted.
    pub fn densify(&self, width: BucketWidth) -> Self {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(f), Some(l)) => (f.bucket_start, l.bucket_start),
            _ => return Self::default(),
        };

        let mut points = Vec::new();
        let mut samples = self.points.iter().peekable();
        let mut cursor = first;
        loop {
            let value = match samples.peek() {
                Some(p) if p.bucket_start == cursor => {
                    let v = p.value;
                    samples.next();
                    v
                }
                _ => V::default(),
            };
            points.push(SeriesPoint {
                bucket_start: cursor,
                value,
            });
            if cursor >= last {
                break;
            }
            match cursor.as_secs().checked_add(width.as_secs()) {
                Some(next) => cursor = BucketStart(next),
                None => break,
            }
        }
        Self { points }
    }
}

/// Counter that remembers the order in which keys were first seen.
///
/// Absent keys read as zero. Rankings sort by count descending and keep
/// first-seen order among equal counts, so results never depend on hash order.
#[derive(Debug, Clone)]
pub struct Tally<K> {
    index: HashMap<K, usize>,
    entries: Vec<(K, u64)>,
}

impl<K> Default for Tally<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Tally<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K) {
        self.add_n(key, 1);
    }

    pub fn add_n(&mut self, key: K, n: u64) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += n,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, n));
            }
        }
    }

    pub fn get<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map_or(0, |&i| self.entries[i].1)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.entries.iter().map(|(k, c)| (k, *c))
    }

    /// All entries by count descending, ties in first-seen order
    pub fn ranked(&self) -> Vec<(&K, u64)> {
        let mut ranked: Vec<(&K, u64)> = self.iter().collect();
        // sort_by is stable: equal counts keep insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<(&K, u64)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

/// Identity of one analysis run over one video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub platform: String,
    pub video_id: String,
    pub run_id: u64,
}

impl AnalysisRun {
    pub fn new(platform: impl Into<String>, video_id: impl Into<String>, run_id: u64) -> Self {
        Self {
            platform: platform.into(),
            video_id: video_id.into(),
            run_id,
        }
    }

    /// A run must name a subject and carry a positive id
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.run_id == 0 {
            return Err(ComputeError::InvalidRun("run_id must be positive".to_string()));
        }
        if self.platform.trim().is_empty() {
            return Err(ComputeError::InvalidRun("platform is empty".to_string()));
        }
        if self.video_id.trim().is_empty() {
            return Err(ComputeError::InvalidRun("video_id is empty".to_string()));
        }
        Ok(())
    }
}

/// Bucket-width qualified time series metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesMetric {
    pub metric_name: String,
    pub bucket_sec: BucketWidth,
    pub points: Series<f64>,
}

/// Structured summary metric, tagged by its catalogue name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric_name", content = "value")]
pub enum SummaryMetric {
    #[serde(rename = "high_energy_segments")]
    HighEnergySegments(HighEnergySegments),
    #[serde(rename = "top_keywords")]
    TopKeywords(KeywordReport),
    #[serde(rename = "user_activity")]
    UserActivity(UserActivity),
    #[serde(rename = "danmu_mention_network")]
    MentionNetwork(MentionNetworkSummary),
    #[serde(rename = "danmu_bursty_tokens")]
    BurstyTokens(BurstReport),
    #[serde(rename = "danmu_user_segments")]
    UserSegments(UserSegmentation),
    #[serde(rename = "danmu_type_distribution")]
    TypeDistribution(TypeDistribution),
}

impl SummaryMetric {
    pub fn metric_name(&self) -> &'static str {
        match self {
            SummaryMetric::HighEnergySegments(_) => "high_energy_segments",
            SummaryMetric::TopKeywords(_) => "top_keywords",
            SummaryMetric::UserActivity(_) => "user_activity",
            SummaryMetric::MentionNetwork(_) => "danmu_mention_network",
            SummaryMetric::BurstyTokens(_) => "danmu_bursty_tokens",
            SummaryMetric::UserSegments(_) => "danmu_user_segments",
            SummaryMetric::TypeDistribution(_) => "danmu_type_distribution",
        }
    }

    /// The summary document without its name
    pub fn value_json(&self) -> Result<serde_json::Value, ComputeError> {
        let value = match self {
            SummaryMetric::HighEnergySegments(v) => serde_json::to_value(v)?,
            SummaryMetric::TopKeywords(v) => serde_json::to_value(v)?,
            SummaryMetric::UserActivity(v) => serde_json::to_value(v)?,
            SummaryMetric::MentionNetwork(v) => serde_json::to_value(v)?,
            SummaryMetric::BurstyTokens(v) => serde_json::to_value(v)?,
            SummaryMetric::UserSegments(v) => serde_json::to_value(v)?,
            SummaryMetric::TypeDistribution(v) => serde_json::to_value(v)?,
        };
        Ok(value)
    }
}

/// Every metric computed for one run, before encoding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub time_series: Vec<TimeSeriesMetric>,
    pub summaries: Vec<SummaryMetric>,
}

/// Input accounting for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    /// Events supplied to the run
    pub events_total: usize,
    /// Events belonging to the run's platform/video
    pub events_analyzed: usize,
    /// Analyzed events without a usable playback timestamp
    pub events_without_timestamp: usize,
    /// Analyzed events without tokens
    pub events_without_tokens: usize,
}

/// Report producer metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Complete metric report for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub report_version: String,
    pub producer: ReportProducer,
    /// RFC 3339 timestamp of encoding
    pub generated_at: String,
    pub run: AnalysisRun,
    pub analysis_meta: AnalysisMeta,
    pub time_series: Vec<TimeSeriesMetric>,
    pub summaries: Vec<SummaryMetric>,
}

impl MetricReport {
    /// Look up a time series by name and bucket width
    pub fn series(&self, metric_name: &str, bucket_sec: u32) -> Option<&TimeSeriesMetric> {
        self.time_series
            .iter()
            .find(|m| m.metric_name == metric_name && m.bucket_sec.get() == bucket_sec)
    }

    pub fn summary(&self, metric_name: &str) -> Option<&SummaryMetric> {
        self.summaries.iter().find(|m| m.metric_name() == metric_name)
    }
}
