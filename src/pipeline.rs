//! Pipeline orchestration
//!
//! This module provides the public API for Danmaku Pulse.
//! It runs every analysis stage over one subject's events and assembles the
//! metric report.

use tracing::{debug, info};

use crate::analytics::{
    cognitive_metrics, top_keywords, type_distribution, user_activity_summary,
    user_segmentation_summary, BurstDetector, HighEnergySegments, MentionGraph, MessageAggregate,
    PeakDetector, TokenAggregate,
};
use crate::config::EngineConfig;
use crate::encoder::ReportEncoder;
use crate::error::ComputeError;
use crate::schema::{DanmuEvent, EventReader};
use crate::types::{
    AnalysisMeta, AnalysisRun, BucketWidth, MetricReport, MetricSet, SentimentLabel, Series,
    SummaryMetric, TimeSeriesMetric,
};

/// Dense peak input may hold at most this many buckets per active bucket
const DENSE_BUCKETS_PER_SAMPLE: u64 = 64;

/// Spans up to this many buckets are always densified (one day of 10 s buckets)
const DENSE_BUCKETS_FLOOR: u64 = 8_640;

/// Analyze an NDJSON event stream with default settings.
///
/// # Returns
/// The pretty-printed JSON metric report
///
/// # Example
/// ```ignore
/// let report_json = analyze_ndjson(ndjson, &AnalysisRun::new("bilibili", "BV1xx", 1))?;
/// ```
pub fn analyze_ndjson(ndjson: &str, run: &AnalysisRun) -> Result<String, ComputeError> {
    let events = EventReader::parse_ndjson(ndjson)?;
    let report = PulseProcessor::new().analyze(run, &events)?;
    ReportEncoder::to_json(&report, true)
}

/// Processor running the full metric catalogue for analysis runs.
///
/// Holds no state between runs: every report is built from scratch, so a
/// rerun replaces earlier output rather than merging with it.
pub struct PulseProcessor {
    config: EngineConfig,
    encoder: ReportEncoder,
}

impl Default for PulseProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            encoder: ReportEncoder::new(),
        }
    }

    /// Create a processor with validated settings
    pub fn with_config(config: EngineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every stage for `run` over the events of its subject.
    ///
    /// Events of other platforms or videos are ignored. Fails only when the
    /// run identity itself is invalid.
    pub fn analyze(
        &self,
        run: &AnalysisRun,
        events: &[DanmuEvent],
    ) -> Result<MetricReport, ComputeError> {
        run.validate()?;

        let subject: Vec<&DanmuEvent> = events
            .iter()
            .filter(|e| e.is_subject(&run.platform, &run.video_id))
            .collect();

        let meta = AnalysisMeta {
            events_total: events.len(),
            events_analyzed: subject.len(),
            events_without_timestamp: subject.iter().filter(|e| e.playback_sec().is_none()).count(),
            events_without_tokens: subject.iter().filter(|e| e.tokens.is_empty()).count(),
        };
        debug!(
            total = meta.events_total,
            analyzed = meta.events_analyzed,
            without_timestamp = meta.events_without_timestamp,
            "selected subject events"
        );

        let metrics = self.compute(&subject);

        info!(
            platform = %run.platform,
            video_id = %run.video_id,
            run_id = run.run_id,
            time_series = metrics.time_series.len(),
            summaries = metrics.summaries.len(),
            "analysis done"
        );

        Ok(self.encoder.encode(run, meta, metrics))
    }

    /// Compute the metric catalogue over an already selected event snapshot
    pub fn compute(&self, events: &[&DanmuEvent]) -> MetricSet {
        let series_config = &self.config.series;
        let ranking = &self.config.ranking;
        let mut metrics = MetricSet::default();

        // Stage 1: Message count and sentiment ratio series per width
        for &width in &series_config.count_widths {
            let aggregate = MessageAggregate::build(events.iter().copied(), width);
            metrics.time_series.push(series_metric(
                "danmu_count",
                width,
                aggregate.count_series().map(|&c| c as f64),
            ));
            for label in [SentimentLabel::Positive, SentimentLabel::Negative] {
                let name = format!("sentiment_{}_ratio", label.as_str());
                metrics
                    .time_series
                    .push(series_metric(&name, width, aggregate.sentiment_ratio(label)));
            }
        }

        // Stage 2: High-energy windows over the count series
        let peak_counts = peak_input(
            MessageAggregate::build(events.iter().copied(), series_config.peak_width).count_series(),
            series_config.peak_width,
        );
        let peaks = PeakDetector::new(self.config.peak).detect(&peak_counts);
        debug!(
            buckets = peak_counts.len(),
            segments = peaks.len(),
            "peak detection done"
        );
        metrics
            .summaries
            .push(SummaryMetric::HighEnergySegments(HighEnergySegments::from(peaks)));

        // Stage 3: Keyword ranking
        metrics.summaries.push(SummaryMetric::TopKeywords(top_keywords(
            events.iter().copied(),
            ranking.keyword_top_k,
        )));

        // Stage 4: User activity concentration
        metrics.summaries.push(SummaryMetric::UserActivity(user_activity_summary(
            events.iter().copied(),
            ranking.activity_top_n,
            ranking.activity_share_top,
        )));

        // Stage 5: Cognitive load series
        let tokens = TokenAggregate::build(events.iter().copied(), series_config.cognitive_width);
        let cognitive = cognitive_metrics(&tokens);
        let cognitive_width = series_config.cognitive_width;
        metrics.time_series.extend([
            series_metric("cognitive_tokens_per_sec", cognitive_width, cognitive.tokens_per_sec),
            series_metric("cognitive_entropy", cognitive_width, cognitive.entropy),
            series_metric("cognitive_unique_ratio", cognitive_width, cognitive.unique_ratio),
        ]);

        // Stage 6: Mention network
        let mentions = MentionGraph::build(events.iter().copied());
        metrics
            .summaries
            .push(SummaryMetric::MentionNetwork(mentions.summary(ranking.mention_top_n)));

        // Stage 7: Bursty tokens
        let burst_tokens;
        let burst_source = if series_config.burst_width == cognitive_width {
            &tokens
        } else {
            burst_tokens = TokenAggregate::build(events.iter().copied(), series_config.burst_width);
            &burst_tokens
        };
        let bursts = BurstDetector::new(self.config.burst).detect(burst_source);
        debug!(bursty_tokens = bursts.items.len(), "burst detection done");
        metrics.summaries.push(SummaryMetric::BurstyTokens(bursts));

        // Stage 8: User segmentation
        metrics.summaries.push(SummaryMetric::UserSegments(user_segmentation_summary(
            events.iter().copied(),
            ranking.segment_top_n,
        )));

        // Stage 9: Display type distribution
        metrics
            .summaries
            .push(SummaryMetric::TypeDistribution(type_distribution(events.iter().copied())));

        metrics
    }
}

/// Densify the peak input unless the timeline is far sparser than its span.
///
/// A sparse series keeps memory proportional to the number of active buckets;
/// the peak detector then samples active buckets only.
fn peak_input(counts: Series<u64>, width: BucketWidth) -> Series<u64> {
    let limit = (counts.len() as u64)
        .saturating_mul(DENSE_BUCKETS_PER_SAMPLE)
        .max(DENSE_BUCKETS_FLOOR);
    match counts.dense_len(width) {
        Some(len) if len <= limit => counts.densify(width),
        span => {
            debug!(
                active_buckets = counts.len(),
                span = ?span,
                "count timeline too sparse to densify"
            );
            counts
        }
    }
}

fn series_metric(name: &str, width: BucketWidth, points: Series<f64>) -> TimeSeriesMetric {
    TimeSeriesMetric {
        metric_name: name.to_string(),
        bucket_sec: width,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BucketStart;
    use pretty_assertions::assert_eq;

    const PLATFORM: &str = "bilibili";
    const VIDEO: &str = "BV1demo";

    fn run() -> AnalysisRun {
        AnalysisRun::new(PLATFORM, VIDEO, 42)
    }

    fn event(ts: f64, token: &str) -> DanmuEvent {
        DanmuEvent::new(PLATFORM, VIDEO, ts, token).with_tokens([token])
    }

    fn values(report: &MetricReport, name: &str, width: u32) -> Vec<(i64, f64)> {
        report
            .series(name, width)
            .map(|m| {
                m.points
                    .iter()
                    .map(|p| (p.bucket_start.as_secs(), p.value))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn summary<'a>(report: &'a MetricReport, name: &str) -> &'a SummaryMetric {
        report.summary(name).unwrap()
    }

    /// 30 ten-second buckets with two background messages each, plus a
    /// 40-message spike of one token at 150 s
    fn spike_stream() -> Vec<DanmuEvent> {
        let mut events = Vec::new();
        for bucket in 0..30 {
            for _ in 0..2 {
                events.push(event(bucket as f64 * 10.0 + 1.0, "bg"));
            }
        }
        for i in 0..40 {
            events.push(event(150.0 + (i % 10) as f64 * 0.5, "hype"));
        }
        events
    }

    #[test]
    fn test_count_series_end_to_end() {
        let events: Vec<DanmuEvent> = [0.2, 5.1, 10.0, 12.3, 40.0, 41.0, 80.0]
            .iter()
            .map(|&ts| DanmuEvent::new(PLATFORM, VIDEO, ts, "x"))
            .collect();
        let report = PulseProcessor::new().analyze(&run(), &events).unwrap();

        assert_eq!(
            values(&report, "danmu_count", 10),
            vec![(0, 2.0), (10, 2.0), (40, 2.0), (80, 1.0)]
        );
        assert_eq!(values(&report, "danmu_count", 60), vec![(0, 6.0), (60, 1.0)]);
    }

    #[test]
    fn test_full_catalogue_is_present() {
        let report = PulseProcessor::new().analyze(&run(), &spike_stream()).unwrap();

        let mut series: Vec<(String, u32)> = report
            .time_series
            .iter()
            .map(|m| (m.metric_name.clone(), m.bucket_sec.get()))
            .collect();
        series.sort();
        let mut expected: Vec<(String, u32)> = [
            ("cognitive_entropy", 10),
            ("cognitive_tokens_per_sec", 10),
            ("cognitive_unique_ratio", 10),
            ("danmu_count", 10),
            ("danmu_count", 60),
            ("sentiment_negative_ratio", 10),
            ("sentiment_negative_ratio", 60),
            ("sentiment_positive_ratio", 10),
            ("sentiment_positive_ratio", 60),
        ]
        .iter()
        .map(|(n, w)| (n.to_string(), *w))
        .collect();
        expected.sort();
        assert_eq!(series, expected);

        let names: Vec<&str> = report.summaries.iter().map(|m| m.metric_name()).collect();
        assert_eq!(
            names,
            vec![
                "high_energy_segments",
                "top_keywords",
                "user_activity",
                "danmu_mention_network",
                "danmu_bursty_tokens",
                "danmu_user_segments",
                "danmu_type_distribution",
            ]
        );
    }

    #[test]
    fn test_spike_reaches_peaks_bursts_and_keywords() {
        let report = PulseProcessor::new().analyze(&run(), &spike_stream()).unwrap();

        match summary(&report, "high_energy_segments") {
            SummaryMetric::HighEnergySegments(peaks) => {
                assert_eq!(peaks.count, 1);
                assert_eq!(peaks.segments[0].start_sec, 150);
                assert_eq!(peaks.segments[0].end_sec, 160);
                assert_eq!(peaks.segments[0].peak_count, 42);
            }
            other => panic!("unexpected summary {other:?}"),
        }

        match summary(&report, "danmu_bursty_tokens") {
            SummaryMetric::BurstyTokens(bursts) => {
                assert_eq!(bursts.items.len(), 1);
                assert_eq!(bursts.items[0].token, "hype");
                assert_eq!(bursts.items[0].peak_bucket_start_sec, 150);
                assert_eq!(bursts.items[0].peak_count, 40);
            }
            other => panic!("unexpected summary {other:?}"),
        }

        match summary(&report, "top_keywords") {
            SummaryMetric::TopKeywords(keywords) => {
                let ranked: Vec<(&str, u64)> = keywords
                    .items
                    .iter()
                    .map(|k| (k.token.as_str(), k.count))
                    .collect();
                assert_eq!(ranked, vec![("bg", 60), ("hype", 40)]);
            }
            other => panic!("unexpected summary {other:?}"),
        }
    }

    #[test]
    fn test_sentiment_ratio_series() {
        let events = vec![
            event(1.0, "a").with_sentiment(SentimentLabel::Positive),
            event(2.0, "b").with_sentiment(SentimentLabel::Negative),
            event(3.0, "c"),
            event(4.0, "d").with_sentiment(SentimentLabel::Positive),
        ];
        let report = PulseProcessor::new().analyze(&run(), &events).unwrap();
        assert_eq!(values(&report, "sentiment_positive_ratio", 10), vec![(0, 0.5)]);
        assert_eq!(values(&report, "sentiment_negative_ratio", 10), vec![(0, 0.25)]);
    }

    #[test]
    fn test_audience_summaries_through_pipeline() {
        let events = vec![
            event(1.0, "hi").with_sender("u1").with_type("scroll"),
            DanmuEvent::new(PLATFORM, VIDEO, 2.0, "@u1 hello")
                .with_sender("u2")
                .with_type("top"),
            event(3.0, "bye").with_sender("u1").with_type("scroll"),
        ];
        let report = PulseProcessor::new().analyze(&run(), &events).unwrap();

        match summary(&report, "user_activity") {
            SummaryMetric::UserActivity(activity) => {
                assert_eq!(activity.unique_users, 2);
                assert_eq!(activity.top_users[0].id, "u1");
                assert!((activity.top10_share - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected summary {other:?}"),
        }
        match summary(&report, "danmu_mention_network") {
            SummaryMetric::MentionNetwork(network) => {
                assert_eq!(network.messages, 3);
                assert_eq!(network.edges, 1);
                assert_eq!(network.top_edges[0].from, "u2");
                assert_eq!(network.top_edges[0].to, "u1");
            }
            other => panic!("unexpected summary {other:?}"),
        }
        match summary(&report, "danmu_type_distribution") {
            SummaryMetric::TypeDistribution(types) => {
                assert_eq!(types.total, 3);
                assert_eq!(types.items[0].danmu_type, "scroll");
            }
            other => panic!("unexpected summary {other:?}"),
        }
    }

    #[test]
    fn test_empty_stream_yields_empty_metrics() {
        let report = PulseProcessor::new().analyze(&run(), &[]).unwrap();

        assert_eq!(report.time_series.len(), 9);
        assert!(report.time_series.iter().all(|m| m.points.is_empty()));
        assert_eq!(report.summaries.len(), 7);
        assert_eq!(
            summary(&report, "high_energy_segments"),
            &SummaryMetric::HighEnergySegments(HighEnergySegments::default())
        );
        assert_eq!(report.analysis_meta, AnalysisMeta::default());
    }

    #[test]
    fn test_event_at_extreme_timestamp_is_analyzed() {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let events = vec![event(1e300, "far")];
            let _ = tx.send(PulseProcessor::new().analyze(&run(), &events));
        });
        let report = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("analysis finishes")
            .unwrap();

        assert_eq!(values(&report, "danmu_count", 10).len(), 1);
        assert_eq!(
            summary(&report, "high_energy_segments"),
            &SummaryMetric::HighEnergySegments(HighEnergySegments::default())
        );
    }

    #[test]
    fn test_wide_timeline_stays_sparse_for_peaks() {
        let counts = Series::from_sorted(vec![
            (BucketStart::from_secs(0), 3u64),
            (BucketStart::from_secs(10_000_000), 4),
        ]);
        assert_eq!(peak_input(counts.clone(), BucketWidth::TEN_SECONDS), counts);

        let events = vec![event(0.0, "a"), event(10_000_000.0, "b"), event(0.0, "c")];
        let report = PulseProcessor::new().analyze(&run(), &events).unwrap();
        assert_eq!(
            values(&report, "danmu_count", 10),
            vec![(0, 2.0), (10_000_000, 1.0)]
        );
    }

    #[test]
    fn test_short_timeline_is_densified_for_peaks() {
        let counts = Series::from_sorted(vec![
            (BucketStart::from_secs(0), 3u64),
            (BucketStart::from_secs(40), 4),
        ]);
        let filled: Vec<u64> = peak_input(counts, BucketWidth::TEN_SECONDS)
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(filled, vec![3, 0, 0, 0, 4]);
    }

    #[test]
    fn test_invalid_run_is_fatal() {
        let result = PulseProcessor::new().analyze(&AnalysisRun::new(PLATFORM, VIDEO, 0), &[]);
        assert!(matches!(result, Err(ComputeError::InvalidRun(_))));
    }

    #[test]
    fn test_other_subjects_are_ignored() {
        let mut events = vec![event(1.0, "mine"), event(2.0, "mine")];
        events.push(DanmuEvent::new(PLATFORM, "other", 1.0, "theirs").with_tokens(["theirs"]));
        events.push(DanmuEvent::new("youtube", VIDEO, 1.0, "theirs"));
        let mut untimed = event(0.0, "late");
        untimed.video_ts = None;
        events.push(untimed);

        let report = PulseProcessor::new().analyze(&run(), &events).unwrap();
        assert_eq!(values(&report, "danmu_count", 10), vec![(0, 2.0)]);
        assert_eq!(
            report.analysis_meta,
            AnalysisMeta {
                events_total: 5,
                events_analyzed: 3,
                events_without_timestamp: 1,
                events_without_tokens: 0,
            }
        );
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let events = spike_stream();
        let processor = PulseProcessor::new();
        let first = processor.analyze(&run(), &events).unwrap();
        let second = processor.analyze(&run(), &events).unwrap();

        assert_eq!(first.time_series, second.time_series);
        assert_eq!(first.summaries, second.summaries);
    }

    #[test]
    fn test_custom_widths() {
        let mut config = EngineConfig::default();
        config.series.count_widths = vec![BucketWidth::new(30).unwrap()];
        config.series.burst_width = BucketWidth::ONE_MINUTE;
        let processor = PulseProcessor::with_config(config).unwrap();

        let events = vec![event(1.0, "a"), event(31.0, "b"), event(65.0, "c")];
        let report = processor.analyze(&run(), &events).unwrap();

        assert_eq!(values(&report, "danmu_count", 30), vec![(0, 1.0), (30, 1.0), (60, 1.0)]);
        assert!(values(&report, "danmu_count", 10).is_empty());
        assert_eq!(report.time_series.len(), 6);
    }

    #[test]
    fn test_with_config_rejects_invalid_settings() {
        let mut config = EngineConfig::default();
        config.burst.burst_top_k = 0;
        assert!(PulseProcessor::with_config(config).is_err());
    }

    #[test]
    fn test_analyze_ndjson() {
        let ndjson = format!(
            "{}\n{}\n",
            r#"{"platform": "bilibili", "video_id": "BV1demo", "video_ts": 1.5, "content": "hi", "tokens": ["hi"]}"#,
            r#"{"platform": "bilibili", "video_id": "BV1demo", "video_ts": 12.0, "content": "yo", "tokens": ["yo"]}"#,
        );
        let json = analyze_ndjson(&ndjson, &run()).unwrap();

        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["producer"]["name"], "danmaku-pulse");
        assert_eq!(payload["run"]["run_id"], 42);
        assert_eq!(payload["analysis_meta"]["events_analyzed"], 2);
        assert_eq!(payload["summaries"][1]["metric_name"], "top_keywords");
    }

    #[test]
    fn test_analyze_ndjson_invalid_input() {
        assert!(analyze_ndjson("not valid json", &run()).is_err());
    }
}
