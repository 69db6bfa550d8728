//! Statistical analytics over danmaku event streams
//!
//! Every stage is a pure function of an immutable event snapshot:
//!
//! - `buckets`: time bucketing plus message/token aggregation
//! - `burst`: per-token burst detection over the sparse bucket index
//! - `peak`: high-energy windows over the dense message-count series
//! - `cognitive`: per-bucket entropy, throughput and lexical diversity
//! - `mentions`: `@` reference graph summary
//! - `audience`: user activity, user segmentation and message types
//! - `keywords`: filtered token frequency ranking

pub mod audience;
pub mod buckets;
pub mod burst;
pub mod cognitive;
pub mod keywords;
pub mod mentions;
pub mod peak;
pub mod stats;

pub use audience::{
    classify_user, type_distribution, user_activity_summary, user_segmentation_summary,
    TypeCount, TypeDistribution, UserActivity, UserCount, UserSegment, UserSegmentation, UserStats,
};
pub use buckets::{
    bucket_start, count_by_bucket, sentiment_ratio_by_bucket, MessageAggregate, TokenAggregate,
};
pub use burst::{BurstDetector, BurstParams, BurstReport, BurstSegment, BurstToken};
pub use cognitive::{cognitive_metrics, shannon_entropy, CognitiveSeries};
pub use keywords::{top_keywords, KeywordCount, KeywordReport};
pub use mentions::{extract_mentions, MentionGraph, MentionNetworkSummary};
pub use peak::{HighEnergySegments, PeakDetector, PeakParams, PeakSegment};
