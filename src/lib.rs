//! Danmaku Pulse - Batch statistics engine for time-synchronized audience messages
//!
//! Pulse turns the danmaku stream of one video into a fixed catalogue of
//! metrics through a deterministic pipeline: event selection → time bucketing
//! and aggregation → burst, peak and cognitive detectors → audience, mention
//! and keyword summaries → report encoding.
//!
//! ## Modules
//!
//! - **Analytics**: Pure statistical stages over an immutable event snapshot
//! - **Pipeline**: Run orchestration producing a `MetricReport`

pub mod analytics;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod types;

pub use config::EngineConfig;
pub use encoder::{MetricRow, ReportEncoder, REPORT_VERSION};
pub use error::ComputeError;
pub use pipeline::{analyze_ndjson, PulseProcessor};
pub use types::{AnalysisRun, MetricReport, MetricSet, SummaryMetric, TimeSeriesMetric};

// Schema exports
pub use schema::{DanmuEvent, EventIssue, EventReader, SCHEMA_VERSION};

/// Pulse version embedded in every report
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "danmaku-pulse";
