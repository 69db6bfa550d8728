//! Report encoding
//!
//! This module wraps computed metrics in a report envelope and renders it
//! either as one JSON document or as NDJSON rows shaped like the rows of a
//! metrics store.

use crate::error::ComputeError;
use crate::types::{AnalysisMeta, AnalysisRun, MetricReport, MetricSet, ReportProducer};
use crate::{PRODUCER_NAME, PULSE_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "danmu.report.v1";

/// Summary row name carrying run bookkeeping
pub const ANALYSIS_META_METRIC: &str = "analysis_meta";

/// One persisted metric row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricRow {
    TimeSeries {
        platform: String,
        video_id: String,
        run_id: u64,
        metric_name: String,
        bucket_start: i64,
        bucket_sec: u32,
        value: f64,
    },
    Summary {
        platform: String,
        video_id: String,
        run_id: u64,
        metric_name: String,
        value_json: serde_json::Value,
    },
}

/// Encoder producing metric reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap metrics for `run` in a report envelope
    pub fn encode(&self, run: &AnalysisRun, meta: AnalysisMeta, metrics: MetricSet) -> MetricReport {
        MetricReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: PULSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at: Utc::now().to_rfc3339(),
            run: run.clone(),
            analysis_meta: meta,
            time_series: metrics.time_series,
            summaries: metrics.summaries,
        }
    }

    /// Render a report as one JSON document
    pub fn to_json(report: &MetricReport, pretty: bool) -> Result<String, ComputeError> {
        let json = if pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(json)
    }

    /// Flatten a report into store rows.
    ///
    /// Time series points come first, then summaries, then one
    /// `analysis_meta` row.
    pub fn to_rows(report: &MetricReport) -> Result<Vec<MetricRow>, ComputeError> {
        let run = &report.run;
        let mut rows = Vec::new();

        for metric in &report.time_series {
            for point in metric.points.iter() {
                rows.push(MetricRow::TimeSeries {
                    platform: run.platform.clone(),
                    video_id: run.video_id.clone(),
                    run_id: run.run_id,
                    metric_name: metric.metric_name.clone(),
                    bucket_start: point.bucket_start.as_secs(),
                    bucket_sec: metric.bucket_sec.get(),
                    value: point.value,
                });
            }
        }

        for summary in &report.summaries {
            rows.push(MetricRow::Summary {
                platform: run.platform.clone(),
                video_id: run.video_id.clone(),
                run_id: run.run_id,
                metric_name: summary.metric_name().to_string(),
                value_json: summary.value_json()?,
            });
        }

        let mut meta = serde_json::to_value(report.analysis_meta)?;
        if let Some(fields) = meta.as_object_mut() {
            fields.insert(
                "generated_at".to_string(),
                serde_json::Value::from(report.generated_at.clone()),
            );
            fields.insert("run_id".to_string(), serde_json::Value::from(run.run_id));
        }
        rows.push(MetricRow::Summary {
            platform: run.platform.clone(),
            video_id: run.video_id.clone(),
            run_id: run.run_id,
            metric_name: ANALYSIS_META_METRIC.to_string(),
            value_json: meta,
        });

        Ok(rows)
    }

    /// Render a report as NDJSON store rows
    pub fn to_ndjson(report: &MetricReport) -> Result<String, ComputeError> {
        let mut out = String::new();
        for row in Self::to_rows(report)? {
            out.push_str(&serde_json::to_string(&row)?);
            out.push('\n');
        }
        Ok(out)
    }
}
