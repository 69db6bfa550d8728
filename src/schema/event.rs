//! danmu.event.v1 schema definition

use serde::{Deserialize, Serialize};

use crate::types::SentimentLabel;

/// Current schema version
pub const SCHEMA_VERSION: &str = "danmu.event.v1";

/// A single audience message anchored to the playback timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanmuEvent {
    /// Schema version identifier (optional; checked when present)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Source platform (e.g. "bilibili")
    pub platform: String,
    /// Video identifier on that platform
    pub video_id: String,
    /// Playback position in seconds
    #[serde(default)]
    pub video_ts: Option<f64>,
    /// Normalized message text
    #[serde(default)]
    pub content: String,
    /// Ordered tokens produced upstream
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Sentiment label produced upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentLabel>,
    /// Opaque, already anonymized sender identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Display mode of the message (scroll, top, bottom, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danmu_type: Option<String>,
}

impl DanmuEvent {
    /// Create an event with text and timestamp; tokens and labels start empty
    pub fn new(
        platform: impl Into<String>,
        video_id: impl Into<String>,
        video_ts: f64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            platform: platform.into(),
            video_id: video_id.into(),
            video_ts: Some(video_ts),
            content: content.into(),
            tokens: Vec::new(),
            sentiment: None,
            sender: None,
            danmu_type: None,
        }
    }

    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sentiment(mut self, label: SentimentLabel) -> Self {
        self.sentiment = Some(label);
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_type(mut self, danmu_type: impl Into<String>) -> Self {
        self.danmu_type = Some(danmu_type.into());
        self
    }

    /// Playback position usable for bucketing.
    ///
    /// Negative and non-finite values are treated as missing.
    pub fn playback_sec(&self) -> Option<f64> {
        self.video_ts.filter(|ts| ts.is_finite() && *ts >= 0.0)
    }

    /// Sender identity, if present and non-empty
    pub fn sender_id(&self) -> Option<&str> {
        self.sender.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether the event belongs to the given platform/video pair
    pub fn is_subject(&self, platform: &str, video_id: &str) -> bool {
        self.platform == platform && self.video_id == video_id
    }

    /// Per-record defects. None of these fail a batch; each one only excludes
    /// the event from the stages that need the missing piece.
    pub fn issues(&self) -> Vec<EventIssue> {
        let mut issues = Vec::new();

        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                issues.push(EventIssue::UnknownSchemaVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: version.clone(),
                });
            }
        }

        match self.video_ts {
            None => issues.push(EventIssue::MissingTimestamp),
            Some(ts) if !ts.is_finite() || ts < 0.0 => {
                issues.push(EventIssue::InvalidTimestamp { value: ts })
            }
            Some(_) => {}
        }

        if self.tokens.iter().all(|t| t.is_empty()) {
            issues.push(EventIssue::EmptyTokens);
        }

        if self.content.is_empty() {
            issues.push(EventIssue::EmptyContent);
        }

        issues
    }
}

/// Per-record defects found during validation
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum EventIssue {
    #[error("Unknown schema version: expected {expected}, got {actual}")]
    UnknownSchemaVersion { expected: String, actual: String },

    #[error("Missing playback timestamp (excluded from every time series)")]
    MissingTimestamp,

    #[error("Invalid playback timestamp {value} (excluded from every time series)")]
    InvalidTimestamp { value: f64 },

    #[error("Empty token list (excluded from token statistics)")]
    EmptyTokens,

    #[error("Empty content (excluded from mention and user statistics)")]
    EmptyContent,
}
