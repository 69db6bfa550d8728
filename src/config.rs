//! Engine configuration
//!
//! Every section falls back to its defaults, so an empty TOML file (or no
//! file at all) yields the standard metric catalogue.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analytics::{BurstParams, PeakParams};
use crate::error::ComputeError;
use crate::types::BucketWidth;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Widths for the message-count and sentiment-ratio series
    pub count_widths: Vec<BucketWidth>,
    pub cognitive_width: BucketWidth,
    /// Width of the dense count series fed to the peak detector
    pub peak_width: BucketWidth,
    pub burst_width: BucketWidth,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            count_widths: vec![BucketWidth::TEN_SECONDS, BucketWidth::ONE_MINUTE],
            cognitive_width: BucketWidth::TEN_SECONDS,
            peak_width: BucketWidth::TEN_SECONDS,
            burst_width: BucketWidth::TEN_SECONDS,
        }
    }
}

/// Sizes of the ranked summary lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub keyword_top_k: usize,
    pub mention_top_n: usize,
    pub segment_top_n: usize,
    pub activity_top_n: usize,
    /// Leading users counted in `top10_share`
    pub activity_share_top: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            keyword_top_k: 50,
            mention_top_n: 20,
            segment_top_n: 20,
            activity_top_n: 20,
            activity_share_top: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub series: SeriesConfig,
    pub burst: BurstParams,
    pub peak: PeakParams,
    pub ranking: RankingConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ComputeError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ComputeError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject settings that would make a stage meaningless
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.series.count_widths.is_empty() {
            return Err(ComputeError::InvalidConfig(
                "series.count_widths must list at least one width".to_string(),
            ));
        }

        let top_ks = [
            ("burst.token_top_k", self.burst.token_top_k),
            ("burst.burst_top_k", self.burst.burst_top_k),
            ("ranking.keyword_top_k", self.ranking.keyword_top_k),
            ("ranking.mention_top_n", self.ranking.mention_top_n),
            ("ranking.segment_top_n", self.ranking.segment_top_n),
            ("ranking.activity_top_n", self.ranking.activity_top_n),
            ("ranking.activity_share_top", self.ranking.activity_share_top),
        ];
        for (name, value) in top_ks {
            if value == 0 {
                return Err(ComputeError::InvalidConfig(format!("{name} must be positive")));
            }
        }

        let thresholds = [
            ("burst.z_threshold", self.burst.z_threshold),
            ("peak.z_threshold", self.peak.z_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(ComputeError::InvalidConfig(format!("{name} must be finite")));
            }
        }

        Ok(())
    }
}
