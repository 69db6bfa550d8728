//! Audience summaries
//!
//! User activity concentration, rule-based user segmentation, and the
//! distribution of message display types.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::schema::DanmuEvent;
use crate::types::Tally;

/// Label used when a message carries no display type
const UNKNOWN_TYPE: &str = "unknown";

/// Behavioral segment of a sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSegment {
    Low,
    SpamSuspect,
    Heavy,
    Active,
    RepeatSuspect,
    Normal,
}

/// Classify a sender; the first matching rule wins
pub fn classify_user(count: u64, unique_ratio: f64) -> UserSegment {
    if count <= 1 {
        return UserSegment::Low;
    }
    if count >= 50 && unique_ratio < 0.6 {
        return UserSegment::SpamSuspect;
    }
    if count >= 50 {
        return UserSegment::Heavy;
    }
    if count >= 10 {
        return UserSegment::Active;
    }
    if unique_ratio < 0.5 {
        return UserSegment::RepeatSuspect;
    }
    UserSegment::Normal
}

/// Descriptive statistics for one sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub id: String,
    pub count: u64,
    /// Mean message length in characters
    pub avg_len: f64,
    /// Distinct message texts / message count
    pub unique_ratio: f64,
    pub segment: UserSegment,
}

/// `danmu_user_segments` summary document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSegmentation {
    pub segment_counts: BTreeMap<UserSegment, u64>,
    pub top_users: Vec<UserStats>,
}

#[derive(Default)]
struct UserAccumulator {
    total_len: u64,
    texts: HashSet<String>,
}

/// Segment every identified sender with at least one non-empty message
pub fn user_segmentation_summary<'a>(
    events: impl IntoIterator<Item = &'a DanmuEvent>,
    top_n: usize,
) -> UserSegmentation {
    let mut counts: Tally<String> = Tally::new();
    let mut accumulators: HashMap<String, UserAccumulator> = HashMap::new();

    for event in events {
        let Some(sender) = event.sender_id() else {
            continue;
        };
        if event.content.is_empty() {
            continue;
        }
        counts.add(sender.to_string());
        let acc = accumulators.entry(sender.to_string()).or_default();
        acc.total_len += event.content.chars().count() as u64;
        acc.texts.insert(event.content.clone());
    }

    let stats_for = |id: &String, count: u64| -> UserStats {
        let (avg_len, unique_ratio) = match accumulators.get(id) {
            Some(acc) if count > 0 => (
                acc.total_len as f64 / count as f64,
                acc.texts.len() as f64 / count as f64,
            ),
            _ => (0.0, 0.0),
        };
        UserStats {
            id: id.clone(),
            count,
            avg_len,
            unique_ratio,
            segment: classify_user(count, unique_ratio),
        }
    };

    let mut segment_counts: BTreeMap<UserSegment, u64> = BTreeMap::new();
    for (id, count) in counts.iter() {
        *segment_counts.entry(stats_for(id, count).segment).or_insert(0) += 1;
    }

    let top_users = counts
        .top(top_n)
        .into_iter()
        .map(|(id, count)| stats_for(id, count))
        .collect();

    UserSegmentation {
        segment_counts,
        top_users,
    }
}

/// Message count of one sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCount {
    pub id: String,
    pub count: u64,
}

/// `user_activity` summary document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub unique_users: usize,
    pub top_users: Vec<UserCount>,
    /// Share of attributed messages sent by the most active users
    pub top10_share: f64,
}

/// Activity concentration among identified senders.
///
/// `share_top` sets how many leading users feed `top10_share`.
pub fn user_activity_summary<'a>(
    events: impl IntoIterator<Item = &'a DanmuEvent>,
    top_n: usize,
    share_top: usize,
) -> UserActivity {
    let mut counts: Tally<String> = Tally::new();
    for event in events {
        if let Some(sender) = event.sender_id() {
            counts.add(sender.to_string());
        }
    }

    let ranked = counts.ranked();
    let total = counts.total();
    let leading: u64 = ranked.iter().take(share_top).map(|(_, c)| c).sum();
    let top10_share = if total > 0 {
        leading as f64 / total as f64
    } else {
        0.0
    };

    UserActivity {
        unique_users: counts.len(),
        top_users: ranked
            .into_iter()
            .take(top_n)
            .map(|(id, count)| UserCount {
                id: id.clone(),
                count,
            })
            .collect(),
        top10_share,
    }
}

/// Message count of one display type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub danmu_type: String,
    pub count: u64,
}

/// `danmu_type_distribution` summary document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDistribution {
    pub total: u64,
    pub items: Vec<TypeCount>,
}

/// Messages per display type, most common first
pub fn type_distribution<'a>(events: impl IntoIterator<Item = &'a DanmuEvent>) -> TypeDistribution {
    let mut counts: Tally<String> = Tally::new();
    for event in events {
        let kind = event
            .danmu_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_TYPE);
        counts.add(kind.to_string());
    }

    TypeDistribution {
        total: counts.total(),
        items: counts
            .ranked()
            .into_iter()
            .map(|(kind, count)| TypeCount {
                danmu_type: kind.clone(),
                count,
            })
            .collect(),
    }
}
