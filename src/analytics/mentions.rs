//! Mention network
//!
//! Extracts `@handle` references from message text and aggregates a weighted
//! sender → target graph.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::DanmuEvent;
use crate::types::Tally;

/// `@` followed by 1-20 letters, digits, `_`, `-` or CJK unified ideographs
static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([0-9A-Za-z_\x{4e00}-\x{9fff}\-]{1,20})").expect("mention pattern is valid")
});

/// All mention targets in `text`, in order of appearance
pub fn extract_mentions(text: &str) -> Vec<&str> {
    MENTION
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Sender ranked by outgoing mentions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionSender {
    pub id: String,
    pub out_mentions: u64,
    pub unique_targets: usize,
}

/// Target ranked by incoming mentions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionTarget {
    pub target: String,
    pub in_mentions: u64,
}

/// Weighted sender → target edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionEdge {
    pub from: String,
    pub to: String,
    pub count: u64,
}

/// `danmu_mention_network` summary document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionNetworkSummary {
    pub messages: u64,
    pub edges: u64,
    pub unique_senders: usize,
    pub unique_targets: usize,
    pub top_senders: Vec<MentionSender>,
    pub top_targets: Vec<MentionTarget>,
    pub top_edges: Vec<MentionEdge>,
}

/// Aggregated mention graph
#[derive(Debug, Clone, Default)]
pub struct MentionGraph {
    messages: u64,
    edges: Tally<(String, String)>,
    out_degree: Tally<String>,
    in_degree: Tally<String>,
    targets_by_sender: HashMap<String, HashSet<String>>,
}

impl MentionGraph {
    /// Scan every message; anonymous or empty messages only count as scanned
    pub fn build<'a>(events: impl IntoIterator<Item = &'a DanmuEvent>) -> Self {
        let mut graph = Self::default();

        for event in events {
            graph.messages += 1;
            let Some(sender) = event.sender_id() else {
                continue;
            };
            if event.content.is_empty() {
                continue;
            }
            for target in extract_mentions(&event.content) {
                graph
                    .edges
                    .add((sender.to_string(), target.to_string()));
                graph.out_degree.add(sender.to_string());
                graph.in_degree.add(target.to_string());
                graph
                    .targets_by_sender
                    .entry(sender.to_string())
                    .or_default()
                    .insert(target.to_string());
            }
        }

        graph
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    /// Mentions from `sender` to `target`, zero when absent
    pub fn edge_weight(&self, sender: &str, target: &str) -> u64 {
        self.edges.get(&(sender.to_string(), target.to_string()))
    }

    pub fn out_degree(&self, sender: &str) -> u64 {
        self.out_degree.get(sender)
    }

    pub fn in_degree(&self, target: &str) -> u64 {
        self.in_degree.get(target)
    }

    pub fn unique_targets_of(&self, sender: &str) -> usize {
        self.targets_by_sender.get(sender).map_or(0, HashSet::len)
    }

    /// Summarize with top-`top_n` rankings (ties in first-encountered order)
    pub fn summary(&self, top_n: usize) -> MentionNetworkSummary {
        MentionNetworkSummary {
            messages: self.messages,
            edges: self.edges.total(),
            unique_senders: self.out_degree.len(),
            unique_targets: self.in_degree.len(),
            top_senders: self
                .out_degree
                .top(top_n)
                .into_iter()
                .map(|(id, out_mentions)| MentionSender {
                    id: id.clone(),
                    out_mentions,
                    unique_targets: self.unique_targets_of(id),
                })
                .collect(),
            top_targets: self
                .in_degree
                .top(top_n)
                .into_iter()
                .map(|(target, in_mentions)| MentionTarget {
                    target: target.clone(),
                    in_mentions,
                })
                .collect(),
            top_edges: self
                .edges
                .top(top_n)
                .into_iter()
                .map(|((from, to), count)| MentionEdge {
                    from: from.clone(),
                    to: to.clone(),
                    count,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn msg(sender: Option<&str>, content: &str) -> DanmuEvent {
        let event = DanmuEvent::new("p", "v", 0.0, content);
        match sender {
            Some(s) => event.with_sender(s),
            None => event,
        }
    }

    #[test]
    fn test_extract_mentions() {
        assert_eq!(
            extract_mentions("@user_name-1 hi @朋友"),
            vec!["user_name-1", "朋友"]
        );
        assert!(extract_mentions("just @ nothing").is_empty());
        assert!(extract_mentions("@").is_empty());
        assert!(extract_mentions("no mentions here").is_empty());
    }

    #[test]
    fn test_long_handle_truncated_to_twenty() {
        let text = format!("@{}", "a".repeat(25));
        assert_eq!(extract_mentions(&text), vec!["a".repeat(20).as_str()]);
    }

    #[test]
    fn test_handle_stops_at_disallowed_char() {
        assert_eq!(extract_mentions("@up主好 @b.c"), vec!["up主好", "b"]);
    }

    #[test]
    fn test_graph_counts() {
        let events = vec![
            msg(Some("u1"), "@a @b"),
            msg(Some("u1"), "@a again"),
            msg(Some("u2"), "@a"),
            msg(None, "@ghost"),
            msg(Some("u3"), ""),
            msg(Some("u4"), "nothing"),
        ];
        let graph = MentionGraph::build(&events);

        assert_eq!(graph.messages(), 6);
        assert_eq!(graph.edge_weight("u1", "a"), 2);
        assert_eq!(graph.edge_weight("u1", "zzz"), 0);
        assert_eq!(graph.out_degree("u1"), 3);
        assert_eq!(graph.in_degree("a"), 3);
        assert_eq!(graph.in_degree("ghost"), 0);
        assert_eq!(graph.unique_targets_of("u1"), 2);

        let summary = graph.summary(20);
        assert_eq!(summary.messages, 6);
        assert_eq!(summary.edges, 4);
        assert_eq!(summary.unique_senders, 2);
        assert_eq!(summary.unique_targets, 2);
        assert_eq!(
            summary.top_senders,
            vec![
                MentionSender {
                    id: "u1".to_string(),
                    out_mentions: 3,
                    unique_targets: 2,
                },
                MentionSender {
                    id: "u2".to_string(),
                    out_mentions: 1,
                    unique_targets: 1,
                },
            ]
        );
        assert_eq!(summary.top_targets[0].target, "a");
        assert_eq!(summary.top_edges[0].count, 2);
    }

    #[test]
    fn test_ties_keep_first_encountered_order() {
        let events = vec![
            msg(Some("x"), "@late"),
            msg(Some("y"), "@early"),
            msg(Some("z"), "@late @early"),
        ];
        let summary = MentionGraph::build(&events).summary(1);

        assert_eq!(summary.top_targets.len(), 1);
        assert_eq!(summary.top_targets[0].target, "late");
        assert_eq!(summary.top_senders[0].id, "z");
        assert_eq!(summary.top_edges[0].from, "x");
    }

    #[test]
    fn test_empty_stream() {
        let events: Vec<DanmuEvent> = Vec::new();
        assert_eq!(
            MentionGraph::build(&events).summary(20),
            MentionNetworkSummary::default()
        );
    }
}
