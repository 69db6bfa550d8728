//! Keyword ranking over upstream tokens

use serde::{Deserialize, Serialize};

use crate::schema::DanmuEvent;
use crate::types::Tally;

/// Common function words that carry no topical signal
const STOP_TOKENS: &[&str] = &[
    "的", "了", "啊", "呀", "吗", "吧", "和", "是", "我", "你", "他", "她", "它", "这", "那", "就",
    "都", "也", "不", "很", "在", "有",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub token: String,
    pub count: u64,
}

/// `top_keywords` summary document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordReport {
    pub items: Vec<KeywordCount>,
}

/// Whether a token survives stopword and noise filtering.
///
/// A lone symbol or punctuation mark is noise; a lone letter, digit or
/// ideograph is kept.
fn is_keyword(token: &str) -> bool {
    if token.is_empty() || STOP_TOKENS.contains(&token) {
        return false;
    }
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_alphanumeric(),
        _ => true,
    }
}

/// Most frequent tokens, ties in first-seen order
pub fn top_keywords<'a>(
    events: impl IntoIterator<Item = &'a DanmuEvent>,
    top_k: usize,
) -> KeywordReport {
    let mut counts: Tally<&str> = Tally::new();
    for event in events {
        for token in &event.tokens {
            if is_keyword(token) {
                counts.add(token.as_str());
            }
        }
    }

    KeywordReport {
        items: counts
            .top(top_k)
            .into_iter()
            .map(|(token, count)| KeywordCount {
                token: token.to_string(),
                count,
            })
            .collect(),
    }
}
