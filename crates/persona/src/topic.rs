//! Keyword topic detection.

/// Label used when no keyword matches.
pub const DEFAULT_TOPIC: &str = "general";

/// Keyword groups in priority order.  Matching is case-sensitive.
const TOPIC_KEYWORDS: &[(&[&str], &str)] = &[
    (&["music"], "music"),
    (&["dream"], "dreams"),
    (&["job", "work"], "career"),
];

pub fn classify_topic(input: &str) -> &'static str {
    TOPIC_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| input.contains(kw)))
        .map(|(_, topic)| *topic)
        .unwrap_or(DEFAULT_TOPIC)
}
