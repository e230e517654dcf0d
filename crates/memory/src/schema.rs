use serde::{Deserialize, Serialize};

/// One utterance in the conversation.
///
/// Persisted as `{"type": "human" | "ai" | "summary", "content": "..."}`.
/// `Summary` turns only ever sit at the head of a conversation, where they
/// replace a trimmed prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum Turn {
    #[serde(rename = "human")]
    Human(String),
    #[serde(rename = "ai")]
    Assistant(String),
    #[serde(rename = "summary")]
    Summary(String),
}

impl Turn {
    pub fn content(&self) -> &str {
        match self {
            Self::Human(text) | Self::Assistant(text) | Self::Summary(text) => text,
        }
    }

    /// Persisted `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Human(_) => "human",
            Self::Assistant(_) => "ai",
            Self::Summary(_) => "summary",
        }
    }

    /// Human and assistant turns count toward the trim threshold; summaries
    /// do not.
    pub fn is_exchange(&self) -> bool {
        matches!(self, Self::Human(_) | Self::Assistant(_))
    }
}

/// A titled summary of a block of recent conversation.  Immutable once
/// archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub title: String,
    pub summary: String,
}
