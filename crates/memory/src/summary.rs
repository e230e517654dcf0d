//! Natural-language summaries of conversation turns, produced by the
//! completion capability.  Used for history trimming and for episodes.

use anyhow::{Result, bail};
use kabo_llm::Completion;
use tracing::debug;

use crate::schema::Turn;

pub const SUMMARY_INSTRUCTION: &str =
    "Summarize the following conversation. Stick to the essentials, but retain personal details.";

/// Render turns as a labelled transcript.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::Human(text) => format!("User: {text}"),
            Turn::Assistant(text) => format!("Assistant: {text}"),
            Turn::Summary(text) => format!("Earlier summary: {text}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_prompt(turns: &[Turn]) -> String {
    format!(
        "{SUMMARY_INSTRUCTION}\n\nCONVERSATION:\n{}\n\nSUMMARY:",
        render_transcript(turns)
    )
}

/// Summarize `turns`.  An empty completion is an error so callers never store
/// a blank summary in place of real history.
pub async fn summarize_turns(completion: &dyn Completion, turns: &[Turn]) -> Result<String> {
    let reply = completion.complete(&summary_prompt(turns)).await?;
    let summary = reply.trim();
    if summary.is_empty() {
        bail!("completion returned an empty summary for {} turns", turns.len());
    }
    debug!(turns = turns.len(), summary_len = summary.len(), "summarized turns");
    Ok(summary.to_string())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Echo;

    #[async_trait]
    impl Completion for Echo {
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(format!("  {}  ", prompt.len()))
        }
    }

    struct Blank;

    #[async_trait]
    impl Completion for Blank {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("   \n".to_string())
        }
    }

    #[test]
    fn transcript_labels_each_turn_kind() {
        let turns = vec![
            Turn::Summary("we met".to_string()),
            Turn::Human("hi".to_string()),
            Turn::Assistant("hello".to_string()),
        ];
        assert_eq!(
            render_transcript(&turns),
            "Earlier summary: we met\nUser: hi\nAssistant: hello"
        );
        let prompt = summary_prompt(&turns);
        assert!(prompt.starts_with(SUMMARY_INSTRUCTION));
        assert!(prompt.contains("User: hi"));
    }

    #[tokio::test]
    async fn summary_is_trimmed() {
        let out = summarize_turns(&Echo, &[Turn::Human("hi".to_string())]).await.unwrap();
        assert_eq!(out, out.trim());
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn blank_summary_is_an_error() {
        assert!(summarize_turns(&Blank, &[Turn::Human("hi".to_string())]).await.is_err());
    }
}
