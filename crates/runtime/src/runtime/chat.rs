//! One conversational turn: update state, recall, respond, remember.

use std::fmt;

use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use kabo_memory::{TrimOutcome, summarize_turns};

use crate::prompt_builder::{PromptInputs, build_chat_prompt};

use super::AgentRuntime;

/// Returned to the user when the completion call fails.
pub const FALLBACK_REPLY: &str = "Something went wrong.";

/// Steps of a turn, in order.  A failed completion ends the turn after
/// `PromptBuilt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    StateUpdated,
    HistoryFetched,
    FactsRetrieved,
    PromptBuilt,
    Completed,
    Archived,
}

impl TurnPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::StateUpdated => "state_updated",
            Self::HistoryFetched => "history_fetched",
            Self::FactsRetrieved => "facts_retrieved",
            Self::PromptBuilt => "prompt_built",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn enter(phase: TurnPhase) {
    debug!(phase = %phase, "turn phase");
}

impl AgentRuntime {
    /// Answer `user_input` at the current wall-clock time.  Never fails; a
    /// completion error yields [`FALLBACK_REPLY`].
    pub async fn get_response(&mut self, user_input: &str) -> String {
        let now = self.now();
        self.get_response_at(user_input, now).await
    }

    #[instrument(
        skip(self, user_input),
        fields(
            persona = %self.config.persona.name,
            model = %self.config.active_model(),
            input_len = user_input.len()
        )
    )]
    pub async fn get_response_at(&mut self, user_input: &str, now: NaiveDateTime) -> String {
        let transition = self.persona.update(user_input, &now, &mut self.rng);
        enter(TurnPhase::StateUpdated);
        debug!(?transition, topic = %self.persona.topic, "persona updated");

        let history = self.memory.turns();
        enter(TurnPhase::HistoryFetched);

        let facts = match self
            .archive
            .search(user_input, self.config.memory.retrieval_k)
            .await
        {
            Ok(facts) => facts,
            Err(err) => {
                warn!(error = %err, "episode retrieval failed, continuing without facts");
                Vec::new()
            }
        };
        enter(TurnPhase::FactsRetrieved);

        let prompt = build_chat_prompt(&PromptInputs {
            persona_name: &self.config.persona.name,
            persona: &self.persona,
            facts: &facts,
            history,
            user_input,
            max_tokens: self.config.llm.max_tokens,
        });
        enter(TurnPhase::PromptBuilt);
        debug!(
            history_turns = history.len(),
            facts = facts.len(),
            prompt_len = prompt.len(),
            "prompt assembled"
        );

        let reply = match self.completion.complete(&prompt).await {
            Ok(reply) => reply.trim().to_string(),
            Err(err) => {
                warn!(error = %err, "completion failed, returning fallback reply");
                enter(TurnPhase::Idle);
                return FALLBACK_REPLY.to_string();
            }
        };
        enter(TurnPhase::Completed);

        if let Err(err) = self.memory.append_exchange(user_input, reply.as_str()).await {
            warn!(error = %err, "failed to persist conversation turn");
        }

        if self.config.memory.auto_trim {
            match self
                .memory
                .trim_and_summarize(self.config.memory.summary_limit, self.completion.as_ref())
                .await
            {
                Ok(TrimOutcome::Summarized { folded, kept }) => {
                    info!(folded, kept, "history trimmed after turn");
                }
                Ok(TrimOutcome::Untouched) => {}
                Err(err) => warn!(error = %err, "history trim failed"),
            }
        }

        match self.archive_recent_turns().await {
            Ok(true) => enter(TurnPhase::Archived),
            Ok(false) => debug!("no recent turns to archive"),
            Err(err) => warn!(error = %err, "episode archival failed"),
        }
        enter(TurnPhase::Idle);

        reply
    }

    /// Summarize the last `episode_window` turns into an episode titled by
    /// the current topic.  Returns whether anything was archived.
    async fn archive_recent_turns(&mut self) -> Result<bool> {
        let recent = self
            .memory
            .recent(self.config.memory.episode_window)
            .to_vec();
        if recent.is_empty() {
            return Ok(false);
        }
        let summary = summarize_turns(self.completion.as_ref(), &recent).await?;
        let title = format!("Conversation about {}", self.persona.topic);
        self.archive.save_episode(title, summary, &recent).await?;
        Ok(true)
    }
}
