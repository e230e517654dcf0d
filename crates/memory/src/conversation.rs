//! Persistent conversation history.
//!
//! The full ordered sequence of turns lives in memory and is mirrored to a
//! single JSON file.  Every mutation rewrites the file atomically; if that
//! write fails the in-memory sequence is restored so memory and disk never
//! disagree.

use std::path::{Path, PathBuf};

use anyhow::Result;
use kabo_llm::Completion;
use tracing::{debug, info};

use crate::schema::Turn;
use crate::snapshot::{read_json_records, write_json_atomic};
use crate::summary::summarize_turns;

/// Turn totals by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnCounts {
    pub human: usize,
    pub assistant: usize,
    pub summary: usize,
}

impl TurnCounts {
    pub fn exchange(&self) -> usize {
        self.human + self.assistant
    }
}

/// Result of [`ConversationMemory::trim_and_summarize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimOutcome {
    /// The exchange count was at or below the threshold.
    Untouched,
    Summarized {
        /// Number of turns folded into the summary.
        folded: usize,
        /// Number of turns kept verbatim after the summary.
        kept: usize,
    },
}

#[derive(Debug)]
pub struct ConversationMemory {
    path: PathBuf,
    turns: Vec<Turn>,
}

impl ConversationMemory {
    /// Load the history at `path`.  A missing file is an empty history;
    /// records with an unknown kind are skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let turns = read_json_records::<Turn>(&path)?.unwrap_or_default();
        debug!(path = %path.display(), turns = turns.len(), "conversation loaded");
        Ok(Self { path, turns })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns (fewer if the history is shorter).
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn counts(&self) -> TurnCounts {
        let mut counts = TurnCounts::default();
        for turn in &self.turns {
            match turn {
                Turn::Human(_) => counts.human += 1,
                Turn::Assistant(_) => counts.assistant += 1,
                Turn::Summary(_) => counts.summary += 1,
            }
        }
        counts
    }

    pub async fn append(&mut self, turn: Turn) -> Result<()> {
        self.commit(|turns| turns.push(turn)).await
    }

    /// Record one completed exchange with a single snapshot write, so a
    /// crash never leaves a human turn without its reply.
    pub async fn append_exchange(
        &mut self,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) -> Result<()> {
        let user = Turn::Human(user.into());
        let assistant = Turn::Assistant(assistant.into());
        self.commit(|turns| {
            turns.push(user);
            turns.push(assistant);
        })
        .await
    }

    pub async fn clear(&mut self) -> Result<()> {
        let cleared = self.turns.len();
        self.commit(Vec::clear).await?;
        info!(cleared, "conversation history cleared");
        Ok(())
    }

    /// Fold everything but the last `threshold` turns into a single summary
    /// turn once the human/assistant count exceeds `threshold`.
    ///
    /// Existing summary turns are part of the folded prefix, so the result
    /// always holds exactly one summary followed by `threshold` turns.  On a
    /// summarization or write failure the history is left unchanged.
    pub async fn trim_and_summarize(
        &mut self,
        threshold: usize,
        completion: &dyn Completion,
    ) -> Result<TrimOutcome> {
        let exchange = self.counts().exchange();
        if exchange <= threshold {
            return Ok(TrimOutcome::Untouched);
        }

        let split = self.turns.len().saturating_sub(threshold);
        let summary = summarize_turns(completion, &self.turns[..split]).await?;

        let kept = self.turns.len() - split;
        self.commit(|turns| {
            let tail = turns.split_off(split);
            turns.clear();
            turns.push(Turn::Summary(summary));
            turns.extend(tail);
        })
        .await?;

        info!(folded = split, kept, "conversation history summarized");
        Ok(TrimOutcome::Summarized { folded: split, kept })
    }

    /// Apply `mutate`, persist, and roll back on a failed write.
    async fn commit<F>(&mut self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Turn>),
    {
        let previous = self.turns.clone();
        mutate(&mut self.turns);
        if let Err(err) = write_json_atomic(&self.path, &self.turns).await {
            self.turns = previous;
            return Err(err);
        }
        Ok(())
    }
}
