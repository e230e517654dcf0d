//! Append-only episode archive paired with its vector index.
//!
//! `episodes.json` is the source of truth.  `vector_index.json` holds one
//! entry per episode in the same order and is rebuilt from the archive at
//! open whenever the two disagree (a crash between the two writes, a changed
//! embedding backend, or a damaged index file).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use kabo_llm::Embedder;
use tracing::{debug, info, warn};

use crate::schema::{EpisodeRecord, Turn};
use crate::snapshot::{read_json_records, write_json_atomic};
use crate::vector_index::VectorIndex;

/// Largest per-component difference at which a re-embedded summary still
/// counts as the stored vector.
const EMBEDDING_TOLERANCE: f32 = 1e-3;

pub struct EpisodicArchive {
    episodes_path: PathBuf,
    index_path: PathBuf,
    episodes: Vec<EpisodeRecord>,
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    /// Set when the index could not be rebuilt at open.  The in-memory index
    /// stays empty until the next successful rebuild.
    rebuild_pending: bool,
}

impl EpisodicArchive {
    /// Load the archive and bring its index in step.
    ///
    /// An unavailable embedder never fails the open.  If the stored index
    /// cannot be verified it is kept as loaded.  If it has to be rebuilt and
    /// cannot be, searches return nothing and the rebuild is retried by the
    /// next `save_episode`.
    pub async fn open(
        episodes_path: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let episodes_path = episodes_path.into();
        let index_path = index_path.into();
        let episodes = read_json_records::<EpisodeRecord>(&episodes_path)?.unwrap_or_default();

        let mut archive = Self {
            episodes_path,
            index_path,
            episodes,
            index: VectorIndex::new(),
            embedder,
            rebuild_pending: false,
        };

        match VectorIndex::load(&archive.index_path)? {
            Some(index) => {
                if archive.index_matches(&index).await {
                    archive.index = index;
                } else {
                    archive.try_rebuild_at_open().await;
                }
            }
            None if archive.episodes.is_empty() => {
                archive.index.persist(&archive.index_path).await?;
                debug!(path = %archive.index_path.display(), "initialized empty vector index");
            }
            None => archive.try_rebuild_at_open().await,
        }

        debug!(
            episodes = archive.episodes.len(),
            embedder = archive.embedder.name(),
            rebuild_pending = archive.rebuild_pending,
            "episodic archive opened"
        );
        Ok(archive)
    }

    pub fn episodes(&self) -> &[EpisodeRecord] {
        &self.episodes
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn episodes_path(&self) -> &Path {
        &self.episodes_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Whether the index still has to be rebuilt from the archive.
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Archive an episode and index its summary.
    ///
    /// The summary is embedded first so an embedding failure archives
    /// nothing.  Then the archive file is rewritten, then the index file.  If
    /// the index write fails the archive keeps the episode and the index is
    /// rebuilt on the next open.  A rebuild left pending at open runs first.
    /// `recent_turns` is only logged.
    pub async fn save_episode(
        &mut self,
        title: impl Into<String>,
        summary: impl Into<String>,
        recent_turns: &[Turn],
    ) -> Result<()> {
        if self.rebuild_pending {
            self.rebuild_index().await.context("rebuilding vector index")?;
        }
        let record = EpisodeRecord {
            title: title.into(),
            summary: summary.into(),
        };
        let embedding = self
            .embedder
            .embed(&record.summary)
            .await
            .context("embedding episode summary")?;
        self.index.check_dimension(&embedding)?;

        self.episodes.push(record.clone());
        if let Err(err) = write_json_atomic(&self.episodes_path, &self.episodes).await {
            self.episodes.pop();
            return Err(err.context("writing episode archive"));
        }

        self.index.add(embedding, record.summary, record.title.clone())?;
        self.index
            .persist(&self.index_path)
            .await
            .context("writing vector index")?;

        info!(
            title = %record.title,
            episodes = self.episodes.len(),
            source_turns = recent_turns.len(),
            "episode archived"
        );
        Ok(())
    }

    /// Summaries of the `k` episodes most similar to `query`, best first.
    /// An empty archive answers without calling the embedder.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await.context("embedding query")?;
        let hits = self.index.search(&vector, k)?;
        debug!(
            k,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "episode search"
        );
        Ok(hits.into_iter().map(|hit| hit.entry.text.clone()).collect())
    }

    /// Entries must pair up with episodes, and the current embedder must
    /// reproduce the first stored vector.  A backend switch shows up as a
    /// different dimension or, at the same dimension, a different vector.
    /// When the embedder cannot be reached the index is trusted as loaded.
    async fn index_matches(&self, index: &VectorIndex) -> bool {
        if index.len() != self.episodes.len() {
            warn!(
                index = index.len(),
                episodes = self.episodes.len(),
                "vector index out of step with archive"
            );
            return false;
        }
        let paired = index
            .entries()
            .iter()
            .zip(&self.episodes)
            .all(|(entry, episode)| entry.text == episode.summary);
        if !paired {
            warn!("vector index text differs from archive");
            return false;
        }
        let (Some(stored), Some(first)) = (index.entries().first(), self.episodes.first()) else {
            return true;
        };
        let current = match self.embedder.embed(&first.summary).await {
            Ok(current) => current,
            Err(err) => {
                warn!(
                    error = %err,
                    embedder = self.embedder.name(),
                    "embedder unavailable, keeping stored vector index unverified"
                );
                return true;
            }
        };
        if current.len() != stored.embedding.len() {
            warn!(
                stored = stored.embedding.len(),
                current = current.len(),
                embedder = self.embedder.name(),
                "embedding dimension changed"
            );
            return false;
        }
        let same = current
            .iter()
            .zip(&stored.embedding)
            .all(|(a, b)| (a - b).abs() <= EMBEDDING_TOLERANCE);
        if !same {
            warn!(embedder = self.embedder.name(), "embedding backend changed");
        }
        same
    }

    async fn try_rebuild_at_open(&mut self) {
        if let Err(err) = self.rebuild_index().await {
            warn!(
                error = %err,
                episodes = self.episodes.len(),
                "vector index rebuild failed, searches return nothing until it succeeds"
            );
        }
    }

    /// Re-embed every episode.  The new index replaces the old one once all
    /// embeddings succeed; a failed persist afterwards is repaired at the
    /// next open.
    async fn rebuild_index(&mut self) -> Result<()> {
        self.rebuild_pending = true;
        let mut index = VectorIndex::new();
        for episode in &self.episodes {
            let embedding = self
                .embedder
                .embed(&episode.summary)
                .await
                .with_context(|| format!("re-embedding episode {:?}", episode.title))?;
            index.add(embedding, episode.summary.clone(), episode.title.clone())?;
        }
        self.index = index;
        self.rebuild_pending = false;
        self.index.persist(&self.index_path).await?;
        info!(entries = self.index.len(), "vector index rebuilt from archive");
        Ok(())
    }
}
