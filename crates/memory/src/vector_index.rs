//! Flat cosine-similarity index over episode summaries.
//!
//! The whole index is one JSON document:
//!
//! ```json
//! {"dimension": 384, "entries": [{"embedding": [...], "text": "...", "metadata": {"title": "..."}}]}
//! ```
//!
//! It is rewritten after every addition.  That costs O(entries) per write,
//! which is fine for a single user with thousands of episodes.  Batching the
//! writes would change what survives a crash, so it is not done here.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::snapshot::write_json_atomic;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding is empty")]
    EmptyVector,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: EntryMetadata,
}

/// A scored search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub score: f32,
    pub entry: &'a VectorEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Fixed by the first entry; `None` while empty.
    dimension: Option<usize>,
    entries: Vec<VectorEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the index at `path`.  `Ok(None)` when the file is missing or its
    /// bytes do not decode as an index; the caller rebuilds in that case.
    /// Only I/O errors are returned.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        match serde_json::from_slice::<Self>(&raw) {
            Ok(index) if index.is_consistent() => Ok(Some(index)),
            Ok(_) => {
                warn!(path = %path.display(), "vector index has mixed dimensions, discarding");
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "vector index unreadable, discarding");
                Ok(None)
            }
        }
    }

    pub async fn persist(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self).await
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn entries(&self) -> &[VectorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(
        &mut self,
        embedding: Vec<f32>,
        text: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<(), IndexError> {
        self.check_dimension(&embedding)?;
        self.dimension = Some(embedding.len());
        self.entries.push(VectorEntry {
            embedding,
            text: text.into(),
            metadata: EntryMetadata { title: title.into() },
        });
        Ok(())
    }

    /// Top `k` entries by cosine similarity, best first.  Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                score: cosine_similarity(&entry.embedding, query),
                entry,
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Whether `vector` could be added or used as a query.
    pub fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.is_empty() {
            return Err(IndexError::EmptyVector);
        }
        match self.dimension {
            Some(expected) if expected != vector.len() => Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    fn is_consistent(&self) -> bool {
        match self.dimension {
            None => self.entries.is_empty(),
            Some(dim) => self.entries.iter().all(|e| e.embedding.len() == dim),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
