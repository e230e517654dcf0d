//! Embedding capability: text in, fixed-length vector out.

use std::num::NonZeroUsize;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use lru::LruCache;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::http_client;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Short backend label for logs.
    fn name(&self) -> &str;
}

// ── Hashing embedder ──────────────────────────────────────────────────────────

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token regex is valid"));

/// Weight of a word bigram relative to a single word.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic bag-of-words embedder.
///
/// Each lowercase word (and each adjacent word pair, at half weight) is
/// hashed with SHA-256 into one of `dimension` buckets with a hash-derived
/// sign.  The result is L2-normalised, so cosine similarity reflects shared
/// vocabulary.  Text without any word yields the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = TOKEN_RE.find_iter(&lower).map(|m| m.as_str()).collect();

        let mut vector = vec![0.0_f32; self.dimension];
        for word in &words {
            self.accumulate(&mut vector, word, 1.0);
        }
        for pair in words.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

// ── Ollama embedder ───────────────────────────────────────────────────────────

/// Calls the Ollama `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "prompt": text });
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        let json: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("Ollama embedding error ({status}): {json}");
        }

        let embedding = json["embedding"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect::<Vec<f32>>()
            })
            .unwrap_or_default();
        if embedding.is_empty() {
            bail!("Ollama returned no embedding for model '{}'", self.model);
        }
        Ok(embedding)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ── LRU cache ─────────────────────────────────────────────────────────────────

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Memoises another embedder.  Repeated queries and re-embedded archive
/// summaries skip the backend entirely.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cached(&self, text: &str) -> Option<Vec<f32>> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(text).cloned()
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cached(text) {
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .put(text.to_string(), vector.clone());
        Ok(vector)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hashing_is_deterministic_and_sized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_sync("We talked about music and bass lines");
        let b = embedder.embed_sync("We talked about music and bass lines");
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn hashing_output_is_unit_length() {
        let v = HashingEmbedder::new(384).embed_sync("tea rituals and handmade gifts");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn hashing_is_case_insensitive() {
        let embedder = HashingEmbedder::new(128);
        assert_eq!(embedder.embed_sync("Dream Journal"), embedder.embed_sync("dream journal"));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(16).embed_sync("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.embed_sync("favourite music");
        let related = embedder.embed_sync("The user told me about their favourite music band");
        let unrelated = embedder.embed_sync("A long day at the office with spreadsheets");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn cache_skips_backend_on_repeat() {
        let cached = CachedEmbedder::new(CountingEmbedder { calls: AtomicUsize::new(0) });
        assert_eq!(cached.embed("abc").await.unwrap(), vec![3.0]);
        assert_eq!(cached.embed("abc").await.unwrap(), vec![3.0]);
        assert_eq!(cached.embed("abcd").await.unwrap(), vec![4.0]);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.name(), "counting");
    }

    #[tokio::test]
    async fn cache_evicts_least_recently_used() {
        let cached =
            CachedEmbedder::with_capacity(CountingEmbedder { calls: AtomicUsize::new(0) }, 1);
        cached.embed("a").await.unwrap();
        cached.embed("bb").await.unwrap();
        cached.embed("a").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 3);
    }
}
