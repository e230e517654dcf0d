//! Core agent runtime: configuration, persona state, memory stores and the
//! completion capability, owned together by one conversation.

mod chat;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use kabo_config::{AppConfig, EmbeddingBackend};
use kabo_llm::{
    CachedEmbedder, Completion, Embedder, GenerationOptions, HashingEmbedder, LlmRouter,
    OllamaEmbedder, Provider, RoutedModel,
};
use kabo_memory::{
    ConversationMemory, EpisodicArchive, MemoryPaths, MemoryStats, TrimOutcome, Turn,
};
use kabo_persona::{PersonaState, resolve_timezone, wall_clock};

pub use chat::{FALLBACK_REPLY, TurnPhase};

pub struct AgentRuntime {
    pub config: AppConfig,
    persona: PersonaState,
    memory: ConversationMemory,
    archive: EpisodicArchive,
    completion: Arc<dyn Completion>,
    rng: StdRng,
    timezone: Option<Tz>,
}

impl AgentRuntime {
    /// Wire the configured LLM provider and embedding backend, then open the
    /// stores under `memory.data_dir`.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let completion: Arc<dyn Completion> = Arc::new(build_completion(&config)?);
        let embedder = build_embedder(&config)?;
        Self::with_components(config, completion, embedder, StdRng::from_entropy()).await
    }

    /// Open the stores with explicit collaborators.  Tests pass scripted
    /// completions and a seeded RNG here.
    pub async fn with_components(
        config: AppConfig,
        completion: Arc<dyn Completion>,
        embedder: Arc<dyn Embedder>,
        rng: StdRng,
    ) -> Result<Self> {
        let paths = MemoryPaths::new(config.data_dir());
        let memory = ConversationMemory::open(&paths.conversation)?;
        let archive = EpisodicArchive::open(&paths.episodes, &paths.vector_index, embedder).await?;
        let timezone = resolve_timezone(&config.persona.timezone);
        let persona = PersonaState::new(&wall_clock(timezone));

        info!(
            data_dir = %paths.root.display(),
            turns = memory.len(),
            episodes = archive.len(),
            model = %config.active_model(),
            "agent runtime ready"
        );

        Ok(Self {
            config,
            persona,
            memory,
            archive,
            completion,
            rng,
            timezone,
        })
    }

    pub fn persona(&self) -> &PersonaState {
        &self.persona
    }

    pub fn history(&self) -> &[Turn] {
        self.memory.turns()
    }

    pub fn archive(&self) -> &EpisodicArchive {
        &self.archive
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats::collect(&self.memory, &self.archive)
    }

    /// Wall-clock time in the configured persona time zone.
    pub fn now(&self) -> NaiveDateTime {
        wall_clock(self.timezone)
    }

    /// Summarize all but the last `threshold` turns into one summary turn.
    pub async fn trim_history(&mut self, threshold: usize) -> Result<TrimOutcome> {
        self.memory
            .trim_and_summarize(threshold, self.completion.as_ref())
            .await
    }

    pub async fn clear_history(&mut self) -> Result<()> {
        self.memory.clear().await
    }

    pub async fn search_episodes(&self, query: &str, k: usize) -> Result<Vec<String>> {
        self.archive.search(query, k).await
    }

    pub async fn test_model_connection(&self) -> Result<String> {
        let prompt = format!(
            "[healthcheck][persona:{}] Reply with a short single-line confirmation.",
            self.config.persona.name
        );
        let reply = self.completion.complete(&prompt).await?;
        Ok(format!(
            "provider={:?} model={} reply={}",
            Provider::from_label(&self.config.llm.provider),
            self.config.active_model(),
            reply.trim()
        ))
    }
}

fn request_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.llm.request_timeout_secs.max(1))
}

pub fn build_completion(config: &AppConfig) -> Result<RoutedModel> {
    Ok(RoutedModel {
        router: LlmRouter::new(&config.llm.ollama_base_url, request_timeout(config))?,
        primary: Provider::from_label(&config.llm.provider),
        ollama_model: config.llm.ollama_model.clone(),
        openrouter_model: config.llm.openrouter_model.clone(),
        options: GenerationOptions {
            temperature: config.llm.temperature,
            top_p: config.llm.top_p,
            max_tokens: config.llm.max_tokens,
        },
    })
}

pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.llm.embedding_backend {
        EmbeddingBackend::Hashing => Arc::new(CachedEmbedder::new(HashingEmbedder::new(
            config.llm.embedding_dimension,
        ))),
        EmbeddingBackend::Ollama => Arc::new(CachedEmbedder::new(OllamaEmbedder::new(
            &config.llm.ollama_base_url,
            config.llm.embedding_model.clone(),
            request_timeout(config),
        )?)),
    };
    Ok(embedder)
}
