use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Embedding backend ─────────────────────────────────────────────────────────

/// Which embedding capability feeds the episodic vector index.
///
/// | Backend   | Behaviour                                                      |
/// |-----------|----------------------------------------------------------------|
/// | `hashing` | Local deterministic feature-hashing embedder (no network).     |
/// | `ollama`  | Ollama `/api/embeddings` with `llm.embedding_model`.            |
///
/// Switching backends after episodes exist changes the vector dimension; the
/// index is rebuilt from the archive on the next start when that happens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Hashing,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Speaker label used for assistant turns in the prompt.
    pub name: String,
    /// `local` or an IANA zone name (e.g. `"Europe/Berlin"`).  Drives the
    /// time-of-day, season and weekend fields of the persona state.
    pub timezone: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Kabo-chan".to_string(),
            timezone: "local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub ollama_model: String,
    pub openrouter_model: String,
    /// Base URL for the Ollama API.  Overridden at load time by the
    /// `OLLAMA_BASE_URL` environment variable when set.
    pub ollama_base_url: String,
    pub temperature: f32,
    pub top_p: f32,
    /// Soft reply length.  Sent to Ollama as `num_predict` and stated in the
    /// prompt as a hint; never enforced on the returned text.
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    /// Vector size of the hashing embedder.  Ignored by the Ollama backend,
    /// whose dimension is whatever the model returns.
    pub embedding_dimension: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            ollama_model: "nous-hermes2".to_string(),
            openrouter_model: "openai/gpt-4o-mini".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            temperature: 1.1,
            top_p: 0.95,
            max_tokens: 100,
            request_timeout_secs: 120,
            embedding_backend: EmbeddingBackend::Hashing,
            embedding_model: "all-minilm".to_string(),
            embedding_dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding `conversation.json`, `episodes.json`,
    /// `vector_index.json` and the process lock file.
    pub data_dir: String,
    /// Number of human/assistant turns kept verbatim by a history trim.
    pub summary_limit: usize,
    /// Number of most recent turns summarized into each episode.
    pub episode_window: usize,
    /// Number of archived episodes retrieved as facts per turn.
    pub retrieval_k: usize,
    /// Run the history trim after every successful turn.  Off by default so
    /// the conversation file only shrinks on an explicit `kabo memory trim`.
    pub auto_trim: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: ".kabo/memory".to_string(),
            summary_limit: 20,
            episode_window: 10,
            retrieval_k: 3,
            auto_trim: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// When non-empty, logs are written to a daily rolling file with this
    /// path prefix instead of stderr.
    pub log_file: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub persona: PersonaConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    /// Like [`AppConfig::load_from`] but resolves environment overrides
    /// through `lookup`, so callers can supply a fixed environment.
    pub fn load_with_env<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Some(value) = lookup("OLLAMA_BASE_URL").filter(|v| !v.is_empty()) {
            config.llm.provider = "ollama".to_string();
            config.llm.ollama_base_url = value;
        }

        if let Some(dir) = lookup("KABO_DATA_DIR").filter(|v| !v.is_empty()) {
            config.memory.data_dir = dir;
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn active_model(&self) -> &str {
        if self.llm.provider.eq_ignore_ascii_case("openrouter") {
            &self.llm.openrouter_model
        } else {
            &self.llm.ollama_model
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.memory.data_dir)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_match_persona_engine_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.persona.name, "Kabo-chan");
        assert_eq!(cfg.persona.timezone, "local");
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.llm.max_tokens, 100);
        assert!((cfg.llm.temperature - 1.1).abs() < f32::EPSILON);
        assert_eq!(cfg.llm.embedding_backend, EmbeddingBackend::Hashing);
        assert_eq!(cfg.llm.embedding_dimension, 384);
        assert_eq!(cfg.memory.summary_limit, 20);
        assert_eq!(cfg.memory.episode_window, 10);
        assert_eq!(cfg.memory.retrieval_k, 3);
        assert!(!cfg.memory.auto_trim, "history trim must stay opt-in");
        assert_eq!(cfg.telemetry.log_level, "info");
        assert!(cfg.telemetry.log_file.is_empty());
    }

    // ── load_from ──────────────────────────────────────────────────────────

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_with_env(dir.path().join("nonexistent.toml"), no_env).unwrap();
        assert_eq!(cfg.persona.name, "Kabo-chan");
        assert_eq!(cfg.memory.data_dir, ".kabo/memory");
    }

    #[test]
    fn load_from_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.toml");
        fs::write(
            &path,
            r#"
[persona]
name = "Kabo"
timezone = "Asia/Tokyo"

[llm]
provider = "openrouter"
openrouter_model = "anthropic/claude-3.5-sonnet"
max_tokens = 80
embedding_backend = "ollama"

[memory]
data_dir = "/tmp/kabo"
auto_trim = true
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_with_env(&path, no_env).unwrap();
        assert_eq!(cfg.persona.name, "Kabo");
        assert_eq!(cfg.persona.timezone, "Asia/Tokyo");
        assert_eq!(cfg.llm.provider, "openrouter");
        assert_eq!(cfg.active_model(), "anthropic/claude-3.5-sonnet");
        assert_eq!(cfg.llm.max_tokens, 80);
        assert_eq!(cfg.llm.embedding_backend, EmbeddingBackend::Ollama);
        assert_eq!(cfg.data_dir(), PathBuf::from("/tmp/kabo"));
        assert!(cfg.memory.auto_trim);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.memory.retrieval_k, 3);
        assert_eq!(cfg.telemetry.log_level, "info");
    }

    #[test]
    fn load_from_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(AppConfig::load_with_env(&path, no_env).is_err());
    }

    // ── save_to + roundtrip ────────────────────────────────────────────────

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/config.toml");

        let mut cfg = AppConfig::default();
        cfg.persona.name = "RoundTrip".to_string();
        cfg.llm.embedding_backend = EmbeddingBackend::Ollama;
        cfg.memory.summary_limit = 8;
        cfg.telemetry.log_file = "logs/kabo.log".to_string();

        cfg.save_to(&path).unwrap();
        assert!(path.exists());

        let loaded = AppConfig::load_with_env(&path, no_env).unwrap();
        assert_eq!(loaded.persona.name, "RoundTrip");
        assert_eq!(loaded.llm.embedding_backend, EmbeddingBackend::Ollama);
        assert_eq!(loaded.memory.summary_limit, 8);
        assert_eq!(loaded.telemetry.log_file, "logs/kabo.log");
    }

    // ── active_model ───────────────────────────────────────────────────────

    #[test]
    fn active_model_follows_provider_case_insensitively() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.active_model(), "nous-hermes2");
        cfg.llm.provider = "OpenRouter".to_string();
        assert_eq!(cfg.active_model(), "openai/gpt-4o-mini");
    }

    // ── Env overrides ──────────────────────────────────────────────────────

    #[test]
    fn env_ollama_base_url_forces_ollama_provider() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        fs::write(&path, "[llm]\nprovider = \"openrouter\"\n").unwrap();

        let env = HashMap::from([("OLLAMA_BASE_URL", "http://custom:11434")]);
        let cfg =
            AppConfig::load_with_env(&path, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.llm.ollama_base_url, "http://custom:11434");
    }

    #[test]
    fn env_data_dir_overrides_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dir.toml");
        fs::write(&path, "[memory]\ndata_dir = \"from-file\"\n").unwrap();

        let env = HashMap::from([("KABO_DATA_DIR", "from-env"), ("OLLAMA_BASE_URL", "")]);
        let cfg =
            AppConfig::load_with_env(&path, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.memory.data_dir, "from-env");
        // Empty values are ignored.
        assert_eq!(cfg.llm.ollama_base_url, "http://localhost:11434");
    }

    #[test]
    fn embedding_backend_serde_labels() {
        for (backend, label) in [
            (EmbeddingBackend::Hashing, "\"hashing\""),
            (EmbeddingBackend::Ollama, "\"ollama\""),
        ] {
            let json = serde_json::to_string(&backend).unwrap();
            assert_eq!(json, label);
            let back: EmbeddingBackend = serde_json::from_str(&json).unwrap();
            assert_eq!(back, backend);
        }
    }
}
