//! Text-completion and embedding capabilities.
//!
//! The rest of the workspace only sees the [`Completion`] and [`Embedder`]
//! traits; the concrete HTTP clients live here.

pub mod embed;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub use embed::{CachedEmbedder, Embedder, HashingEmbedder, OllamaEmbedder};

/// Opaque text-completion capability: prompt in, generated text out.
///
/// Every transport, status or decoding problem is an `Err`; implementations
/// never smuggle error text back as a successful reply.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Sampling parameters forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 1.1,
            top_p: 0.95,
            max_tokens: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenRouter,
}

impl Provider {
    /// `openrouter` (any case) selects OpenRouter; everything else is Ollama.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("openrouter") {
            Self::OpenRouter
        } else {
            Self::Ollama
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl OpenRouterClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Shared HTTP client with the request timeout applied to every call.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

#[derive(Debug, Clone)]
pub struct LlmRouter {
    ollama: OllamaClient,
    openrouter: OpenRouterClient,
}

impl LlmRouter {
    pub fn new(ollama_base_url: &str, timeout: Duration) -> Result<Self> {
        let client = http_client(timeout)?;
        Ok(Self {
            ollama: OllamaClient::new(client.clone(), ollama_base_url),
            openrouter: OpenRouterClient::new(client),
        })
    }

    pub async fn chat(
        &self,
        primary: Provider,
        ollama_model: &str,
        openrouter_model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<(Provider, String)> {
        match primary {
            Provider::Ollama => Ok((
                Provider::Ollama,
                self.ollama.chat_model(ollama_model, prompt, options).await?,
            )),
            Provider::OpenRouter => Ok((
                Provider::OpenRouter,
                self.openrouter
                    .chat_model(openrouter_model, prompt, options)
                    .await?,
            )),
        }
    }
}

/// A router bound to one provider, model pair and set of sampling options.
#[derive(Debug, Clone)]
pub struct RoutedModel {
    pub router: LlmRouter,
    pub primary: Provider,
    pub ollama_model: String,
    pub openrouter_model: String,
    pub options: GenerationOptions,
}

#[async_trait]
impl Completion for RoutedModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let (provider, reply) = self
            .router
            .chat(
                self.primary,
                &self.ollama_model,
                &self.openrouter_model,
                prompt,
                &self.options,
            )
            .await?;
        debug!(?provider, reply_len = reply.len(), "completion received");
        Ok(reply)
    }
}

fn ollama_payload(model: &str, prompt: &str, options: &GenerationOptions) -> serde_json::Value {
    json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": {
            "temperature": options.temperature,
            "top_p": options.top_p,
            "num_predict": options.max_tokens,
        }
    })
}

fn openrouter_payload(model: &str, prompt: &str, options: &GenerationOptions) -> serde_json::Value {
    json!({
        "model": model,
        "messages": [
            {"role": "user", "content": prompt}
        ],
        "temperature": options.temperature,
        "top_p": options.top_p,
        "max_tokens": options.max_tokens,
    })
}

fn openrouter_content(body: &serde_json::Value) -> Option<&str> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
}

impl OllamaClient {
    async fn chat_model(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let payload = ollama_payload(model, prompt, options);

        let response = match self.client.post(endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(error) => bail!(
                "Ollama unavailable at {}. Start Ollama and ensure model '{model}' is installed. Error: {error}",
                self.base_url
            ),
        };

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("Ollama error ({status}): {body}");
        }

        match body.get("response").and_then(|value| value.as_str()) {
            Some(content) => Ok(content.to_string()),
            None => bail!("Ollama response missing text: {body}"),
        }
    }
}

impl OpenRouterClient {
    async fn chat_model(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            bail!("OpenRouter key missing. Set OPENROUTER_API_KEY or switch llm.provider to ollama.");
        }

        let response = self
            .client
            .post("https://openrouter.ai/api/v1/chat/completions")
            .bearer_auth(api_key)
            .header("HTTP-Referer", "https://kabo.local")
            .header("X-Title", "Kabo")
            .json(&openrouter_payload(model, prompt, options))
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("OpenRouter error ({status}): {body}");
        }

        match openrouter_content(&body) {
            Some(content) => Ok(content.to_string()),
            None => bail!("OpenRouter response missing text: {body}"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_label() {
        assert_eq!(Provider::from_label("openrouter"), Provider::OpenRouter);
        assert_eq!(Provider::from_label(" OpenRouter "), Provider::OpenRouter);
        assert_eq!(Provider::from_label("ollama"), Provider::Ollama);
        assert_eq!(Provider::from_label("anything-else"), Provider::Ollama);
    }

    #[test]
    fn provider_serde_roundtrip() {
        for provider in [Provider::Ollama, Provider::OpenRouter] {
            let json = serde_json::to_string(&provider).unwrap();
            let back: Provider = serde_json::from_str(&json).unwrap();
            assert_eq!(back, provider);
        }
    }

    #[test]
    fn ollama_payload_carries_sampling_options() {
        let options = GenerationOptions {
            temperature: 0.5,
            top_p: 0.9,
            max_tokens: 42,
        };
        let payload = ollama_payload("nous-hermes2", "hi", &options);
        assert_eq!(payload["model"], "nous-hermes2");
        assert_eq!(payload["prompt"], "hi");
        assert_eq!(payload["stream"], false);
        assert_eq!(payload["options"]["num_predict"], 42);
        assert!((payload["options"]["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn openrouter_payload_wraps_prompt_as_user_message() {
        let payload = openrouter_payload("m", "hello", &GenerationOptions::default());
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"], "hello");
        assert_eq!(payload["max_tokens"], 100);
    }

    #[test]
    fn openrouter_content_extraction() {
        let body = json!({"choices": [{"message": {"content": "hey there"}}]});
        assert_eq!(openrouter_content(&body), Some("hey there"));
        assert_eq!(openrouter_content(&json!({"choices": []})), None);
        assert_eq!(openrouter_content(&json!({})), None);
    }

    #[test]
    fn default_generation_options() {
        let options = GenerationOptions::default();
        assert_eq!(options.max_tokens, 100);
        assert!((options.top_p - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn http_client_builds_with_timeout() {
        assert!(http_client(Duration::from_secs(5)).is_ok());
        assert!(LlmRouter::new("http://localhost:11434", Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn unreachable_ollama_is_an_error() {
        // Port 9 (discard) on localhost is not an Ollama server.
        let router = LlmRouter::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let result = router
            .chat(Provider::Ollama, "m", "m", "hi", &GenerationOptions::default())
            .await;
        assert!(result.is_err());
    }
}
