//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledEmbeddings`]** — returns errors; used when embeddings are
//!   not configured.
//! - **[`OpenRouterEmbeddings`]** — calls the OpenRouter embeddings API.
//! - **[`OllamaEmbeddings`]** — calls a local Ollama instance's
//!   `/api/embed` endpoint.
//!
//! Providers are pure I/O boundaries: one HTTP round-trip per batch, a
//! generous configurable timeout, and **no automatic retry** — a timeout or
//! transport failure surfaces as a typed [`Error`] for the caller to handle.
//!
//! # Contract
//!
//! An empty input batch returns an empty output immediately, with no
//! network call. A non-empty batch must yield one vector per text; the
//! alignment check happens at the call site that persists the batch.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// An external service that turns texts into fixed-length float vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier stored alongside each vector (e.g.
    /// `"google/gemini-embedding-001"`).
    fn model_name(&self) -> &str;

    /// Declared vector dimensionality from configuration, when known.
    /// Callers cross-check it against what the provider actually returns.
    fn dims(&self) -> Option<usize> {
        None
    }

    /// Generate one embedding per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Convenience wrapper for embedding a single query string.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let mut vectors = provider.embed(&[text.to_string()]).await?;
    if vectors.is_empty() {
        return Err(Error::BatchMismatch {
            expected: 1,
            got: 0,
        });
    }
    Ok(vectors.remove(0))
}

/// Create the provider named by the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbeddings)),
        "openrouter" => Ok(Box::new(OpenRouterEmbeddings::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbeddings::new(config)?)),
        other => Err(Error::Config(format!(
            "Unknown embedding provider: {other}"
        ))),
    }
}

// ============ Disabled ============

/// A no-op provider that always errors. Lets retrieval-free setups run
/// without credentials.
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Err(Error::ProviderDisabled("embedding"))
    }
}

// ============ OpenRouter ============

const OPENROUTER_EMBEDDINGS_URL: &str = "https://openrouter.ai/api/v1/embeddings";

/// Embedding provider backed by the OpenRouter embeddings API.
///
/// Requires the `OPENROUTER_API_KEY` environment variable.
pub struct OpenRouterEmbeddings {
    model: String,
    dims: Option<usize>,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenRouterEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Config("embedding.model required for OpenRouter".into()))?;
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| Error::Config("OPENROUTER_API_KEY environment variable not set".into()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENROUTER_EMBEDDINGS_URL.to_string());

        Ok(Self {
            model,
            dims: config.dims,
            url,
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenRouterEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "OpenRouter".to_string(),
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_style_response(&json)
    }
}

/// Extract `data[].embedding` arrays from an OpenAI-shaped response.
fn parse_openai_style_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Provider {
            provider: "OpenRouter".to_string(),
            status: 200,
            body: "missing data array in embeddings response".to_string(),
        })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Provider {
                provider: "OpenRouter".to_string(),
                status: 200,
                body: "missing embedding in response item".to_string(),
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Ollama ============

/// Embedding provider backed by a local Ollama instance.
pub struct OllamaEmbeddings {
    model: String,
    dims: Option<usize>,
    url: String,
    timeout: Duration,
}

impl OllamaEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Config("embedding.model required for Ollama".into()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims: config.dims,
            url,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = client
            .post(format!("{}/api/embed", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "Ollama".to_string(),
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: serde_json::Value = response.json().await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::Provider {
            provider: "Ollama".to_string(),
            status: 200,
            body: "missing embeddings array in response".to_string(),
        })?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| Error::Provider {
                provider: "Ollama".to_string(),
                status: 200,
                body: "embedding is not an array".to_string(),
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}
