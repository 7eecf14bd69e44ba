//! Text-generation provider abstraction.
//!
//! [`CompletionProvider`] is the "generate text from messages" collaborator
//! used for answers, summary folding, and JSON repair. The contract is
//! deliberate: when the transport call succeeds but the provider has no
//! usable content, `complete` returns an **empty string**, never an error —
//! callers decide whether emptiness is fatal for their operation.
//!
//! Like the embedding side, there is no automatic retry.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::error::{Error, Result};
use crate::models::ChatTurn;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for an ordered message list. `model`
    /// overrides the configured default when set (per-chat model
    /// selection). An empty return string means "no usable answer".
    async fn complete(
        &self,
        messages: &[ChatTurn],
        temperature: f64,
        model: Option<&str>,
    ) -> Result<String>;
}

pub fn create_provider(config: &CompletionConfig) -> Result<Box<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledCompletions)),
        "openrouter" => Ok(Box::new(ChatCompletions::openrouter(config)?)),
        "openai" => Ok(Box::new(ChatCompletions::openai(config)?)),
        other => Err(Error::Config(format!(
            "Unknown completion provider: {other}"
        ))),
    }
}

pub struct DisabledCompletions;

#[async_trait]
impl CompletionProvider for DisabledCompletions {
    async fn complete(&self, _: &[ChatTurn], _: f64, _: Option<&str>) -> Result<String> {
        Err(Error::ProviderDisabled("completion"))
    }
}

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat-completions client (OpenRouter or OpenAI; both
/// speak the same wire shape, they differ only in URL and API key).
pub struct ChatCompletions {
    name: &'static str,
    url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl ChatCompletions {
    pub fn openrouter(config: &CompletionConfig) -> Result<Self> {
        Self::new(config, "OpenRouter", OPENROUTER_CHAT_URL, "OPENROUTER_API_KEY")
    }

    pub fn openai(config: &CompletionConfig) -> Result<Self> {
        Self::new(config, "OpenAI", OPENAI_CHAT_URL, "OPENAI_API_KEY")
    }

    fn new(
        config: &CompletionConfig,
        name: &'static str,
        default_url: &str,
        key_var: &str,
    ) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Config(format!("completion.model required for {name}")))?;
        let api_key = std::env::var(key_var)
            .map_err(|_| Error::Config(format!("{key_var} environment variable not set")))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| default_url.to_string());

        Ok(Self {
            name,
            url,
            api_key,
            model,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletions {
    async fn complete(
        &self,
        messages: &[ChatTurn],
        temperature: f64,
        model: Option<&str>,
    ) -> Result<String> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "model": model.unwrap_or(&self.model),
            "messages": messages,
            "temperature": temperature,
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
                provider: self.name.to_string(),
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: serde_json::Value = response.json().await?;

        // Missing or null content is "no usable answer", not a failure.
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or("");

        Ok(content.to_string())
    }
}
