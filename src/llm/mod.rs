//! Provider seams for embeddings and text generation, plus the HTTP-backed
//! implementation for Ollama and OpenAI-compatible APIs.

pub mod chat_stream;
pub mod embeddings;
pub mod refine;

use async_trait::async_trait;
use futures_util::stream::Stream;
use std::pin::Pin;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::models::ChatMessage;

/// Forward-only sequence of generated text fragments.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Converts texts into vectors, same order in and out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingUnavailable("No embedding returned".to_string()))
    }
}

/// Generative model behind refinement and chat.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String>;

    async fn stream(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> Result<ChatStream>;
}

/// HTTP client for the configured provider.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl EmbeddingProvider for LlmClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if !self.config.is_configured() {
            return Err(Error::EmbeddingUnavailable("API key not configured".to_string()));
        }
        embeddings::embed_batch(&self.client, &self.config, texts)
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("{e:#}")))
    }
}

#[async_trait]
impl ChatProvider for LlmClient {
    async fn complete(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        if !self.config.is_configured() {
            return Err(Error::Generation("API key not configured".to_string()));
        }
        chat_stream::complete(&self.client, &self.config, messages, max_tokens)
            .await
            .map_err(|e| Error::Generation(format!("{e:#}")))
    }

    async fn stream(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> Result<ChatStream> {
        if !self.config.is_configured() {
            return Err(Error::Generation("API key not configured".to_string()));
        }
        chat_stream::stream_chat(&self.client, &self.config, messages, max_tokens)
            .await
            .map_err(|e| Error::Generation(format!("{e:#}")))
    }
}
