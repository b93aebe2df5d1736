//! Provider trait: the abstraction over text-generation backends.
//!
//! A Provider takes an ordered message history and produces either one final
//! string or a stream of text fragments. The loop never knows which backend
//! it is talking to.
//!
//! Implementations: OpenAI-compatible, Anthropic, Triton.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// Receiving half of a streamed response.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "triton", "anthropic").
    fn name(&self) -> &str;

    /// The model this provider sends requests to by default.
    fn model(&self) -> &str;

    /// Send a request and get the complete response text.
    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a single chunk.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let content = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::text(content))).await;
        let _ = tx.send(Ok(StreamChunk::done())).await;
        Ok(rx)
    }

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Drain a chunk stream into a single string.
pub async fn collect_stream(mut rx: ChunkReceiver) -> Result<String, ProviderError> {
    let mut text = String::new();
    while let Some(chunk) = rx.recv().await {
        let chunk = chunk?;
        if let Some(content) = chunk.content {
            text.push_str(&content);
        }
        if chunk.done {
            break;
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str { "fixed" }
        fn model(&self) -> &str { "fixed-model" }
        async fn complete(&self, _request: ProviderRequest) -> Result<String, ProviderError> {
            Ok("hello there".into())
        }
    }

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());

        let req = req.with_temperature(0.2).with_max_tokens(512);
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, Some(512));
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let rx = FixedProvider
            .stream(ProviderRequest::new("fixed-model", vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(collect_stream(rx).await.unwrap(), "hello there");
    }

    #[tokio::test]
    async fn collect_stream_propagates_errors() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(StreamChunk::text("partial"))).await.unwrap();
        tx.send(Err(ProviderError::StreamInterrupted("reset".into()))).await.unwrap();
        drop(tx);
        assert!(matches!(
            collect_stream(rx).await,
            Err(ProviderError::StreamInterrupted(_))
        ));
    }
}
