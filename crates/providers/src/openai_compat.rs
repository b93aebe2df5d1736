//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI and any other
//! endpoint exposing `/chat/completions`, both non-streaming and SSE.

use async_trait::async_trait;
use kubrick_core::error::ProviderError;
use kubrick_core::message::{Message, Role};
use kubrick_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::http::{check_status, client, network_error};
use crate::sse::{LineEvent, sse_data, spawn_line_stream};

/// An OpenAI-compatible chat provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: client(120),
        }
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        // Ollama ignores the key
        Self::new("ollama", base_url.unwrap_or("http://localhost:11434/v1"), "ollama", model)
    }

    /// Tool results travel as user messages prefixed with the tool name.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::Tool => "user".into(),
                    other => other.as_str().into(),
                },
                content: m.content_for_chat(),
            })
            .collect()
    }

    fn body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }
        body
    }

    async fn post(&self, body: &serde_json::Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            req = req.header("Accept", "text/event-stream");
        }
        let response = req.json(body).send().await.map_err(network_error)?;
        check_status(&self.name, response).await
    }
}

/// Interpret one SSE line of a chat-completions stream.
fn parse_stream_line(line: &str) -> LineEvent {
    let Some(data) = sse_data(line) else {
        return LineEvent::Skip;
    };
    if data == "[DONE]" {
        return LineEvent::Done;
    }
    match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .map(LineEvent::Text)
            .unwrap_or(LineEvent::Skip),
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            LineEvent::Skip
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let response = self.post(&self.body(&request, false), false).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");
        let response = self.post(&self.body(&request, true), true).await?;
        Ok(spawn_line_stream(response.bytes_stream(), parse_stream_line))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(network_error)?;
        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_messages_become_user_messages() {
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::tool_result("read_file", "Result: ok"),
        ];
        let api = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[2].role, "user");
        assert_eq!(api[2].content, "Tool: read_file\nResult: ok");
    }

    #[test]
    fn request_body_includes_limits() {
        let provider = OpenAiCompatProvider::openai("sk-test", "gpt-4o");
        let request = ProviderRequest::new("gpt-4o", vec![Message::user("hi")]).with_max_tokens(100);
        let body = provider.body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 100);
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn parses_stream_lines() {
        let delta = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert!(matches!(parse_stream_line(delta), LineEvent::Text(t) if t == "Hel"));
        assert!(matches!(parse_stream_line("data: [DONE]"), LineEvent::Done));
        assert!(matches!(parse_stream_line(": keep-alive"), LineEvent::Skip));
        assert!(matches!(parse_stream_line(r#"data: {"choices":[]}"#), LineEvent::Skip));
        assert!(matches!(parse_stream_line("data: not json"), LineEvent::Skip));
    }

    #[test]
    fn provider_metadata() {
        let provider = OpenAiCompatProvider::ollama(None, "llama3");
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "llama3");
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
    }
}
