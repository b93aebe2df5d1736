//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//! - Streaming via SSE with `content_block_delta` events

use async_trait::async_trait;
use kubrick_core::error::ProviderError;
use kubrick_core::message::{Message, Role};
use kubrick_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::http::{check_status, client, network_error};
use crate::sse::{LineEvent, sse_data, spawn_line_stream};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: client(300),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Split the system prompt out and fold the rest into alternating turns.
    ///
    /// Tool results are sent as user turns; adjacent turns with the same role
    /// are merged because the API expects strict alternation.
    fn to_api_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut turns: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            let role = match msg.role {
                Role::System => {
                    system_parts.push(&msg.content);
                    continue;
                }
                Role::Assistant => "assistant",
                Role::User | Role::Tool => "user",
            };
            let content = msg.content_for_chat();
            match turns.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&content);
                }
                _ => turns.push(AnthropicMessage {
                    role: role.into(),
                    content,
                }),
            }
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, turns)
    }

    fn body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let (system, messages) = Self::to_api_messages(&request.messages);
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }
        if !request.stop.is_empty() {
            body["stop_sequences"] = serde_json::json!(request.stop);
        }
        body
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        check_status("anthropic", response).await
    }
}

/// Interpret one SSE line of a Messages stream. Event-name lines are
/// redundant with the `type` field of the data payload.
fn parse_stream_line(line: &str) -> LineEvent {
    let Some(data) = sse_data(line) else {
        return LineEvent::Skip;
    };
    let event: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
            return LineEvent::Skip;
        }
    };

    match event["type"].as_str().unwrap_or("") {
        "content_block_delta" if event["delta"]["type"] == "text_delta" => event["delta"]["text"]
            .as_str()
            .map(|t| LineEvent::Text(t.to_string()))
            .unwrap_or(LineEvent::Skip),
        "message_stop" => LineEvent::Done,
        "error" => {
            let message = event["error"]["message"].as_str().unwrap_or("unknown error");
            LineEvent::Fail(ProviderError::Backend(message.to_string()))
        }
        _ => LineEvent::Skip,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        debug!(provider = "anthropic", model = %request.model, "Sending completion request");
        let response = self.post(&self.body(&request, false)).await?;

        let api_resp: AnthropicResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse Anthropic response: {e}"),
        })?;

        Ok(api_resp
            .content
            .into_iter()
            .filter(|b| b.r#type == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");
        let response = self.post(&self.body(&request, true)).await?;
        Ok(spawn_line_stream(response.bytes_stream(), parse_stream_line))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(network_error)?;
        Ok(response.status().is_success())
    }
}

// --- Anthropic API types (internal) ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_is_extracted_and_turns_alternate() {
        let messages = vec![
            Message::system("You are Kubrick."),
            Message::user("List the files"),
            Message::assistant("```tool_call\n{}\n```"),
            Message::tool_result("list_files", "Result: a.rs"),
            Message::user("Continue with the next step."),
        ];
        let (system, turns) = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(system.as_deref(), Some("You are Kubrick."));
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[2].role, "user");
        assert!(turns[2].content.starts_with("Tool: list_files\nResult: a.rs"));
        assert!(turns[2].content.ends_with("Continue with the next step."));
    }

    #[test]
    fn body_defaults_max_tokens() {
        let provider = AnthropicProvider::new("key", "claude-sonnet-4-5-20250929");
        let request = ProviderRequest::new(provider.model(), vec![Message::user("hi")]);
        let body = provider.body(&request, false);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn parses_stream_events() {
        let delta = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert!(matches!(parse_stream_line(delta), LineEvent::Text(t) if t == "Hi"));
        assert!(matches!(parse_stream_line("event: message_stop"), LineEvent::Skip));
        assert!(matches!(parse_stream_line(r#"data: {"type":"message_stop"}"#), LineEvent::Done));
        assert!(matches!(parse_stream_line(r#"data: {"type":"ping"}"#), LineEvent::Skip));

        let err = r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(matches!(parse_stream_line(err), LineEvent::Fail(ProviderError::Backend(m)) if m == "Overloaded"));
    }
}
