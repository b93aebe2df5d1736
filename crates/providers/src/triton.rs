//! Triton Inference Server provider.
//!
//! Talks to a decoupled model through the `generate_stream` extension:
//! the whole message list is JSON-encoded into `text_input`, and every
//! `data:` line carries a `text_output` (or `outputs[0].data[0]`) string.
//! That string is either plain text or a JSON envelope
//! `{"type": "chunk" | "complete" | "error", "content": ...}`.

use async_trait::async_trait;
use kubrick_core::error::ProviderError;
use kubrick_core::message::{Message, Role};
use kubrick_core::provider::{ChunkReceiver, Provider, ProviderRequest, collect_stream};
use tracing::{debug, trace};

use crate::http::{check_status, client, network_error};
use crate::sse::{LineEvent, sse_data, spawn_line_stream};

pub const DEFAULT_URL: &str = "http://localhost:8000";

pub struct TritonProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl TritonProvider {
    /// `url` may omit the scheme (`localhost:8000`); plain HTTP is assumed.
    pub fn new(url: &str, model: impl Into<String>) -> Self {
        let url = url.trim_end_matches('/');
        let base_url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{url}")
        };
        Self {
            base_url,
            model: model.into(),
            client: client(600),
        }
    }

    fn payload(request: &ProviderRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Tool => "user",
                    other => other.as_str(),
                };
                serde_json::json!({"role": role, "content": m.content_for_chat()})
            })
            .collect();

        let mut parameters = serde_json::json!({
            "streaming": true,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            parameters["max_tokens"] = serde_json::json!(max_tokens);
        }

        serde_json::json!({
            "text_input": serde_json::Value::Array(messages).to_string(),
            "parameters": parameters,
        })
    }
}

/// Interpret one line of a `generate_stream` response.
fn parse_stream_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }
    let data = sse_data(line).unwrap_or(line);
    if data == "[DONE]" {
        return LineEvent::Done;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
        trace!(data = %data, "Ignoring non-JSON Triton line");
        return LineEvent::Skip;
    };

    let output = value["text_output"]
        .as_str()
        .or_else(|| value["outputs"][0]["data"][0].as_str());
    let Some(output) = output.filter(|o| !o.is_empty()) else {
        return LineEvent::Skip;
    };

    match serde_json::from_str::<serde_json::Value>(output) {
        Ok(envelope) if envelope.is_object() => match envelope["type"].as_str() {
            Some("chunk") => LineEvent::Text(envelope["content"].as_str().unwrap_or_default().to_string()),
            Some("complete") => LineEvent::Done,
            Some("error") => LineEvent::Fail(ProviderError::Backend(
                envelope["content"].as_str().unwrap_or("unknown error").to_string(),
            )),
            _ => LineEvent::Skip,
        },
        // Plain text output (including bare JSON scalars)
        _ => LineEvent::Text(output.to_string()),
    }
}

#[async_trait]
impl Provider for TritonProvider {
    fn name(&self) -> &str {
        "triton"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        let rx = self.stream(request).await?;
        collect_stream(rx).await
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/v2/models/{}/generate_stream", self.base_url, request.model);
        debug!(provider = "triton", model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&Self::payload(&request))
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status("triton", response).await?;

        Ok(spawn_line_stream(response.bytes_stream(), parse_stream_line))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v2/health/live", self.base_url))
            .send()
            .await
            .map_err(network_error)?;
        Ok(response.status().as_u16() == 200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_scheme_is_added() {
        assert_eq!(TritonProvider::new("localhost:8000", "m").base_url, "http://localhost:8000");
        assert_eq!(
            TritonProvider::new("https://triton.internal/", "m").base_url,
            "https://triton.internal"
        );
    }

    #[test]
    fn payload_encodes_messages_as_json_text() {
        let request = ProviderRequest::new(
            "llm_decoupled",
            vec![Message::system("sys"), Message::tool_result("read_file", "Result: x")],
        )
        .with_temperature(0.3);
        let payload = TritonProvider::payload(&request);

        let decoded: serde_json::Value =
            serde_json::from_str(payload["text_input"].as_str().unwrap()).unwrap();
        assert_eq!(decoded[0]["role"], "system");
        assert_eq!(decoded[1]["role"], "user");
        assert_eq!(decoded[1]["content"], "Tool: read_file\nResult: x");
        assert_eq!(payload["parameters"]["streaming"], true);
    }

    #[test]
    fn parses_envelope_chunks() {
        let chunk = r#"data: {"text_output": "{\"type\": \"chunk\", \"content\": \"Hello\"}"}"#;
        assert!(matches!(parse_stream_line(chunk), LineEvent::Text(t) if t == "Hello"));

        let done = r#"data: {"text_output": "{\"type\": \"complete\"}"}"#;
        assert!(matches!(parse_stream_line(done), LineEvent::Done));

        let err = r#"data: {"text_output": "{\"type\": \"error\", \"content\": \"OOM\"}"}"#;
        assert!(matches!(parse_stream_line(err), LineEvent::Fail(ProviderError::Backend(m)) if m == "OOM"));
    }

    #[test]
    fn parses_plain_and_tensor_outputs() {
        let plain = r#"data: {"text_output": "just text"}"#;
        assert!(matches!(parse_stream_line(plain), LineEvent::Text(t) if t == "just text"));

        let tensor = r#"{"outputs": [{"data": ["tensor text"]}]}"#;
        assert!(matches!(parse_stream_line(tensor), LineEvent::Text(t) if t == "tensor text"));

        let number = r#"data: {"text_output": "42"}"#;
        assert!(matches!(parse_stream_line(number), LineEvent::Text(t) if t == "42"));

        assert!(matches!(parse_stream_line("data: [DONE]"), LineEvent::Done));
        assert!(matches!(parse_stream_line("garbage"), LineEvent::Skip));
        assert!(matches!(parse_stream_line(""), LineEvent::Skip));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let provider = TritonProvider::new("127.0.0.1:1", "m");
        let result = provider
            .stream(ProviderRequest::new("m", vec![Message::user("hi")]))
            .await;
        assert!(matches!(result, Err(ProviderError::Network(_) | ProviderError::Timeout(_))));
    }
}
