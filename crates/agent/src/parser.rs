//! Tool call extraction from free-form model output.
//!
//! Models are taught to emit calls as fenced blocks:
//!
//! ````text
//! ```tool_call
//! {"tool": "read_file", "parameters": {"file_path": "src/main.rs"}}
//! ```
//! ````
//!
//! A block whose JSON is malformed yields a [`ToolCallParseError`] and the
//! remaining blocks still parse. When a response contains no fenced block at
//! all, bare `{"tool": ..., "parameters": ...}` objects are accepted as a
//! fallback and flagged on the resulting [`ToolCall`].

use kubrick_core::tool::ToolCall;
use serde_json::Value;
use tracing::{debug, warn};

const OPEN_FENCE: &str = "```tool_call";
const CLOSE_FENCE: &str = "```";

/// A fenced block that could not be turned into a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ToolCallParseError {
    /// The block as it appeared in the response
    pub raw_text: String,
    pub message: String,
}

/// Everything extracted from one assistant turn.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    /// Calls in textual order
    pub calls: Vec<ToolCall>,
    pub errors: Vec<ToolCallParseError>,
    /// The response with call blocks removed, for display
    pub prose: String,
    /// True when calls were recovered from unfenced JSON
    pub used_fallback: bool,
}

impl ParsedResponse {
    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

/// Extract tool calls from a model response.
pub fn parse(text: &str) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();
    let mut prose = String::new();
    let mut cursor = 0;
    let mut fenced_blocks = 0;

    while let Some(start) = find_open_fence(text, cursor) {
        fenced_blocks += 1;
        prose.push_str(&text[cursor..start]);

        let body_start = start + OPEN_FENCE.len();
        let block = parse_fenced_block(text, start, body_start);
        match block.result {
            Ok(call) => parsed.calls.push(call),
            Err(error) => {
                warn!(error = %error.message, "Malformed tool_call block");
                parsed.errors.push(error);
            }
        }
        cursor = block.end;
    }
    prose.push_str(&text[cursor..]);

    if fenced_blocks == 0 {
        let (calls, remaining) = parse_bare_objects(text);
        if !calls.is_empty() {
            warn!(count = calls.len(), "Tool call found without a ```tool_call fence");
            parsed.used_fallback = true;
            parsed.calls = calls;
            prose = remaining;
        }
    }

    debug!(
        calls = parsed.calls.len(),
        errors = parsed.errors.len(),
        fallback = parsed.used_fallback,
        "Parsed model response"
    );
    parsed.prose = prose.trim().to_string();
    parsed
}

/// Position of the next opening fence at or after `from`. The tag must end
/// the token, so ```` ```tool_calls ```` is not an opener.
fn find_open_fence(text: &str, from: usize) -> Option<usize> {
    let mut offset = from;
    while let Some(pos) = text[offset..].find(OPEN_FENCE) {
        let start = offset + pos;
        let after = start + OPEN_FENCE.len();
        match text[after..].chars().next() {
            None => return Some(start),
            Some(c) if c.is_whitespace() => return Some(start),
            Some(_) => offset = after,
        }
    }
    None
}

struct FencedBlock {
    result: Result<ToolCall, ToolCallParseError>,
    /// Byte offset just past the block
    end: usize,
}

fn parse_fenced_block(text: &str, start: usize, body_start: usize) -> FencedBlock {
    let closings: Vec<usize> = text[body_start..]
        .match_indices(CLOSE_FENCE)
        .map(|(i, _)| body_start + i)
        .collect();

    let Some(&first_close) = closings.first() else {
        return FencedBlock {
            result: Err(ToolCallParseError {
                raw_text: text[start..].to_string(),
                message: "tool_call block is missing its closing fence".into(),
            }),
            end: text.len(),
        };
    };

    // A closing fence inside a JSON string ends the block too early, so later
    // fences get a chance before the block is reported as malformed.
    let mut first_error = None;
    for &close in &closings {
        let end = close + CLOSE_FENCE.len();
        let raw_text = &text[start..end];
        match serde_json::from_str::<Value>(text[body_start..close].trim()) {
            Ok(value) => {
                return FencedBlock {
                    result: call_from_value(value, raw_text, false),
                    end,
                };
            }
            Err(e) if first_error.is_none() => first_error = Some(e.to_string()),
            Err(_) => {}
        }
    }

    let end = first_close + CLOSE_FENCE.len();
    FencedBlock {
        result: Err(ToolCallParseError {
            raw_text: text[start..end].to_string(),
            message: format!(
                "invalid JSON in tool_call block: {}",
                first_error.unwrap_or_default()
            ),
        }),
        end,
    }
}

fn call_from_value(value: Value, raw_text: &str, fallback: bool) -> Result<ToolCall, ToolCallParseError> {
    let error = |message: &str| ToolCallParseError {
        raw_text: raw_text.to_string(),
        message: message.to_string(),
    };

    let Value::Object(mut object) = value else {
        return Err(error("tool_call block must contain a JSON object"));
    };
    let name = match object.remove("tool") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        Some(_) => return Err(error("\"tool\" must be a non-empty string")),
        None => return Err(error("tool_call block is missing the \"tool\" field")),
    };
    let parameters = match object.remove("parameters") {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(params @ Value::Object(_)) => params,
        Some(_) => return Err(error("\"parameters\" must be a JSON object")),
    };

    let mut call = ToolCall::new(name, parameters);
    call.raw_text = raw_text.to_string();
    call.fallback = fallback;
    Ok(call)
}

/// Scan for bare JSON objects shaped like tool calls. Returns the calls and
/// the text with those objects removed.
fn parse_bare_objects(text: &str) -> (Vec<ToolCall>, String) {
    let mut calls = Vec::new();
    let mut remaining = String::new();
    let mut copied_to = 0;
    let mut search_from = 0;

    while let Some(pos) = text[search_from..].find('{') {
        let start = search_from + pos;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        let candidate = match stream.next() {
            Some(Ok(value)) if looks_like_call(&value) => Some((value, start + stream.byte_offset())),
            _ => None,
        };

        match candidate {
            Some((value, end)) => {
                if let Ok(call) = call_from_value(value, &text[start..end], true) {
                    calls.push(call);
                    remaining.push_str(&text[copied_to..start]);
                    copied_to = end;
                }
                search_from = end;
            }
            None => search_from = start + 1,
        }
    }
    remaining.push_str(&text[copied_to..]);
    (calls, remaining)
}

fn looks_like_call(value: &Value) -> bool {
    value.get("tool").is_some_and(Value::is_string) && value.get("parameters").is_some_and(Value::is_object)
}
