//! Shared test doubles for the agent crate.

use async_trait::async_trait;
use kubrick_core::error::{ProviderError, ToolError};
use kubrick_core::provider::{Provider, ProviderRequest};
use kubrick_core::tool::{Action, ActionKind, Tool, ToolResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A provider that replays a script of responses, one per call.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new<'a>(responses: impl IntoIterator<Item = &'a str>) -> Self {
        Self::from_results(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn from_results(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Backend("script exhausted".into())))
    }
}

/// Fenced call block in the wire format models are taught.
pub fn call_block(tool: &str, parameters: serde_json::Value) -> String {
    format!(
        "```tool_call\n{}\n```",
        serde_json::json!({"tool": tool, "parameters": parameters})
    )
}

/// Records start/end order and peak concurrency of the calls it runs.
#[derive(Default)]
pub struct Probe {
    pub log: Mutex<Vec<String>>,
    running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl Probe {
    fn enter(&self, label: &str) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("start:{label}"));
    }

    fn leave(&self, label: &str) {
        self.log.lock().unwrap().push(format!("end:{label}"));
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

/// A tool with configurable read-only status, latency and side effect.
pub struct ProbeTool {
    pub name: &'static str,
    pub read_only: bool,
    pub delay: Duration,
    pub action: Option<ActionKind>,
    pub probe: std::sync::Arc<Probe>,
}

impl ProbeTool {
    pub fn reader(name: &'static str, delay_ms: u64, probe: std::sync::Arc<Probe>) -> Self {
        Self {
            name,
            read_only: true,
            delay: Duration::from_millis(delay_ms),
            action: None,
            probe,
        }
    }

    pub fn writer(name: &'static str, delay_ms: u64, probe: std::sync::Arc<Probe>) -> Self {
        Self {
            name,
            read_only: false,
            delay: Duration::from_millis(delay_ms),
            action: None,
            probe,
        }
    }
}

#[async_trait]
impl Tool for ProbeTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Test tool"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"label": {"type": "string"}}})
    }

    fn is_read_only(&self, _arguments: &serde_json::Value) -> bool {
        self.read_only
    }

    fn action(&self, arguments: &serde_json::Value) -> Option<Action> {
        self.action
            .map(|kind| Action::new(kind, arguments["label"].as_str().unwrap_or_default()))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let label = arguments["label"].as_str().unwrap_or(self.name).to_string();
        if label == "panic" {
            panic!("probe asked to panic");
        }
        self.probe.enter(&label);
        tokio::time::sleep(self.delay).await;
        self.probe.leave(&label);
        if label == "fail" {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.into(),
                reason: "asked to fail".into(),
            });
        }
        Ok(ToolResult::success(format!("done {label}")))
    }
}
