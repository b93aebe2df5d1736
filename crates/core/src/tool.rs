//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act on the workspace:
//! read and write files, search the tree, run commands.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use crate::error::ToolError;

/// A request to execute a tool, extracted from model output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub parameters: serde_json::Value,

    /// The exact text the call was parsed from
    #[serde(default)]
    pub raw_text: String,

    /// True when the call was recovered from a bare JSON object rather than
    /// a fenced block
    #[serde(default)]
    pub fallback: bool,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            parameters,
            raw_text: String::new(),
            fallback: false,
        }
    }

    /// Stable identity of the call's intent, used for progress tracking.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.name, self.parameters)
    }

    /// Render the call back into the fenced wire format models are taught.
    pub fn to_block(&self) -> String {
        let body = serde_json::json!({
            "tool": self.name,
            "parameters": self.parameters,
        });
        let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
        format!("```tool_call\n{pretty}\n```")
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    #[serde(default)]
    pub call_id: String,

    /// Which tool produced it
    #[serde(default)]
    pub tool_name: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Failure description, present when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock execution time
    #[serde(default)]
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            tool_name: String::new(),
            success: true,
            output: output.into(),
            error: None,
            duration_ms: 0,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            tool_name: String::new(),
            success: false,
            output: String::new(),
            error: Some(error.into()),
            duration_ms: 0,
        }
    }

    /// Attach the originating call and timing.
    pub fn for_call(mut self, call: &ToolCall, duration_ms: u64) -> Self {
        self.call_id = call.id.clone();
        self.tool_name = call.name.clone();
        self.duration_ms = duration_ms;
        self
    }

    /// Body of the tool message appended to the conversation.
    pub fn to_message_content(&self) -> String {
        if self.success {
            format!("Result: {}", self.output)
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

/// The kind of side effect a tool call would have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    WriteFile,
    EditFile,
    CreateDirectory,
    RunCommand,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteFile => "write_file",
            Self::EditFile => "edit_file",
            Self::CreateDirectory => "create_directory",
            Self::RunCommand => "run_command",
        }
    }

    pub fn is_file_mutation(&self) -> bool {
        !matches!(self, Self::RunCommand)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "write_file" => Ok(Self::WriteFile),
            "edit_file" => Ok(Self::EditFile),
            "create_directory" => Ok(Self::CreateDirectory),
            "run_command" => Ok(Self::RunCommand),
            other => Err(format!("unknown action kind '{other}'")),
        }
    }
}

/// A side effect that must pass the safety gate before it runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// File path or command line
    pub subject: String,
}

impl Action {
    pub fn new(kind: ActionKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.subject)
    }
}

/// The core Tool trait.
///
/// Each tool is registered in the [`ToolRegistry`]. The scheduler asks the
/// tool whether a given invocation is read-only (and may run in parallel) and
/// what side effect it would have (so the safety gate can vet it).
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether this invocation only observes the workspace.
    fn is_read_only(&self, _arguments: &serde_json::Value) -> bool {
        false
    }

    /// The side effect this invocation would perform, if any.
    fn action(&self, _arguments: &serde_json::Value) -> Option<Action> {
        None
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;
}

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a call can run alongside other read-only calls.
    /// Unknown tools count as mutating.
    pub fn is_read_only(&self, call: &ToolCall) -> bool {
        self.tools
            .get(&call.name)
            .is_some_and(|t| t.is_read_only(&call.parameters))
    }

    /// Execute a tool call directly, bypassing scheduling and authorization.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.parameters.clone()).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Human-readable tool catalogue for the system prompt.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for name in self.names() {
            let Some(tool) = self.tools.get(name) else {
                continue;
            };
            out.push_str(&format!("## {name}\n{}\n", tool.description()));
            if let Some(props) = tool.parameters_schema()["properties"].as_object() {
                out.push_str("Parameters:\n");
                for (param, schema) in props {
                    let desc = schema["description"].as_str().unwrap_or("");
                    out.push_str(&format!("- {param}: {desc}\n"));
                }
            }
            out.push('\n');
        }
        out
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
