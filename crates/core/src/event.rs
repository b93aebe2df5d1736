//! Progress events: the loop, scheduler and safety gate report what they
//! are doing here, and a presentation layer renders whatever it subscribes to.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::tool::Action;

/// How the context manager rewrote the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextAction {
    Trimmed,
    Summarized,
    Reset,
    Truncated,
}

impl ContextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trimmed => "trimmed",
            Self::Summarized => "summarized",
            Self::Reset => "reset",
            Self::Truncated => "truncated",
        }
    }
}

/// Everything the orchestration core reports while running a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A new loop iteration began.
    IterationStarted { iteration: u32, max_iterations: u32 },

    /// Partial text streamed from the provider.
    AssistantDelta { content: String },

    /// A parsed tool call was handed to the scheduler.
    ToolCallIssued {
        call_id: String,
        tool_name: String,
        parameters: serde_json::Value,
        fallback: bool,
    },

    /// A tool call produced its result.
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },

    /// The context manager rewrote the history.
    ContextRewritten {
        action: ContextAction,
        tokens_before: usize,
        tokens_after: usize,
    },

    /// The safety gate is waiting on the user.
    PermissionPrompt {
        action: Action,
        danger: Option<String>,
    },

    /// The safety gate reached a verdict.
    PermissionDecided {
        action: Action,
        allowed: bool,
        scope: String,
    },

    /// A recoverable anomaly worth surfacing.
    Warning { message: String },

    /// The loop reached a terminal state.
    LoopTerminated {
        reason: String,
        completed: bool,
        iterations: u32,
    },
}

impl AgentEvent {
    /// Short event name for logs and wire protocols.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::IterationStarted { .. } => "iteration_started",
            Self::AssistantDelta { .. } => "assistant_delta",
            Self::ToolCallIssued { .. } => "tool_call_issued",
            Self::ToolCallFinished { .. } => "tool_call_finished",
            Self::ContextRewritten { .. } => "context_rewritten",
            Self::PermissionPrompt { .. } => "permission_prompt",
            Self::PermissionDecided { .. } => "permission_decided",
            Self::Warning { .. } => "warning",
            Self::LoopTerminated { .. } => "loop_terminated",
        }
    }
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub; a slow
/// subscriber lags rather than blocking the loop.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
