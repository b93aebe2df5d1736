//! Error types for the Kubrick domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them all.

use thiserror::Error;

/// The top-level error type for all Kubrick operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Agent loop errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Backend reported an error: {0}")]
    Backend(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures surfaced by the agent loop.
///
/// Parse, permission and tool variants are recovered inside a turn and only
/// appear as warnings or failed tool results. The rest end the task; the
/// transcript is returned alongside them either way.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Malformed tool call: {message}")]
    Parse { message: String },

    #[error("Permission denied for {subject}")]
    PermissionDenied { subject: String },

    #[error("Tool '{tool_name}' failed: {reason}")]
    ToolExecution { tool_name: String, reason: String },

    #[error("Tool '{tool_name}' timed out after {timeout_secs}s")]
    ToolTimeout { tool_name: String, timeout_secs: u64 },

    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("Context overflow: {tokens} tokens exceed the budget of {budget}")]
    ContextOverflow { tokens: usize, budget: usize },

    #[error("No progress after {iterations} consecutive iterations")]
    StuckLoop { iterations: u32 },

    #[error("Model returned {count} consecutive empty responses")]
    EmptyResponses { count: u32 },

    #[error("Response looks like a fabricated tool result with no tool call")]
    HallucinatedToolResult,

    #[error("Iteration budget of {max_iterations} exhausted")]
    IterationBudgetExceeded { max_iterations: u32 },

    #[error("Time budget of {timeout_secs}s exhausted")]
    TimeBudgetExceeded { timeout_secs: u64 },

    #[error("The plan was rejected; nothing was changed")]
    PlanRejected,
}

impl AgentError {
    /// Whether this is a budget or guard termination rather than a failure
    /// of a collaborator.
    pub fn is_graceful(&self) -> bool {
        matches!(
            self,
            Self::StuckLoop { .. }
                | Self::EmptyResponses { .. }
                | Self::HallucinatedToolResult
                | Self::IterationBudgetExceeded { .. }
                | Self::TimeBudgetExceeded { .. }
                | Self::PlanRejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "run_command".into(),
            reason: "user declined".into(),
        });
        assert!(err.to_string().contains("run_command"));
        assert!(err.to_string().contains("declined"));
    }

    #[test]
    fn provider_error_converts_into_agent_error() {
        let err: AgentError = ProviderError::Network("connection refused".into()).into();
        assert!(matches!(err, AgentError::Provider(_)));
        assert!(!err.is_graceful());
    }

    #[test]
    fn budget_errors_are_graceful() {
        assert!(AgentError::StuckLoop { iterations: 8 }.is_graceful());
        assert!(AgentError::TimeBudgetExceeded { timeout_secs: 600 }.is_graceful());
        assert!(AgentError::PlanRejected.is_graceful());
        assert!(
            !AgentError::ContextOverflow {
                tokens: 10,
                budget: 5
            }
            .is_graceful()
        );
    }
}
