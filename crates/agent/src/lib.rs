//! The orchestration core of Kubrick.
//!
//! A task runs as a bounded loop:
//!
//! 1. **Fit** the history into the model's context window
//! 2. **Stream** a response from the provider
//! 3. **Parse** fenced `tool_call` blocks out of the response
//! 4. **Execute** the calls through the scheduler and the safety gate
//! 5. **Evaluate** whether the task is complete, stuck or out of budget
//!
//! The loop returns the transcript and a termination reason on every exit.

pub mod completion;
pub mod context;
pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod scheduler;
pub mod strategy;

#[cfg(test)]
mod test_helpers;

pub use completion::{CompletionDetector, CompletionSignal, PatternError};
pub use context::{ContextBudget, ContextManager, ContextReport};
pub use loop_runner::{AgentLoop, FinalAnswer, RunOutcome, Termination};
pub use parser::{ParsedResponse, ToolCallParseError, parse};
pub use prompt::system_prompt;
pub use scheduler::ToolScheduler;
pub use strategy::{
    ExecutionMode, ExecutionPlan, ExecutionStrategy, TaskClassification, TaskClassifier, TaskComplexity,
};
