//! Keeping the conversation inside the model's context window.
//!
//! | Usage (of window minus reserved output) | Action |
//! |------------------------------------------|--------|
//! | below `trim_threshold`                   | none |
//! | below `summarize_threshold`              | drop oldest middle messages |
//! | at or above `summarize_threshold`        | summarize the middle |
//! | still over the budget                    | reset to system + last user message |
//!
//! The system prompt is never trimmed or summarized away.

pub mod manager;
pub mod token;

pub use manager::{ContextBudget, ContextManager, ContextReport, truncate_tool_output};
