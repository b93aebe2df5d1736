//! # Kubrick Core
//!
//! Domain types, traits, and error definitions for the Kubrick coding
//! assistant. This crate has no framework dependencies; it defines the model
//! every other crate implements against.
//!
//! Providers and tools are traits here. Implementations live in their own
//! crates, so the loop can be driven by mocks in tests and by real backends
//! in the binary.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ProviderError, Result, ToolError};
pub use event::{AgentEvent, ContextAction, EventBus};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, Usage};
pub use tool::{Action, ActionKind, Tool, ToolCall, ToolRegistry, ToolResult};
