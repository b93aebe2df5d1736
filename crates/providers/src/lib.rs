//! Text-generation backends for Kubrick.
//!
//! All providers implement the `kubrick_core::Provider` trait. Streaming
//! bodies are split into lines by [`sse::SseLineDecoder`], which keeps
//! multi-byte characters intact across network chunk boundaries. The router
//! builds the configured providers and selects one by name.

pub mod anthropic;
mod http;
pub mod openai_compat;
pub mod router;
pub mod sse;
pub mod triton;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
pub use sse::SseLineDecoder;
pub use triton::TritonProvider;
