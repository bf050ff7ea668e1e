//! Chat-completion client surface for botkun.
//!
//! Defines the message types exchanged with a completion provider, the
//! `ChatCompletionClient` trait the runtime depends on, and the OpenAI-style
//! HTTP implementation.

mod openai;
mod types;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use types::{ChatCompletionClient, ChatMessage, ChatRequest, ChatResponse, CompletionError, MessageRole};
