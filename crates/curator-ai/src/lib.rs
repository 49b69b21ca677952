//! Chat protocol types and the OpenAI-compatible inference client used by
//! Curator's tool-calling agent runtime.
mod openai;
mod retry;
mod types;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, CuratorAiError, LlmClient, Message,
    MessageRole, ToolCall, ToolDefinition,
};
