//! LLM provider boundary — the one interface the core consumes.
//!
//! The loop never talks HTTP; it hands a [`CompletionRequest`] to whatever
//! implements [`LlmProvider`] and gets back either a final assistant message
//! or an assistant message carrying tool calls. Concrete providers (the
//! OpenAI-compatible client, the harness mock) live elsewhere.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::types::{AssistantToolCall, GenerationOptions, Message, ToolDefinition, Usage};
use crate::error::Result;

/// A single completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Full message sequence, system prompt first
    pub messages: Vec<Message>,
    /// Tool catalog offered to the model, empty to disable tool calling
    pub tools: Vec<ToolDefinition>,
    /// Generation options
    pub options: GenerationOptions,
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the assistant message (may be empty with tool calls)
    pub content: String,
    /// Tool calls requested by the model
    pub tool_calls: Option<Vec<AssistantToolCall>>,
    /// Finish reason as reported by the provider (stop, tool_calls, length…)
    pub finish_reason: Option<String>,
    /// Token usage for this completion
    pub usage: Option<Usage>,
}

impl LlmResponse {
    /// Whether the model requested at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }

    /// Reconstruct the assistant message this response represents
    pub fn to_assistant_message(&self) -> Message {
        match &self.tool_calls {
            Some(calls) if !calls.is_empty() => {
                Message::assistant_with_tool_calls(self.content.clone(), calls.clone())
            }
            _ => Message::assistant(self.content.clone()),
        }
    }
}

/// Abstract interface for LLM backends.
///
/// Implementations must honour the cancellation token cooperatively: a
/// cancelled request returns `Error::Cancelled` promptly instead of waiting
/// for the transport to finish.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier used in logs and interaction records
    fn id(&self) -> &str;

    /// Run one completion
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse>;
}
