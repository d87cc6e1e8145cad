//! Mock LLM provider and scripted tools
//!
//! The mock provider replays a preprogrammed sequence of tool-call replies
//! followed by a final message, which is what lets scenarios run
//! deterministically without network access. `RecordingProvider` wraps any
//! provider and captures every request/response pair for validation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::agent::{AssistantToolCall, Usage};
use crate::core::contracts::ToolErrorCode;
use crate::core::provider::{CompletionRequest, LlmProvider, LlmResponse};
use crate::error::Result;
use crate::harness::scenario::{LlmInteractionRecord, MockToolSpec, ScriptedReply};
use crate::tools::{Tool, ToolContext, ToolError};

/// Content returned when the script runs dry
const SCRIPT_EXHAUSTED_REPLY: &str = "I have no further actions to take.";

/// Deterministic provider replaying a scripted reply sequence
pub struct MockLlmProvider {
    script: Mutex<VecDeque<ScriptedReply>>,
    call_counter: AtomicU32,
}

impl MockLlmProvider {
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        MockLlmProvider {
            script: Mutex::new(script.into()),
            call_counter: AtomicU32::new(0),
        }
    }

    pub fn shared(script: Vec<ScriptedReply>) -> Arc<Self> {
        Arc::new(Self::new(script))
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
        _cancel: &CancellationToken,
    ) -> Result<LlmResponse> {
        let reply = self.script.lock().await.pop_front();
        let usage = Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });

        Ok(match reply {
            Some(ScriptedReply::ToolCall { tool_name, args }) => {
                let id = format!("call_{}", self.call_counter.fetch_add(1, Ordering::Relaxed) + 1);
                LlmResponse {
                    content: String::new(),
                    tool_calls: Some(vec![AssistantToolCall::function(
                        id,
                        tool_name,
                        args.to_string(),
                    )]),
                    finish_reason: Some("tool_calls".to_string()),
                    usage,
                }
            }
            Some(ScriptedReply::Final { content }) => LlmResponse {
                content,
                tool_calls: None,
                finish_reason: Some("stop".to_string()),
                usage,
            },
            None => LlmResponse {
                content: SCRIPT_EXHAUSTED_REPLY.to_string(),
                tool_calls: None,
                finish_reason: Some("stop".to_string()),
                usage,
            },
        })
    }
}

/// Wraps a provider and records every interaction
pub struct RecordingProvider {
    inner: Arc<dyn LlmProvider>,
    interactions: Mutex<Vec<LlmInteractionRecord>>,
}

impl RecordingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>) -> Arc<Self> {
        Arc::new(RecordingProvider {
            inner,
            interactions: Mutex::new(Vec::new()),
        })
    }

    /// Drain the captured interactions
    pub async fn take_interactions(&self) -> Vec<LlmInteractionRecord> {
        std::mem::take(&mut *self.interactions.lock().await)
    }
}

#[async_trait]
impl LlmProvider for RecordingProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse> {
        let request_messages = request.messages.clone();
        let response = self.inner.complete(request, cancel).await?;

        let response_summary = match &response.tool_calls {
            Some(calls) if !calls.is_empty() => {
                format!("tool_call:{}", calls[0].function.name)
            }
            _ => format!("final:{}", truncate(&response.content, 60)),
        };
        self.interactions.lock().await.push(LlmInteractionRecord {
            request_messages,
            response_summary,
            usage: response.usage,
        });
        Ok(response)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Mock tool that fails its first `fail_attempts` executions, then succeeds.
/// Used by transient-retry scenarios.
pub struct ScriptedTool {
    spec: MockToolSpec,
    executions: AtomicU32,
}

impl ScriptedTool {
    pub fn new(spec: MockToolSpec) -> Self {
        ScriptedTool {
            spec,
            executions: AtomicU32::new(0),
        }
    }

    /// Total executions so far
    pub fn execution_count(&self) -> u32 {
        self.executions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        "Scripted mock tool for benchmark scenarios"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    async fn execute(
        &self,
        _args: Value,
        _ctx: ToolContext,
        _cancel: CancellationToken,
    ) -> std::result::Result<Value, ToolError> {
        let execution = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        if execution <= self.spec.fail_attempts {
            let code = if self.spec.error_code == ToolErrorCode::None {
                ToolErrorCode::RetryableServer
            } else {
                self.spec.error_code
            };
            return Err(ToolError::new(
                code,
                format!("scripted failure on execution {}", execution),
            ));
        }
        Ok(self
            .spec
            .data
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "ok": true })))
    }
}
