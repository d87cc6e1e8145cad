//! Planner - asks the LLM for the next decision
//!
//! The planner assembles a system prompt from a compact state projection,
//! appends the conversation history, offers the tool catalog, and parses the
//! model's reply into exactly one [`Decision`]. Replies that cannot be parsed
//! are converted into a bounded number of `Replan` decisions before the run
//! is stopped with `planner_parse_failure`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::prompts::planner_system_prompt;
use crate::agent::types::{GenerationOptions, Message, Usage};
use crate::core::contracts::{
    AgentState, Decision, ToolCall, STOP_PLANNER_PARSE_FAILURE,
};
use crate::core::provider::{CompletionRequest, LlmProvider};
use crate::error::Result;
use crate::tools::ToolRegistry;

/// Default number of parse failures tolerated before giving up
pub const DEFAULT_PARSE_RETRY_BUDGET: u32 = 2;

/// A decision plus the raw assistant message it came from
#[derive(Debug, Clone)]
pub struct PlannerOutput {
    /// The parsed decision
    pub decision: Decision,
    /// The assistant message to record in the conversation, when one exists
    pub assistant_message: Option<Message>,
    /// Token usage of the underlying completion
    pub usage: Option<Usage>,
}

/// Produces the next decision for a state
#[async_trait]
pub trait Planner: Send + Sync {
    async fn decide(
        &self,
        state: &AgentState,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<PlannerOutput>;
}

/// LLM-backed planner
pub struct LlmPlanner {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    options: GenerationOptions,
    parse_retry_budget: u32,
    parse_failures: AtomicU32,
}

impl LlmPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        LlmPlanner {
            provider,
            tools,
            options: GenerationOptions::precise(),
            parse_retry_budget: DEFAULT_PARSE_RETRY_BUDGET,
            parse_failures: AtomicU32::new(0),
        }
    }

    /// Override generation options
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the parse-retry budget
    pub fn with_parse_retry_budget(mut self, budget: u32) -> Self {
        self.parse_retry_budget = budget;
        self
    }

    /// Forget accumulated parse failures (between runs)
    pub fn reset_parse_failures(&self) {
        self.parse_failures.store(0, Ordering::Relaxed);
    }

    fn parse_failure(&self, detail: &str) -> PlannerOutput {
        let failures = self.parse_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(failures, detail, "planner reply could not be parsed");
        let decision = if failures > self.parse_retry_budget {
            Decision::Stop {
                reason: STOP_PLANNER_PARSE_FAILURE.to_string(),
            }
        } else {
            Decision::Replan {
                new_subgoals: vec!["parse_failure_retry_planning".to_string()],
            }
        };
        PlannerOutput {
            decision,
            assistant_message: None,
            usage: None,
        }
    }
}

/// Structured non-tool reply the planner understands
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Directive {
    Stop {
        reason: String,
    },
    Replan {
        #[serde(alias = "new_subgoals")]
        subgoals: Vec<String>,
    },
    AskUser {
        question: String,
        #[serde(default)]
        missing_fields: Vec<String>,
    },
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn decide(
        &self,
        state: &AgentState,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<PlannerOutput> {
        let system = planner_system_prompt(state, &self.tools)?;
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system));
        messages.extend(history.iter().cloned());

        let request = CompletionRequest {
            messages,
            tools: self.tools.definitions(),
            options: self.options.clone(),
        };

        let response = self.provider.complete(request, cancel).await?;
        let usage = response.usage;

        // Tool calls win over content; only the first call is taken since
        // the loop executes one tool per turn.
        if let Some(calls) = response.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            let first = &calls[0];
            let args: serde_json::Value = match serde_json::from_str(&first.function.arguments) {
                Ok(v) => v,
                Err(e) => {
                    return Ok(self.parse_failure(&format!(
                        "bad arguments for '{}': {}",
                        first.function.name, e
                    )))
                }
            };
            debug!(tool = %first.function.name, "planner chose a tool call");
            return Ok(PlannerOutput {
                decision: Decision::CallTool(ToolCall::with_id(
                    first.id.clone(),
                    first.function.name.clone(),
                    args,
                )),
                assistant_message: Some(response.to_assistant_message()),
                usage,
            });
        }

        let content = response.content.trim().to_string();
        if content.is_empty() {
            return Ok(self.parse_failure("empty reply"));
        }

        if content.starts_with('{') {
            return match serde_json::from_str::<Directive>(&content) {
                Ok(Directive::Stop { reason }) => Ok(PlannerOutput {
                    decision: Decision::Stop { reason },
                    assistant_message: Some(Message::assistant(content)),
                    usage,
                }),
                Ok(Directive::Replan { subgoals }) => Ok(PlannerOutput {
                    decision: Decision::Replan {
                        new_subgoals: subgoals,
                    },
                    assistant_message: None,
                    usage,
                }),
                Ok(Directive::AskUser {
                    question,
                    missing_fields,
                }) => Ok(PlannerOutput {
                    decision: Decision::AskUser {
                        question,
                        missing_fields,
                    },
                    assistant_message: None,
                    usage,
                }),
                Err(e) => Ok(self.parse_failure(&format!("bad directive: {}", e))),
            };
        }

        // Plain text is the final answer.
        Ok(PlannerOutput {
            decision: Decision::Stop {
                reason: content.clone(),
            },
            assistant_message: Some(Message::assistant(content)),
            usage,
        })
    }
}
