//! Core abstractions — value contracts and the traits the runtime consumes
//!
//! - `contracts`: value types for goals, budgets, tool calls/results,
//!   observations, decisions, actions, and agent state
//! - `provider`: the LLM provider boundary
//! - `store`: pluggable trace-id → state persistence

pub mod contracts;
pub mod provider;
pub mod store;

pub use contracts::{
    affordances, is_completion_reason, Action, AgentGoal, AgentResult, AgentState, Budget,
    Decision, ErrorHandlingPolicy, Observation, ToolCall, ToolErrorCode, ToolResult,
    STOP_BUDGET_EXHAUSTED, STOP_CANCELLED, STOP_PLANNER_PARSE_FAILURE,
};
pub use provider::{CompletionRequest, LlmProvider, LlmResponse};
pub use store::{InMemoryStateStore, StateStore};
