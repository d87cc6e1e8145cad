//! Core value types shared by every layer of the agent runtime.
//!
//! Everything here is a plain value: goals, budgets, tool calls and results,
//! normalized observations, planner decisions, and the resolved actions the
//! loop dispatches on. `AgentState` is immutable in practice — updates go
//! through the state manager, which produces a new value each time.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What the agent has been asked to accomplish. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentGoal {
    /// The user's goal, verbatim
    pub user_goal: String,
    /// Ordered constraints the agent must respect
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl AgentGoal {
    /// Create a goal with no constraints
    pub fn new(user_goal: impl Into<String>) -> Self {
        AgentGoal {
            user_goal: user_goal.into(),
            constraints: Vec::new(),
        }
    }

    /// Add a constraint (builder style)
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }
}

/// Hard limits for a single run. Both fields must be strictly positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum loop turns before the run is stopped
    pub max_turns: u32,
    /// Maximum wall-clock time before the run is stopped
    #[serde(with = "humantime_serde")]
    pub max_wall_clock: Duration,
}

impl Budget {
    /// Create a budget, clamping zero values up to the minimum
    pub fn new(max_turns: u32, max_wall_clock: Duration) -> Self {
        Budget {
            max_turns: max_turns.max(1),
            max_wall_clock: max_wall_clock.max(Duration::from_millis(1)),
        }
    }

    /// A budget that stops the loop before the first turn runs. Used by
    /// boundary tests; `new()` refuses to build this.
    pub fn exhausted() -> Self {
        Budget {
            max_turns: 0,
            max_wall_clock: Duration::from_secs(1),
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Budget {
            max_turns: 20,
            max_wall_clock: Duration::from_secs(300),
        }
    }
}

/// A request to invoke a registered tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id linking the call to its result message
    pub id: String,
    /// Name of the tool, snake_case, must match a registered tool
    pub tool_name: String,
    /// Tool arguments as a JSON tree
    pub args: Value,
}

impl ToolCall {
    /// Create a call with a fresh correlation id
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        ToolCall {
            id: format!("call_{}", Uuid::new_v4().simple()),
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Create a call with an explicit correlation id (e.g. from an LLM reply)
    pub fn with_id(id: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Self {
        ToolCall {
            id: id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// Classified outcome of a tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorCode {
    /// No error — the call succeeded
    None,
    /// Arguments were missing, malformed, or failed schema validation
    InvalidInput,
    /// The call exceeded its time limit
    Timeout,
    /// Transient server-side failure, safe to retry
    RetryableServer,
    /// Permanent server-side failure
    NonRetryableServer,
    /// The tool itself misbehaved (panic, uncaught error)
    ToolBug,
    /// The tool refused the operation
    PermissionDenied,
    /// The target resource does not exist
    NotFound,
    /// The caller cancelled the run
    Cancelled,
}

impl ToolErrorCode {
    /// Transient codes the policy engine will retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolErrorCode::Timeout | ToolErrorCode::RetryableServer)
    }
}

impl std::fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolErrorCode::None => "none",
            ToolErrorCode::InvalidInput => "invalid_input",
            ToolErrorCode::Timeout => "timeout",
            ToolErrorCode::RetryableServer => "retryable_server",
            ToolErrorCode::NonRetryableServer => "non_retryable_server",
            ToolErrorCode::ToolBug => "tool_bug",
            ToolErrorCode::PermissionDenied => "permission_denied",
            ToolErrorCode::NotFound => "not_found",
            ToolErrorCode::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Typed result of a single tool execution attempt.
///
/// Invariant: `ok == (error_code == ToolErrorCode::None)` and `attempt >= 1`.
/// The constructors below are the only way the executor builds one, which
/// keeps the invariant by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution succeeded
    pub ok: bool,
    /// Result payload, absent on failure or when the tool produced nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error classification (`None` on success)
    pub error_code: ToolErrorCode,
    /// Human-readable failure details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Whether the arguments passed schema validation
    pub schema_validated: bool,
    /// 1-based attempt counter for this logical call
    pub attempt: u32,
    /// Time the execution took
    #[serde(with = "humantime_serde")]
    pub latency: Duration,
}

impl ToolResult {
    /// Build a successful result
    pub fn success(data: Option<Value>, attempt: u32, latency: Duration) -> Self {
        ToolResult {
            ok: true,
            data,
            error_code: ToolErrorCode::None,
            error_details: None,
            schema_validated: true,
            attempt: attempt.max(1),
            latency,
        }
    }

    /// Build a failed result
    pub fn failure(
        code: ToolErrorCode,
        details: impl Into<String>,
        attempt: u32,
        latency: Duration,
    ) -> Self {
        debug_assert!(code != ToolErrorCode::None, "failure requires an error code");
        ToolResult {
            ok: false,
            data: None,
            error_code: code,
            error_details: Some(details.into()),
            schema_validated: code != ToolErrorCode::InvalidInput,
            attempt: attempt.max(1),
            latency,
        }
    }

    /// Render the result as the content of a tool message for the LLM
    pub fn render_for_llm(&self) -> String {
        if self.ok {
            match &self.data {
                Some(data) => serde_json::to_string(data).unwrap_or_else(|_| "ok".to_string()),
                None => "ok (no data)".to_string(),
            }
        } else {
            format!(
                "Error: {} - {}",
                self.error_code,
                self.error_details.as_deref().unwrap_or("no details")
            )
        }
    }
}

/// Closed vocabulary of affordance tags the normalizer may attach to an
/// observation. Affordances hint at viable next steps without prescribing one.
pub mod affordances {
    pub const RETRY_WITH_BACKOFF: &str = "retry_with_backoff";
    pub const FIX_PARAMETERS: &str = "fix_parameters";
    pub const ASK_USER_FOR_CLARIFICATION: &str = "ask_user_for_clarification";
    pub const FETCH_NEXT_PAGE: &str = "fetch_next_page";
    pub const FETCH_MORE_RESULTS: &str = "fetch_more_results";
    pub const PROCESS_RESULTS: &str = "process_results";
    pub const USE_DIFFERENT_TOOL: &str = "use_different_tool";
    pub const ASK_USER_FOR_GUIDANCE: &str = "ask_user_for_guidance";
}

/// Compact, LLM-friendly view of a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// One-line outcome summary
    pub summary: String,
    /// Small, bounded set of extracted facts, insertion-ordered
    pub key_facts: IndexMap<String, String>,
    /// Affordance tags drawn from [`affordances`]
    pub affordances: Vec<String>,
    /// The raw result the observation was derived from
    pub raw: ToolResult,
}

/// What the planner wants to do next
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Invoke a tool
    CallTool(ToolCall),
    /// Finish the run
    Stop {
        /// Why the run is over; classified by [`is_completion_reason`]
        reason: String,
    },
    /// Replace the current subgoals and take another turn
    Replan {
        /// The new ordered subgoals
        new_subgoals: Vec<String>,
    },
    /// Hand control back to the user with a question
    AskUser {
        /// The question to surface
        question: String,
        /// Fields the planner believes are missing
        missing_fields: Vec<String>,
    },
}

impl Decision {
    /// Short label for logging and event digests
    pub fn label(&self) -> &'static str {
        match self {
            Decision::CallTool(_) => "call_tool",
            Decision::Stop { .. } => "stop",
            Decision::Replan { .. } => "replan",
            Decision::AskUser { .. } => "ask_user",
        }
    }
}

/// A decision resolved through the policy engine into something the loop
/// can dispatch on. Same shapes as [`Decision`], except `CallTool` knows
/// whether it is a policy-driven retry.
#[derive(Debug, Clone)]
pub enum Action {
    CallTool { call: ToolCall, is_retry: bool },
    Stop { reason: String },
    Replan { new_subgoals: Vec<String> },
    AskUser { question: String, missing_fields: Vec<String> },
}

/// Knobs controlling how the policy engine recovers from tool failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingPolicy {
    /// Retries allowed per logical call for transient failures
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt with jitter
    #[serde(with = "humantime_serde")]
    pub base_backoff: Duration,
    /// Whether fallback strategies (e.g. alternate tools) may be suggested
    pub use_fallbacks: bool,
    /// On invalid input: `true` asks the user, `false` replans
    pub ask_user_when_missing_fields: bool,
}

impl Default for ErrorHandlingPolicy {
    fn default() -> Self {
        ErrorHandlingPolicy {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
            use_fallbacks: true,
            ask_user_when_missing_fields: false,
        }
    }
}

/// The agent's entire working state for one run.
///
/// Treated as an immutable value: the state manager produces a new state on
/// every update and `turn_index` is monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// The goal this run is pursuing
    pub goal: AgentGoal,
    /// Current ordered subgoals (replaced wholesale by `Replan`)
    pub subgoals: Vec<String>,
    /// The most recent tool call, if any
    pub last_action: Option<ToolCall>,
    /// The most recent observation, if any
    pub last_observation: Option<Observation>,
    /// The run's budget
    pub budget: Budget,
    /// Completed turn count
    pub turn_index: u32,
    /// Bounded key→value summary of facts discovered so far
    pub working_memory_digest: IndexMap<String, String>,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Whether the run ended in a completion-like state
    pub success: bool,
    /// Why the loop stopped
    pub stop_reason: String,
    /// Turns completed before stopping
    pub total_turns: u32,
    /// Wall-clock duration of the run
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// The state at termination
    pub final_state: AgentState,
    /// The final assistant reply, when the run produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
}

/// Stop reason emitted when the turn or wall-clock budget runs out
pub const STOP_BUDGET_EXHAUSTED: &str = "budget_exhausted";
/// Stop reason emitted when the caller cancels the run
pub const STOP_CANCELLED: &str = "cancelled";
/// Stop reason emitted when the planner-retry budget is exhausted
pub const STOP_PLANNER_PARSE_FAILURE: &str = "planner_parse_failure";

/// Classify a stop reason as completion-like (success) or error-like.
///
/// Error-like reasons are the budget/cancel/parse sentinels plus anything the
/// policy engine prefixes with `error:`, `non-recoverable:`, or a
/// max-retries notice. Everything else — including a plain final answer —
/// counts as completion.
pub fn is_completion_reason(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    !(lower == STOP_BUDGET_EXHAUSTED
        || lower == STOP_CANCELLED
        || lower == STOP_PLANNER_PARSE_FAILURE
        || lower.starts_with("error:")
        || lower.starts_with("non-recoverable:")
        || lower.starts_with("max retries exceeded"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_clamps_zero() {
        let b = Budget::new(0, Duration::ZERO);
        assert_eq!(b.max_turns, 1);
        assert!(b.max_wall_clock > Duration::ZERO);
    }

    #[test]
    fn tool_result_invariant_holds() {
        let ok = ToolResult::success(Some(serde_json::json!({"x": 1})), 1, Duration::ZERO);
        assert!(ok.ok);
        assert_eq!(ok.error_code, ToolErrorCode::None);

        let fail = ToolResult::failure(ToolErrorCode::Timeout, "slow", 2, Duration::ZERO);
        assert!(!fail.ok);
        assert_eq!(fail.error_code, ToolErrorCode::Timeout);
        assert_eq!(fail.attempt, 2);
    }

    #[test]
    fn tool_result_attempt_at_least_one() {
        let r = ToolResult::success(None, 0, Duration::ZERO);
        assert_eq!(r.attempt, 1);
    }

    #[test]
    fn render_for_llm_shapes() {
        let ok = ToolResult::success(Some(serde_json::json!({"n": 2})), 1, Duration::ZERO);
        assert_eq!(ok.render_for_llm(), r#"{"n":2}"#);

        let empty = ToolResult::success(None, 1, Duration::ZERO);
        assert_eq!(empty.render_for_llm(), "ok (no data)");

        let fail = ToolResult::failure(ToolErrorCode::NotFound, "gone", 1, Duration::ZERO);
        assert!(fail.render_for_llm().contains("not_found"));
        assert!(fail.render_for_llm().contains("gone"));
    }

    #[test]
    fn completion_reason_classification() {
        assert!(is_completion_reason("All files read successfully."));
        assert!(is_completion_reason("done"));
        assert!(!is_completion_reason(STOP_BUDGET_EXHAUSTED));
        assert!(!is_completion_reason(STOP_CANCELLED));
        assert!(!is_completion_reason(STOP_PLANNER_PARSE_FAILURE));
        assert!(!is_completion_reason("error: planner exploded"));
        assert!(!is_completion_reason("non-recoverable: permission_denied"));
        assert!(!is_completion_reason("Max retries exceeded for read_file"));
    }

    #[test]
    fn tool_call_ids_are_unique() {
        let a = ToolCall::new("read_file", serde_json::json!({}));
        let b = ToolCall::new("read_file", serde_json::json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn agent_state_round_trips_through_json() {
        let state = AgentState {
            goal: AgentGoal::new("read the readme"),
            subgoals: vec!["find file".into()],
            last_action: Some(ToolCall::new("read_file", serde_json::json!({"file_path": "a"}))),
            last_observation: None,
            budget: Budget::default(),
            turn_index: 3,
            working_memory_digest: IndexMap::from([("fact_size".to_string(), "12".to_string())]),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: AgentState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.turn_index, 3);
        assert_eq!(back.working_memory_digest["fact_size"], "12");
    }
}
