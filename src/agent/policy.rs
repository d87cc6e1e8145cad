//! Policy engine
//!
//! Resolves a `(Decision, Observation?, Policy, State)` tuple into the
//! concrete `Action` the loop dispatches on. This is the single place that
//! decides recovery vs. surface: retries for transient failures, replan or
//! ask-user for invalid input, stop for everything non-recoverable.
//!
//! `resolve` is a pure function; the backoff schedule carries its own seeded
//! jitter source so retry timing is reproducible in tests.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::contracts::{
    Action, AgentState, Decision, ErrorHandlingPolicy, Observation, ToolErrorCode,
};

/// Resolve a planner decision (optionally with the observation of its
/// execution) into an action. First match wins.
pub fn resolve(
    decision: &Decision,
    observation: Option<&Observation>,
    policy: &ErrorHandlingPolicy,
    state: &AgentState,
) -> Action {
    let call = match decision {
        Decision::Stop { reason } => {
            return Action::Stop {
                reason: reason.clone(),
            }
        }
        Decision::Replan { new_subgoals } => {
            return Action::Replan {
                new_subgoals: new_subgoals.clone(),
            }
        }
        Decision::AskUser {
            question,
            missing_fields,
        } => {
            return Action::AskUser {
                question: question.clone(),
                missing_fields: missing_fields.clone(),
            }
        }
        Decision::CallTool(call) => call,
    };

    let obs = match observation {
        // No observation yet: pass the call through untouched.
        None => {
            return Action::CallTool {
                call: call.clone(),
                is_retry: false,
            }
        }
        Some(obs) => obs,
    };

    if obs.raw.ok {
        // Success: the planner is expected to have already advanced.
        return Action::CallTool {
            call: call.clone(),
            is_retry: false,
        };
    }

    match obs.raw.error_code {
        ToolErrorCode::Timeout | ToolErrorCode::RetryableServer => {
            if obs.raw.attempt <= policy.max_retries {
                // Re-issue the in-flight call; last_action is authoritative
                // when it refers to the same tool.
                let retry_call = state
                    .last_action
                    .clone()
                    .filter(|a| a.tool_name == call.tool_name)
                    .unwrap_or_else(|| call.clone());
                Action::CallTool {
                    call: retry_call,
                    is_retry: true,
                }
            } else {
                Action::Stop {
                    reason: format!("Max retries exceeded for {}", call.tool_name),
                }
            }
        }
        ToolErrorCode::InvalidInput => {
            if policy.ask_user_when_missing_fields {
                Action::AskUser {
                    question: format!(
                        "Tool '{}' failed with invalid input. Please provide correct parameters.",
                        call.tool_name
                    ),
                    missing_fields: fields_from_details(
                        obs.raw.error_details.as_deref().unwrap_or(""),
                    ),
                }
            } else {
                Action::Replan {
                    new_subgoals: vec![format!("fix_invalid_input_for_{}", call.tool_name)],
                }
            }
        }
        ToolErrorCode::ToolBug
        | ToolErrorCode::NonRetryableServer
        | ToolErrorCode::PermissionDenied
        | ToolErrorCode::NotFound => Action::Stop {
            reason: format!("non-recoverable: {}", obs.raw.error_code),
        },
        ToolErrorCode::Cancelled => Action::Stop {
            reason: "cancelled".to_string(),
        },
        // Unreachable when the ToolResult invariant holds.
        ToolErrorCode::None => Action::CallTool {
            call: call.clone(),
            is_retry: false,
        },
    }
}

/// Whether an observation warrants a retry under the given budget
pub fn should_retry(obs: &Observation, max_retries: u32) -> bool {
    !obs.raw.ok && obs.raw.error_code.is_transient() && obs.raw.attempt <= max_retries
}

/// Pull field names out of failure details. Quoted tokens ('path', "path")
/// are treated as the missing fields.
fn fields_from_details(details: &str) -> Vec<String> {
    let mut fields = Vec::new();
    for quote in ['\'', '"'] {
        let mut parts = details.split(quote);
        // Every second fragment sits between a pair of quotes.
        parts.next();
        while let (Some(inner), rest) = (parts.next(), parts.next()) {
            if !inner.is_empty() && inner.len() <= 64 && !fields.contains(&inner.to_string()) {
                fields.push(inner.to_string());
            }
            if rest.is_none() {
                break;
            }
        }
    }
    fields
}

/// Exponential backoff schedule with jitter:
/// `base · 2^(attempt-1) · U[0.8, 1.2]`, capped.
pub struct Backoff {
    base: Duration,
    cap: Duration,
    rng: StdRng,
}

/// Upper bound on any single retry delay
pub const BACKOFF_CAP: Duration = Duration::from_secs(30);

impl Backoff {
    /// Create a schedule with an OS-seeded jitter source
    pub fn new(base: Duration) -> Self {
        Backoff {
            base,
            cap: BACKOFF_CAP,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a schedule with a fixed seed, for deterministic tests
    pub fn with_seed(base: Duration, seed: u64) -> Self {
        Backoff {
            base,
            cap: BACKOFF_CAP,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Delay before re-running the given attempt (1-based: the delay before
    /// attempt 2 uses `attempt = 1`)
    pub fn delay(&mut self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self.base.as_secs_f64() * f64::from(1u32 << exponent);
        let jitter: f64 = self.rng.random_range(0.8..=1.2);
        Duration::from_secs_f64((scaled * jitter).min(self.cap.as_secs_f64()))
    }
}
