//! Agent loop
//!
//! Runs a single goal to termination under a budget. Each turn goes
//! plan → policy (pre) → execute → normalize → policy (post) → critic →
//! state update, with policy-driven retries happening before the planner is
//! consulted again. The planner is never called twice within one turn for
//! the same action.
//!
//! Component failures never escape as panics or raw errors: the loop-level
//! error boundary converts them into a terminal result with
//! `stop_reason = "error: …"` and the last successful state preserved.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::conversation::{ConversationManager, Turn};
use crate::agent::critic::Critic;
use crate::agent::events::{AgentEvent, EventBus};
use crate::agent::executor::Executor;
use crate::agent::loop_guard::LoopGuard;
use crate::agent::normalizer::normalize;
use crate::agent::planner::{Planner, PlannerOutput};
use crate::agent::policy::{self, Backoff};
use crate::agent::state::StateManager;
use crate::agent::types::{AssistantToolCall, Message};
use crate::core::contracts::{
    is_completion_reason, Action, AgentGoal, AgentResult, AgentState, Budget, Decision,
    ErrorHandlingPolicy, Observation, STOP_BUDGET_EXHAUSTED, STOP_CANCELLED,
};
use crate::error::{Error, Result};
use crate::tools::ToolContext;

/// How a turn wants the loop to proceed
enum TurnOutcome {
    /// Keep looping
    Continue,
    /// Terminate with this reason and success flag
    Terminate { reason: String, success: bool },
}

/// What the post-observation policy resolution asked for
enum PostOutcome {
    /// Success path: move on to the next turn
    Proceed,
    /// Policy replaced the planner's next decision with a replan
    ForceReplan { subgoals: Vec<String> },
    /// Terminal stop (or surfaced ask-user)
    Terminate { reason: String, success: bool },
}

/// The closed-loop controller driving one goal at a time
pub struct AgentLoop {
    planner: Arc<dyn Planner>,
    critic: Option<Arc<dyn Critic>>,
    executor: Executor,
    states: StateManager,
    conversation: ConversationManager,
    events: Arc<EventBus>,
    tool_ctx: ToolContext,
    trace_id: String,
    loop_guard_threshold: usize,
    backoff_seed: Option<u64>,
}

impl AgentLoop {
    pub fn new(
        planner: Arc<dyn Planner>,
        executor: Executor,
        states: StateManager,
        tool_ctx: ToolContext,
    ) -> Self {
        AgentLoop {
            planner,
            critic: None,
            executor,
            states,
            conversation: ConversationManager::new(),
            events: Arc::new(EventBus::new()),
            tool_ctx,
            trace_id: Uuid::new_v4().to_string(),
            loop_guard_threshold: 3,
            backoff_seed: None,
        }
    }

    /// Attach an optional critic
    pub fn with_critic(mut self, critic: Arc<dyn Critic>) -> Self {
        self.critic = Some(critic);
        self
    }

    /// Use a pre-built conversation manager (e.g. a bounded one)
    pub fn with_conversation(mut self, conversation: ConversationManager) -> Self {
        self.conversation = conversation;
        self
    }

    /// Seed the retry-backoff jitter for deterministic tests
    pub fn with_backoff_seed(mut self, seed: u64) -> Self {
        self.backoff_seed = Some(seed);
        self
    }

    /// Override the stuck-loop threshold
    pub fn with_loop_guard_threshold(mut self, threshold: usize) -> Self {
        self.loop_guard_threshold = threshold;
        self
    }

    /// The event bus this loop publishes to
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Read access to the conversation history
    pub fn conversation(&self) -> &ConversationManager {
        &self.conversation
    }

    /// The trace id keying this loop's persisted state
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Run one goal to termination. Reuses the loop's conversation, so a
    /// second call continues the same session with full history.
    pub async fn run(
        &mut self,
        goal: AgentGoal,
        budget: Budget,
        policy: &ErrorHandlingPolicy,
        cancel: &CancellationToken,
    ) -> Result<AgentResult> {
        let started = Instant::now();
        let mut state = self.states.create_initial(goal.clone(), budget);
        let mut turn = Turn::new(Message::user(goal.user_goal.clone()));
        let mut guard = LoopGuard::new(self.loop_guard_threshold);
        let mut backoff = match self.backoff_seed {
            Some(seed) => Backoff::with_seed(policy.base_backoff, seed),
            None => Backoff::new(policy.base_backoff),
        };
        // A decision carried into the next turn (critic override or forced
        // replan); it replaces the planner call for that turn.
        let mut pending_decision: Option<Decision> = None;
        let mut final_response: Option<String> = None;

        info!(trace_id = %self.trace_id, goal = %goal.user_goal, "run started");

        let (stop_reason, success) = loop {
            if state.turn_index >= budget.max_turns || started.elapsed() >= budget.max_wall_clock {
                break (STOP_BUDGET_EXHAUSTED.to_string(), false);
            }
            if cancel.is_cancelled() {
                break (STOP_CANCELLED.to_string(), false);
            }

            let planned = match pending_decision.take() {
                Some(decision) => PlannerOutput {
                    decision,
                    assistant_message: None,
                    usage: None,
                },
                None => {
                    let mut history = self.conversation.get_history();
                    history.extend(turn.flatten());
                    match self.planner.decide(&state, &history, cancel).await {
                        Ok(planned) => {
                            self.events.emit(AgentEvent::PlannerCalled {
                                request_digest: format!(
                                    "{} messages at turn {}",
                                    history.len(),
                                    state.turn_index
                                ),
                                response_digest: planned.decision.label().to_string(),
                                tokens: planned.usage.map(|u| u.total_tokens).unwrap_or(0),
                            });
                            planned
                        }
                        Err(Error::Cancelled) => break (STOP_CANCELLED.to_string(), false),
                        Err(e) => break (format!("error: {}", e), false),
                    }
                }
            };

            let outcome = match self
                .execute_turn(
                    planned,
                    &mut state,
                    &mut turn,
                    &mut guard,
                    &mut backoff,
                    &mut pending_decision,
                    &mut final_response,
                    budget,
                    policy,
                    cancel,
                    started,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => break (format!("error: {}", e), false),
            };

            match outcome {
                TurnOutcome::Continue => continue,
                TurnOutcome::Terminate { reason, success } => break (reason, success),
            }
        };

        if !turn.is_complete() {
            turn.complete_without_reply();
        }
        self.conversation.add_turn(turn);
        if let Err(e) = self.states.save(&self.trace_id, &state).await {
            warn!(trace_id = %self.trace_id, "failed to persist final state: {}", e);
        }

        self.events.emit(AgentEvent::Stopped {
            reason: stop_reason.clone(),
            success,
        });
        info!(
            trace_id = %self.trace_id,
            stop_reason = %stop_reason,
            success,
            turns = state.turn_index,
            "run finished"
        );

        Ok(AgentResult {
            success,
            stop_reason,
            total_turns: state.turn_index,
            duration: started.elapsed(),
            final_state: state,
            final_response,
        })
    }

    /// Dispatch one planned decision. Returns how the loop should proceed.
    #[allow(clippy::too_many_arguments)]
    async fn execute_turn(
        &mut self,
        planned: PlannerOutput,
        state: &mut AgentState,
        turn: &mut Turn,
        guard: &mut LoopGuard,
        backoff: &mut Backoff,
        pending_decision: &mut Option<Decision>,
        final_response: &mut Option<String>,
        budget: Budget,
        policy_cfg: &ErrorHandlingPolicy,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<TurnOutcome> {
        let decision = planned.decision.clone();
        let action_pre = policy::resolve(&decision, None, policy_cfg, state);

        match action_pre {
            Action::Stop { reason } => {
                if let Some(message) = planned.assistant_message {
                    *final_response = Some(message.content.clone());
                    turn.complete(message);
                }
                *state = self.states.update(state, &decision, None, None);
                self.emit_turn_completed(state);
                Ok(TurnOutcome::Terminate {
                    success: is_completion_reason(&reason),
                    reason,
                })
            }
            Action::AskUser { question, .. } => {
                *state = self.states.update(state, &decision, None, None);
                self.emit_turn_completed(state);
                Ok(TurnOutcome::Terminate {
                    reason: format!("ask_user: {}", question),
                    success: false,
                })
            }
            Action::Replan { .. } => {
                let opinion = self.review(state, &decision, None, cancel).await?;
                *state = self.states.update(state, &decision, None, opinion.as_ref());
                *pending_decision = opinion;
                self.emit_turn_completed(state);
                Ok(TurnOutcome::Continue)
            }
            Action::CallTool { call, .. } => {
                let assistant_message = planned.assistant_message.unwrap_or_else(|| {
                    Message::assistant_with_tool_calls(
                        "",
                        vec![AssistantToolCall::function(
                            call.id.clone(),
                            call.tool_name.clone(),
                            call.args.to_string(),
                        )],
                    )
                });

                let (observation, post) = self
                    .execute_with_retries(&decision, &call, state, backoff, budget, policy_cfg, cancel, started)
                    .await;

                let rendered = observation.raw.render_for_llm();
                turn.push_tool_round(
                    assistant_message,
                    vec![Message::tool(call.id.clone(), rendered.clone())],
                );

                if let PostOutcome::ForceReplan { ref subgoals } = post {
                    *pending_decision = Some(Decision::Replan {
                        new_subgoals: subgoals.clone(),
                    });
                }

                if let Some(subgoals) = guard.record(&call.tool_name, &rendered) {
                    warn!(tool = %call.tool_name, "loop guard fired, forcing replan");
                    *pending_decision = Some(Decision::Replan {
                        new_subgoals: subgoals,
                    });
                }

                let opinion = self
                    .review(state, &decision, Some(&observation), cancel)
                    .await?;
                if opinion.is_some() {
                    // Critic verdicts take precedence over the loop guard.
                    *pending_decision = opinion.clone();
                }

                *state = self
                    .states
                    .update(state, &decision, Some(&observation), opinion.as_ref());
                self.emit_turn_completed(state);
                if let Err(e) = self.states.save(&self.trace_id, state).await {
                    warn!(trace_id = %self.trace_id, "failed to persist state: {}", e);
                }

                match post {
                    PostOutcome::Terminate { reason, success } => {
                        // Surface the failure as the user-visible outcome when
                        // the planner never got to produce a final reply.
                        if final_response.is_none() {
                            *final_response = Some(observation.summary.clone());
                        }
                        Ok(TurnOutcome::Terminate { reason, success })
                    }
                    PostOutcome::Proceed | PostOutcome::ForceReplan { .. } => {
                        Ok(TurnOutcome::Continue)
                    }
                }
            }
        }
    }

    /// Execute a call, letting the policy engine drive retries with backoff.
    /// Returns the last observation plus what the post-resolution asked for.
    #[allow(clippy::too_many_arguments)]
    async fn execute_with_retries(
        &mut self,
        decision: &Decision,
        call: &crate::core::contracts::ToolCall,
        state: &AgentState,
        backoff: &mut Backoff,
        budget: Budget,
        policy_cfg: &ErrorHandlingPolicy,
        cancel: &CancellationToken,
        started: Instant,
    ) -> (Observation, PostOutcome) {
        let mut attempt = 1u32;
        let mut current_call = call.clone();

        loop {
            let remaining = budget.max_wall_clock.saturating_sub(started.elapsed());
            let exec_started = Instant::now();
            let result = self
                .executor
                .execute(&current_call, &self.tool_ctx, cancel, attempt, Some(remaining))
                .await;
            self.events.emit(AgentEvent::ToolCalled {
                tool_name: current_call.tool_name.clone(),
                args: current_call.args.clone(),
                result: result.clone(),
                attempt,
                duration: exec_started.elapsed(),
            });

            let observation = normalize(&current_call.tool_name, &result);

            // The in-flight call is the authoritative last action for the
            // policy's retry resolution.
            let mut resolve_state = state.clone();
            resolve_state.last_action = Some(current_call.clone());
            let action_post = policy::resolve(decision, Some(&observation), policy_cfg, &resolve_state);

            match action_post {
                Action::CallTool {
                    call: retry_call,
                    is_retry: true,
                } => {
                    let delay = backoff.delay(attempt);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return (
                                observation,
                                PostOutcome::Terminate {
                                    reason: STOP_CANCELLED.to_string(),
                                    success: false,
                                },
                            );
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                    current_call = retry_call;
                }
                Action::CallTool { .. } => return (observation, PostOutcome::Proceed),
                Action::Stop { reason } => {
                    let success = is_completion_reason(&reason);
                    return (observation, PostOutcome::Terminate { reason, success });
                }
                Action::Replan { new_subgoals } => {
                    // Applied as the next turn's decision instead of a
                    // planner call.
                    return (
                        observation,
                        PostOutcome::ForceReplan {
                            subgoals: new_subgoals,
                        },
                    );
                }
                Action::AskUser { question, .. } => {
                    return (
                        observation,
                        PostOutcome::Terminate {
                            reason: format!("ask_user: {}", question),
                            success: false,
                        },
                    );
                }
            }
        }
    }

    async fn review(
        &self,
        state: &AgentState,
        decision: &Decision,
        observation: Option<&Observation>,
        cancel: &CancellationToken,
    ) -> Result<Option<Decision>> {
        match &self.critic {
            Some(critic) => critic.review(state, decision, observation, cancel).await,
            None => Ok(None),
        }
    }

    fn emit_turn_completed(&self, state: &AgentState) {
        self.events.emit(AgentEvent::TurnCompleted {
            turn_index: state.turn_index,
            state: state.clone(),
        });
    }
}
