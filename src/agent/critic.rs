//! Critic - optional post-hoc reviewer
//!
//! Reviews a turn after policy resolution and may override the *next* turn's
//! planner decision with a replan or an early stop. A critic that returns
//! `None` leaves the loop alone.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent::prompts::critic_system_prompt;
use crate::agent::types::{GenerationOptions, Message};
use crate::core::contracts::{AgentState, Decision, Observation};
use crate::core::provider::{CompletionRequest, LlmProvider};
use crate::error::Result;
use crate::tools::ToolRegistry;

/// Reviews turns and may override the next planner decision
#[async_trait]
pub trait Critic: Send + Sync {
    async fn review(
        &self,
        state: &AgentState,
        decision: &Decision,
        observation: Option<&Observation>,
        cancel: &CancellationToken,
    ) -> Result<Option<Decision>>;
}

/// LLM-backed critic. Asks the model to answer OK, `REPLAN: <subgoals>`,
/// or `STOP: <reason>` and parses the verdict leniently.
pub struct LlmCritic {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    options: GenerationOptions,
}

impl LlmCritic {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        LlmCritic {
            provider,
            tools,
            options: GenerationOptions::balanced(),
        }
    }

    /// Parse the critic's verdict. Unrecognized replies mean no override.
    fn parse_verdict(reply: &str) -> Option<Decision> {
        let trimmed = reply.trim();
        if let Some(rest) = trimmed.strip_prefix("REPLAN:") {
            let subgoals: Vec<String> = rest
                .lines()
                .map(|l| l.trim().trim_start_matches('-').trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            if subgoals.is_empty() {
                return None;
            }
            return Some(Decision::Replan {
                new_subgoals: subgoals,
            });
        }
        if let Some(rest) = trimmed.strip_prefix("STOP:") {
            return Some(Decision::Stop {
                reason: rest.trim().to_string(),
            });
        }
        None
    }
}

#[async_trait]
impl Critic for LlmCritic {
    async fn review(
        &self,
        state: &AgentState,
        decision: &Decision,
        observation: Option<&Observation>,
        cancel: &CancellationToken,
    ) -> Result<Option<Decision>> {
        let system = critic_system_prompt(state, &self.tools)?;
        let mut summary = format!("The planner decided: {}.", decision.label());
        if let Some(obs) = observation {
            summary.push_str(&format!(" Outcome: {}", obs.summary));
        }

        let request = CompletionRequest {
            messages: vec![Message::system(system), Message::user(summary)],
            tools: Vec::new(),
            options: self.options.clone(),
        };

        let response = self.provider.complete(request, cancel).await?;
        let verdict = Self::parse_verdict(&response.content);
        if let Some(ref v) = verdict {
            debug!(verdict = v.label(), "critic override");
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_means_no_override() {
        assert!(LlmCritic::parse_verdict("OK").is_none());
        assert!(LlmCritic::parse_verdict("looks fine to me").is_none());
        assert!(LlmCritic::parse_verdict("").is_none());
    }

    #[test]
    fn replan_verdict_collects_subgoals() {
        let verdict = LlmCritic::parse_verdict("REPLAN:\n- check the directory first\n- then read");
        match verdict {
            Some(Decision::Replan { new_subgoals }) => {
                assert_eq!(new_subgoals, vec!["check the directory first", "then read"]);
            }
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[test]
    fn replan_without_subgoals_is_no_override() {
        assert!(LlmCritic::parse_verdict("REPLAN:").is_none());
    }

    #[test]
    fn stop_verdict_carries_reason() {
        match LlmCritic::parse_verdict("STOP: goal already satisfied") {
            Some(Decision::Stop { reason }) => assert_eq!(reason, "goal already satisfied"),
            other => panic!("unexpected verdict: {:?}", other),
        }
    }
}
