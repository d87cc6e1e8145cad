//! Scenario runner
//!
//! Drives the agent loop from a declarative scenario through the phases
//! `SettingUpWorkspace → Running → Validating → Reporting → CleaningUp →
//! Done`. A failure in any phase jumps straight to cleanup with the error
//! captured; the workspace is removed on every exit path.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::{
    AgentEvent, AgentLoop, ConversationManager, Executor, LlmPlanner, OpenAiCompatClient,
    StateManager,
};
use crate::config::RuntimeConfig;
use crate::core::contracts::{AgentGoal, AgentResult, Budget};
use crate::core::provider::LlmProvider;
use crate::core::store::InMemoryStateStore;
use crate::error::Result;
use crate::harness::mock_llm::{MockLlmProvider, RecordingProvider, ScriptedTool};
use crate::harness::scenario::{
    BenchmarkMetrics, BenchmarkResult, BenchmarkScenario, LlmInteractionRecord,
    ToolInvocationRecord,
};
use crate::harness::validation::validate;
use crate::harness::workspace::Workspace;
use crate::tools::{filesystem_registry, ToolContext};

/// Which provider backs the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMode {
    /// Scripted mock provider (deterministic, offline)
    Mock,
    /// OpenAI-compatible HTTP provider (needs an API key)
    Real,
}

/// Scenario lifecycle phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScenarioPhase {
    SettingUpWorkspace,
    Running,
    Validating,
    Reporting,
    CleaningUp,
    Done,
}

/// Everything captured while driving the loop
struct RunArtifacts {
    results: Vec<AgentResult>,
    invocations: Vec<ToolInvocationRecord>,
    interactions: Vec<LlmInteractionRecord>,
    metrics: BenchmarkMetrics,
}

/// Runs scenarios against the agent loop
pub struct ScenarioRunner {
    mode: LlmMode,
    config: RuntimeConfig,
}

impl ScenarioRunner {
    pub fn new(mode: LlmMode, config: RuntimeConfig) -> Self {
        ScenarioRunner { mode, config }
    }

    /// Run one scenario to a `BenchmarkResult`
    pub async fn run(&self, scenario: &BenchmarkScenario) -> BenchmarkResult {
        let started = Instant::now();
        let mut phase = ScenarioPhase::SettingUpWorkspace;
        info!(scenario = %scenario.id, ?phase, "scenario starting");

        let workspace = match Workspace::provision(&scenario.workspace).await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!(scenario = %scenario.id, "workspace setup failed: {}", e);
                return BenchmarkResult::failed(&scenario.id, started.elapsed(), e.to_string());
            }
        };
        let workspace_path = workspace.path().to_path_buf();

        phase = ScenarioPhase::Running;
        info!(scenario = %scenario.id, ?phase, "driving the loop");
        let driven = tokio::time::timeout(scenario.timeout, self.drive(scenario, workspace.path())).await;

        let mut result = match driven {
            Err(_) => BenchmarkResult::failed(
                &scenario.id,
                started.elapsed(),
                format!("scenario timed out after {:?}", scenario.timeout),
            ),
            Ok(Err(e)) => BenchmarkResult::failed(&scenario.id, started.elapsed(), e.to_string()),
            Ok(Ok(artifacts)) => {
                phase = ScenarioPhase::Validating;
                info!(scenario = %scenario.id, ?phase, "validating");
                let validation_results = validate(
                    scenario,
                    workspace.path(),
                    &artifacts.results,
                    &artifacts.invocations,
                );
                let all_passed = validation_results.iter().all(|o| o.passed);
                for failed in validation_results.iter().filter(|o| !o.passed) {
                    warn!(scenario = %scenario.id, check = %failed.check, detail = %failed.detail, "validation failed");
                }

                phase = ScenarioPhase::Reporting;
                info!(scenario = %scenario.id, ?phase, all_passed, "reporting");
                BenchmarkResult {
                    scenario_id: scenario.id.clone(),
                    success: all_passed,
                    duration: started.elapsed(),
                    tool_invocations: artifacts.invocations,
                    llm_interactions: artifacts.interactions,
                    validation_results,
                    metrics: artifacts.metrics,
                    error_message: None,
                    metadata: Default::default(),
                }
            }
        };

        phase = ScenarioPhase::CleaningUp;
        info!(scenario = %scenario.id, ?phase, "cleaning up workspace");
        if let Err(e) = workspace.close() {
            // Cleanup failure degrades the result rather than being swallowed.
            error!(scenario = %scenario.id, "cleanup failed: {}", e);
            result.success = false;
            result
                .error_message
                .get_or_insert_with(|| format!("workspace cleanup failed: {}", e));
        }

        result.metadata.insert(
            "workspace_path".into(),
            json!(workspace_path.display().to_string()),
        );
        result
            .metadata
            .insert("llm_mode".into(), json!(format!("{:?}", self.mode)));

        phase = ScenarioPhase::Done;
        info!(
            scenario = %scenario.id,
            ?phase,
            success = result.success,
            duration_ms = result.duration.as_millis() as u64,
            "scenario finished"
        );
        result
    }

    /// Assemble the loop for a scenario and run every prompt on one
    /// conversation.
    async fn drive(&self, scenario: &BenchmarkScenario, workspace: &Path) -> Result<RunArtifacts> {
        let base_provider: Arc<dyn LlmProvider> = match self.mode {
            LlmMode::Mock => MockLlmProvider::shared(scenario.context.llm_script.clone()),
            LlmMode::Real => Arc::new(OpenAiCompatClient::new(self.config.require_llm()?)?),
        };
        let provider = RecordingProvider::new(base_provider);
        let provider_dyn: Arc<dyn LlmProvider> = provider.clone();

        let mut registry = filesystem_registry()?;
        for spec in &scenario.context.mock_tools {
            registry.register(ScriptedTool::new(spec.clone()))?;
        }
        let registry = Arc::new(registry);

        let planner = Arc::new(
            LlmPlanner::new(provider_dyn, registry.clone())
                .with_parse_retry_budget(self.config.planner_retry_budget),
        );
        let executor =
            Executor::new(registry.clone()).with_default_timeout(self.config.tool_timeout);
        let states = StateManager::new(InMemoryStateStore::shared())
            .with_digest_cap(self.config.digest_cap);
        let tool_ctx = ToolContext::new(workspace, format!("scenario-{}", scenario.id));

        let mut conversation = ConversationManager::new();
        if let Some(max) = self.config.max_history_turns {
            conversation = conversation.with_max_history_turns(max);
        }

        let mut agent = AgentLoop::new(planner, executor, states, tool_ctx)
            .with_conversation(conversation)
            .with_loop_guard_threshold(self.config.loop_guard_threshold)
            .with_backoff_seed(42);
        let mut events = agent.events().subscribe(1024);

        let policy = scenario
            .context
            .policy
            .clone()
            .unwrap_or_else(|| self.config.policy.clone());
        let budget = Budget::new(scenario.context.max_turns.unwrap_or(20), scenario.timeout);
        let cancel = CancellationToken::new();

        let mut results = Vec::new();
        for prompt in &scenario.context.prompts {
            let mut goal = AgentGoal::new(prompt);
            if let Some(system) = &scenario.context.system_prompt {
                goal = goal.with_constraint(system);
            }
            let result = agent.run(goal, budget, &policy, &cancel).await?;
            results.push(result);
        }

        let mut invocations = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let AgentEvent::ToolCalled {
                tool_name,
                args,
                result,
                attempt,
                duration,
            } = event
            {
                invocations.push(ToolInvocationRecord {
                    tool_name,
                    args,
                    ok: result.ok,
                    error_code: result.error_code,
                    attempt,
                    rendered: result.render_for_llm(),
                    duration,
                });
            }
        }

        let interactions = provider.take_interactions().await;
        let mut metrics = BenchmarkMetrics {
            turns: results.iter().map(|r| r.total_turns).sum(),
            tool_calls: invocations.len() as u32,
            ..Default::default()
        };
        for interaction in &interactions {
            if let Some(usage) = interaction.usage {
                metrics.usage.accumulate(&usage);
            }
        }

        Ok(RunArtifacts {
            results,
            invocations,
            interactions,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::builtin::builtin_scenarios;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(LlmMode::Mock, RuntimeConfig::default())
    }

    #[tokio::test]
    async fn runs_the_basic_read_scenario() {
        let scenarios = builtin_scenarios();
        let scenario = scenarios.iter().find(|s| s.id == "fs-read-file-basic").unwrap();

        let result = runner().run(scenario).await;
        assert!(result.success, "{:?}", result.validation_results);
        assert_eq!(result.tool_invocations.len(), 1);
        assert_eq!(result.tool_invocations[0].tool_name, "read_file");
        assert!(result.metrics.turns >= 2);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn workspace_is_gone_after_the_run() {
        let scenarios = builtin_scenarios();
        let scenario = scenarios.iter().find(|s| s.id == "fs-read-file-basic").unwrap();

        let result = runner().run(scenario).await;
        let path = result.metadata["workspace_path"].as_str().unwrap();
        assert!(!std::path::Path::new(path).exists());
    }

    #[tokio::test]
    async fn real_mode_without_key_fails_gracefully() {
        let scenarios = builtin_scenarios();
        let scenario = scenarios.iter().find(|s| s.id == "fs-read-file-basic").unwrap();

        let mut config = RuntimeConfig::default();
        config.llm.api_key = None;
        let result = ScenarioRunner::new(LlmMode::Real, config).run(scenario).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("API_KEY"));
    }
}
