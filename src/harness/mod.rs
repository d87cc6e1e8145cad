//! Scenario runner / benchmark harness
//!
//! Drives the agent loop from declarative scenarios: provision a workspace,
//! inject prompts and mocked LLM/tool behavior, run the loop, capture tool
//! invocations and LLM interactions, validate, and report. The harness is
//! not part of the loop — it only drives it.

mod builtin;
mod mock_llm;
mod runner;
mod scenario;
mod validation;
mod workspace;

pub use builtin::{builtin_scenarios, find_scenario};
pub use mock_llm::{MockLlmProvider, RecordingProvider, ScriptedTool};
pub use runner::{LlmMode, ScenarioRunner};
pub use scenario::{
    BenchmarkMetrics, BenchmarkResult, BenchmarkScenario, ContentMatch, ContextInjection,
    ExpectedToolInvocation, FileContentExpectation, InjectedFile, LlmInteractionRecord,
    MockToolSpec, ScriptedReply, ToolInvocationRecord, ValidationConfig, ValidationOutcome,
    WorkspaceConfig, WorkspaceSource,
};
pub use validation::validate;
pub use workspace::Workspace;
