//! Declarative benchmark scenarios and their result records
//!
//! A scenario describes everything a run needs: workspace seeding, the
//! prompts to feed the agent, the scripted mock-LLM replies (mock mode),
//! expected tool invocations, and validation predicates. Scenarios are
//! immutable once constructed; they can be authored in code or loaded from
//! a JSON file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::Usage;
use crate::core::contracts::{ErrorHandlingPolicy, ToolErrorCode};
use crate::error::{Error, Result};

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_min_invocations() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// A complete scenario definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkScenario {
    /// Stable scenario id, e.g. `fs-read-file-basic`
    pub id: String,
    /// Grouping category, e.g. `filesystem`
    #[serde(default)]
    pub category: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Workspace seeding
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Prompts, mock script, and mock tools
    pub context: ContextInjection,
    /// Expected tool invocations for validation
    #[serde(default)]
    pub expected_tools: Vec<ExpectedToolInvocation>,
    /// Content and workspace predicates
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Whole-scenario timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

impl BenchmarkScenario {
    /// Load a scenario from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Scenario(format!("cannot read scenario file: {}", e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Scenario(format!("cannot parse scenario file: {}", e)))
    }
}

/// How the scenario workspace is provisioned
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Base content source
    #[serde(default)]
    pub source: WorkspaceSource,
    /// Files to inject (created after the source is applied)
    #[serde(default)]
    pub files: Vec<InjectedFile>,
    /// Empty directories to create
    #[serde(default)]
    pub directories: Vec<String>,
}

/// Where the workspace's initial content comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkspaceSource {
    /// Fresh empty temp directory
    #[default]
    Ephemeral,
    /// Recursive copy of an existing directory
    CopyFrom { path: PathBuf },
}

/// A file seeded into the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectedFile {
    /// Workspace-relative path
    pub path: String,
    /// File content
    pub content: String,
}

/// Prompts and mocked context for a scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextInjection {
    /// Extra system-level constraint added to every goal
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// User prompts; each one drives a full loop run on the same conversation
    pub prompts: Vec<String>,
    /// Scripted mock-LLM replies, consumed in order (mock mode only)
    #[serde(default)]
    pub llm_script: Vec<ScriptedReply>,
    /// Extra mock tools registered alongside the filesystem set
    #[serde(default)]
    pub mock_tools: Vec<MockToolSpec>,
    /// Turn budget per prompt (defaults applied by the runner)
    #[serde(default)]
    pub max_turns: Option<u32>,
    /// Error-handling policy override
    #[serde(default)]
    pub policy: Option<ErrorHandlingPolicy>,
}

/// One scripted mock-LLM reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptedReply {
    /// Reply with a single tool call
    ToolCall { tool_name: String, args: Value },
    /// Reply with a final assistant message
    Final { content: String },
}

/// A mock tool that fails a fixed number of times, then succeeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockToolSpec {
    /// Tool name to register
    pub name: String,
    /// How many leading attempts fail
    #[serde(default)]
    pub fail_attempts: u32,
    /// Error code for the failing attempts
    #[serde(default = "default_mock_error")]
    pub error_code: ToolErrorCode,
    /// Data returned on success
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_mock_error() -> ToolErrorCode {
    ToolErrorCode::RetryableServer
}

/// Expected invocations of one tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedToolInvocation {
    /// Tool name
    pub tool_name: String,
    /// Minimum matching invocations (0 is allowed when a content predicate
    /// covers the refusal path)
    #[serde(default = "default_min_invocations")]
    pub min_invocations: u32,
    /// Maximum matching invocations
    #[serde(default)]
    pub max_invocations: Option<u32>,
    /// Argument subset every counted invocation must contain
    #[serde(default)]
    pub args_subset: Option<Value>,
}

/// A substring predicate: passes when *any* of the alternatives matches
/// (case-insensitive)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMatch {
    pub any: Vec<String>,
}

impl ContentMatch {
    pub fn new(alternatives: &[&str]) -> Self {
        ContentMatch {
            any: alternatives.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Case-insensitive containment over the alternatives
    pub fn matches(&self, haystack: &str) -> bool {
        let lower = haystack.to_lowercase();
        self.any.iter().any(|needle| lower.contains(&needle.to_lowercase()))
    }
}

/// Expected exact content of a workspace file after the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContentExpectation {
    pub path: String,
    pub equals: String,
}

/// Validation predicates for a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Whether the (last) run must terminate successfully
    #[serde(default = "default_true")]
    pub expect_success: bool,
    /// Predicates over the final assistant response
    #[serde(default)]
    pub response_matches: Vec<ContentMatch>,
    /// Predicates over any captured tool result
    #[serde(default)]
    pub tool_result_matches: Vec<ContentMatch>,
    /// Predicates over the final stop reason
    #[serde(default)]
    pub stop_reason_matches: Vec<ContentMatch>,
    /// Workspace paths that must exist after the run
    #[serde(default)]
    pub files_present: Vec<String>,
    /// Workspace paths that must not exist after the run
    #[serde(default)]
    pub files_absent: Vec<String>,
    /// Exact file contents after the run
    #[serde(default)]
    pub file_contents: Vec<FileContentExpectation>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            expect_success: true,
            response_matches: Vec::new(),
            tool_result_matches: Vec::new(),
            stop_reason_matches: Vec::new(),
            files_present: Vec::new(),
            files_absent: Vec::new(),
            file_contents: Vec::new(),
        }
    }
}

/// One captured tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    pub args: Value,
    pub ok: bool,
    pub error_code: ToolErrorCode,
    pub attempt: u32,
    /// Result as rendered for the LLM
    pub rendered: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// One captured LLM round-trip
#[derive(Debug, Clone)]
pub struct LlmInteractionRecord {
    /// The full request message sequence
    pub request_messages: Vec<crate::agent::Message>,
    /// Short description of the reply (tool call vs final text)
    pub response_summary: String,
    /// Token usage, when reported
    pub usage: Option<Usage>,
}

/// Outcome of a single validation check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub check: String,
    pub passed: bool,
    pub detail: String,
}

/// Aggregate run metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub turns: u32,
    pub tool_calls: u32,
    pub usage: Usage,
}

/// Everything a scenario run produced
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub scenario_id: String,
    pub success: bool,
    pub duration: Duration,
    pub tool_invocations: Vec<ToolInvocationRecord>,
    pub llm_interactions: Vec<LlmInteractionRecord>,
    pub validation_results: Vec<ValidationOutcome>,
    pub metrics: BenchmarkMetrics,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl BenchmarkResult {
    /// A result for a scenario that failed before producing anything
    pub fn failed(scenario_id: &str, duration: Duration, error: impl Into<String>) -> Self {
        BenchmarkResult {
            scenario_id: scenario_id.to_string(),
            success: false,
            duration,
            tool_invocations: Vec::new(),
            llm_interactions: Vec::new(),
            validation_results: Vec::new(),
            metrics: BenchmarkMetrics::default(),
            error_message: Some(error.into()),
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_match_is_case_insensitive_any_of() {
        let m = ContentMatch::new(&["exists", "already"]);
        assert!(m.matches("The file ALREADY has content"));
        assert!(m.matches("it exists"));
        assert!(!m.matches("fresh and new"));
    }

    #[test]
    fn scenario_round_trips_through_json() {
        let scenario = BenchmarkScenario {
            id: "demo".into(),
            category: "filesystem".into(),
            description: "demo scenario".into(),
            tags: vec!["smoke".into()],
            workspace: WorkspaceConfig {
                source: WorkspaceSource::Ephemeral,
                files: vec![InjectedFile {
                    path: "a.txt".into(),
                    content: "x".into(),
                }],
                directories: vec!["sub".into()],
            },
            context: ContextInjection {
                system_prompt: None,
                prompts: vec!["read a.txt".into()],
                llm_script: vec![
                    ScriptedReply::ToolCall {
                        tool_name: "read_file".into(),
                        args: json!({"file_path": "a.txt"}),
                    },
                    ScriptedReply::Final {
                        content: "done".into(),
                    },
                ],
                mock_tools: vec![],
                max_turns: Some(5),
                policy: None,
            },
            expected_tools: vec![ExpectedToolInvocation {
                tool_name: "read_file".into(),
                min_invocations: 1,
                max_invocations: Some(1),
                args_subset: Some(json!({"file_path": "a.txt"})),
            }],
            validation: ValidationConfig::default(),
            timeout: Duration::from_secs(30),
        };

        let encoded = serde_json::to_string_pretty(&scenario).unwrap();
        let decoded: BenchmarkScenario = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, "demo");
        assert_eq!(decoded.context.prompts.len(), 1);
        assert_eq!(decoded.timeout, Duration::from_secs(30));
        assert!(matches!(
            decoded.context.llm_script[0],
            ScriptedReply::ToolCall { .. }
        ));
    }

    #[test]
    fn scenario_defaults_fill_in() {
        let decoded: BenchmarkScenario = serde_json::from_str(
            r#"{
                "id": "min",
                "context": { "prompts": ["do something"] }
            }"#,
        )
        .unwrap();
        assert_eq!(decoded.timeout, Duration::from_secs(60));
        assert!(decoded.validation.expect_success);
        assert!(decoded.expected_tools.is_empty());
    }

    #[test]
    fn load_rejects_missing_file() {
        assert!(BenchmarkScenario::load("/definitely/not/here.json").is_err());
    }
}
