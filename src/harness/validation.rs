//! Scenario validation
//!
//! Turns the captured run artifacts — terminal results, tool invocations,
//! workspace contents — into a flat list of pass/fail outcomes. Runs while
//! the workspace is still alive so file predicates can look at real state.

use std::path::Path;

use crate::core::contracts::AgentResult;
use crate::harness::scenario::{
    BenchmarkScenario, ToolInvocationRecord, ValidationOutcome,
};

/// Evaluate every configured check for a scenario
pub fn validate(
    scenario: &BenchmarkScenario,
    workspace: &Path,
    results: &[AgentResult],
    invocations: &[ToolInvocationRecord],
) -> Vec<ValidationOutcome> {
    let mut outcomes = Vec::new();
    let last = results.last();

    // Terminal state
    let actual_success = last.map(|r| r.success).unwrap_or(false);
    outcomes.push(ValidationOutcome {
        check: "terminal_state".into(),
        passed: actual_success == scenario.validation.expect_success,
        detail: format!(
            "expected success={}, got success={} (stop_reason: {})",
            scenario.validation.expect_success,
            actual_success,
            last.map(|r| r.stop_reason.as_str()).unwrap_or("<no runs>")
        ),
    });

    // Expected tool invocations
    for expected in &scenario.expected_tools {
        let matching = invocations
            .iter()
            .filter(|inv| inv.tool_name == expected.tool_name)
            .filter(|inv| match &expected.args_subset {
                Some(subset) => args_contain(&inv.args, subset),
                None => true,
            })
            .count() as u32;

        let within_min = matching >= expected.min_invocations;
        let within_max = expected
            .max_invocations
            .map(|max| matching <= max)
            .unwrap_or(true);
        outcomes.push(ValidationOutcome {
            check: format!("tool_invocations:{}", expected.tool_name),
            passed: within_min && within_max,
            detail: format!(
                "{} matching invocations (min {}, max {})",
                matching,
                expected.min_invocations,
                expected
                    .max_invocations
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "∞".into())
            ),
        });
    }

    // Final response content
    let final_response = last
        .and_then(|r| r.final_response.clone())
        .unwrap_or_default();
    for (index, predicate) in scenario.validation.response_matches.iter().enumerate() {
        outcomes.push(ValidationOutcome {
            check: format!("response_matches[{}]", index),
            passed: predicate.matches(&final_response),
            detail: format!("any of {:?} in final response", predicate.any),
        });
    }

    // Tool result content (any invocation)
    for (index, predicate) in scenario.validation.tool_result_matches.iter().enumerate() {
        let passed = invocations.iter().any(|inv| predicate.matches(&inv.rendered));
        outcomes.push(ValidationOutcome {
            check: format!("tool_result_matches[{}]", index),
            passed,
            detail: format!("any of {:?} in some tool result", predicate.any),
        });
    }

    // Stop reason content
    let stop_reason = last.map(|r| r.stop_reason.clone()).unwrap_or_default();
    for (index, predicate) in scenario.validation.stop_reason_matches.iter().enumerate() {
        outcomes.push(ValidationOutcome {
            check: format!("stop_reason_matches[{}]", index),
            passed: predicate.matches(&stop_reason),
            detail: format!("any of {:?} in stop reason '{}'", predicate.any, stop_reason),
        });
    }

    // Workspace expectations
    for path in &scenario.validation.files_present {
        let exists = workspace.join(path).exists();
        outcomes.push(ValidationOutcome {
            check: format!("file_present:{}", path),
            passed: exists,
            detail: format!("'{}' exists={}", path, exists),
        });
    }
    for path in &scenario.validation.files_absent {
        let exists = workspace.join(path).exists();
        outcomes.push(ValidationOutcome {
            check: format!("file_absent:{}", path),
            passed: !exists,
            detail: format!("'{}' exists={}", path, exists),
        });
    }
    for expectation in &scenario.validation.file_contents {
        let actual = std::fs::read_to_string(workspace.join(&expectation.path)).ok();
        let passed = actual.as_deref() == Some(expectation.equals.as_str());
        outcomes.push(ValidationOutcome {
            check: format!("file_content:{}", expectation.path),
            passed,
            detail: match actual {
                Some(_) => format!("'{}' content comparison: {}", expectation.path, passed),
                None => format!("'{}' unreadable", expectation.path),
            },
        });
    }

    outcomes
}

/// Whether `args` contains every key of `subset` with an equal value
fn args_contain(args: &serde_json::Value, subset: &serde_json::Value) -> bool {
    match (args.as_object(), subset.as_object()) {
        (Some(args), Some(subset)) => subset
            .iter()
            .all(|(key, expected)| args.get(key) == Some(expected)),
        _ => false,
    }
}
