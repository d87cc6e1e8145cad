//! Observation normalizer
//!
//! Converts a raw tool result into a compact, LLM-friendly observation:
//! a one-line summary, a small bounded set of key facts, and affordance tags
//! hinting at viable next steps. Pure and deterministic — no I/O, no clocks.

use indexmap::IndexMap;
use serde_json::Value;

use crate::core::contracts::{affordances, Observation, ToolErrorCode, ToolResult};

/// Upper bound on extracted data facts (on top of the fixed execution facts)
const MAX_DATA_FACTS: usize = 8;

/// Keys whose presence marks a paginated result shape
const PAGINATION_KEYS: &[&str] = &["next_page", "has_more", "cursor", "next_cursor", "page_token"];

/// Normalize a tool result into an observation
pub fn normalize(tool_name: &str, result: &ToolResult) -> Observation {
    Observation {
        summary: summarize(tool_name, result),
        key_facts: extract_key_facts(result),
        affordances: derive_affordances(result),
        raw: result.clone(),
    }
}

fn summarize(tool_name: &str, result: &ToolResult) -> String {
    if result.ok {
        if result.data.is_some() {
            format!("Tool '{}' executed successfully", tool_name)
        } else {
            format!("Tool '{}' completed with no data", tool_name)
        }
    } else {
        format!(
            "Tool '{}' failed: {} - {}",
            tool_name,
            result.error_code,
            result.error_details.as_deref().unwrap_or("no details")
        )
    }
}

fn extract_key_facts(result: &ToolResult) -> IndexMap<String, String> {
    let mut facts = IndexMap::new();
    facts.insert(
        "execution_time_ms".to_string(),
        format!("{:.2}", result.latency.as_secs_f64() * 1000.0),
    );
    facts.insert("attempt".to_string(), result.attempt.to_string());

    match &result.data {
        Some(Value::Object(map)) => {
            for (key, value) in map.iter().filter(|(_, v)| is_scalar(v)).take(MAX_DATA_FACTS) {
                facts.insert(key.clone(), compact_literal(value));
            }
        }
        Some(Value::Array(items)) => {
            facts.insert("result_count".to_string(), items.len().to_string());
            if let Some(Value::Object(first)) = items.first() {
                for (key, value) in first.iter().filter(|(_, v)| is_scalar(v)).take(MAX_DATA_FACTS) {
                    facts.insert(format!("first_{}", key), compact_literal(value));
                }
            }
        }
        _ => {}
    }

    facts
}

fn derive_affordances(result: &ToolResult) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    match result.error_code {
        ToolErrorCode::Timeout | ToolErrorCode::RetryableServer => {
            tags.push(affordances::RETRY_WITH_BACKOFF.to_string());
        }
        ToolErrorCode::InvalidInput => {
            tags.push(affordances::FIX_PARAMETERS.to_string());
            tags.push(affordances::ASK_USER_FOR_CLARIFICATION.to_string());
        }
        _ => {}
    }

    if has_pagination_shape(result.data.as_ref()) {
        tags.push(affordances::FETCH_NEXT_PAGE.to_string());
        tags.push(affordances::FETCH_MORE_RESULTS.to_string());
        tags.push(affordances::PROCESS_RESULTS.to_string());
    }

    tags.push(affordances::USE_DIFFERENT_TOOL.to_string());
    tags.push(affordances::ASK_USER_FOR_GUIDANCE.to_string());

    tags
}

fn has_pagination_shape(data: Option<&Value>) -> bool {
    match data {
        Some(Value::Object(map)) => PAGINATION_KEYS.iter().any(|k| map.contains_key(*k)),
        _ => false,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn compact_literal(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn ok_result(data: Option<Value>) -> ToolResult {
        ToolResult::success(data, 1, Duration::from_millis(12))
    }

    #[test]
    fn summary_for_success_with_data() {
        let obs = normalize("read_file", &ok_result(Some(json!({"content": "x"}))));
        assert_eq!(obs.summary, "Tool 'read_file' executed successfully");
    }

    #[test]
    fn summary_for_success_without_data() {
        let obs = normalize("noop", &ok_result(None));
        assert_eq!(obs.summary, "Tool 'noop' completed with no data");
    }

    #[test]
    fn summary_for_failure() {
        let result = ToolResult::failure(
            ToolErrorCode::Timeout,
            "deadline exceeded",
            2,
            Duration::from_millis(5),
        );
        let obs = normalize("fetch", &result);
        assert_eq!(obs.summary, "Tool 'fetch' failed: timeout - deadline exceeded");
    }

    #[test]
    fn key_facts_always_include_timing_and_attempt() {
        let result = ToolResult::success(None, 3, Duration::from_micros(12345));
        let obs = normalize("t", &result);
        assert_eq!(obs.key_facts["execution_time_ms"], "12.35");
        assert_eq!(obs.key_facts["attempt"], "3");
        assert_eq!(obs.key_facts["attempt"], obs.raw.attempt.to_string());
    }

    #[test]
    fn object_scalars_become_facts_bounded() {
        let mut big = serde_json::Map::new();
        for i in 0..20 {
            big.insert(format!("k{:02}", i), json!(i));
        }
        big.insert("nested".to_string(), json!({"inner": 1}));
        let obs = normalize("t", &ok_result(Some(Value::Object(big))));
        // 2 fixed facts + at most MAX_DATA_FACTS scalars, nested object skipped
        assert_eq!(obs.key_facts.len(), 2 + MAX_DATA_FACTS);
        assert_eq!(obs.key_facts["k00"], "0");
    }

    #[test]
    fn array_yields_result_count_and_first_digest() {
        let data = json!([
            {"id": "a1", "size": 10, "tags": ["x"]},
            {"id": "a2", "size": 20}
        ]);
        let obs = normalize("search", &ok_result(Some(data)));
        assert_eq!(obs.key_facts["result_count"], "2");
        assert_eq!(obs.key_facts["first_id"], "\"a1\"");
        assert_eq!(obs.key_facts["first_size"], "10");
        assert!(!obs.key_facts.contains_key("first_tags"));
    }

    #[test]
    fn empty_array_yields_zero_count() {
        let obs = normalize("search", &ok_result(Some(json!([]))));
        assert_eq!(obs.key_facts["result_count"], "0");
    }

    #[test]
    fn transient_failure_affords_retry() {
        let result =
            ToolResult::failure(ToolErrorCode::RetryableServer, "503", 1, Duration::ZERO);
        let obs = normalize("t", &result);
        assert!(obs.affordances.contains(&affordances::RETRY_WITH_BACKOFF.to_string()));
    }

    #[test]
    fn invalid_input_affords_fixing_or_asking() {
        let result = ToolResult::failure(ToolErrorCode::InvalidInput, "bad", 1, Duration::ZERO);
        let obs = normalize("t", &result);
        assert!(obs.affordances.contains(&affordances::FIX_PARAMETERS.to_string()));
        assert!(obs
            .affordances
            .contains(&affordances::ASK_USER_FOR_CLARIFICATION.to_string()));
    }

    #[test]
    fn pagination_shape_affords_fetching_more() {
        let obs = normalize("t", &ok_result(Some(json!({"items": [], "has_more": true}))));
        assert!(obs.affordances.contains(&affordances::FETCH_NEXT_PAGE.to_string()));
        assert!(obs.affordances.contains(&affordances::FETCH_MORE_RESULTS.to_string()));
        assert!(obs.affordances.contains(&affordances::PROCESS_RESULTS.to_string()));
    }

    #[test]
    fn universal_affordances_always_present() {
        let obs = normalize("t", &ok_result(None));
        assert!(obs.affordances.contains(&affordances::USE_DIFFERENT_TOOL.to_string()));
        assert!(obs
            .affordances
            .contains(&affordances::ASK_USER_FOR_GUIDANCE.to_string()));
    }

    #[test]
    fn normalize_is_deterministic() {
        let result = ToolResult::success(
            Some(json!({"b": 2, "a": 1})),
            2,
            Duration::from_millis(7),
        );
        let a = normalize("t", &result);
        let b = normalize("t", &result);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.key_facts, b.key_facts);
        assert_eq!(a.affordances, b.affordances);
    }
}
