//! Stuck-loop detection.
//!
//! The planner can wedge itself calling one tool over and over while the
//! tool keeps answering the same thing. The guard watches for such a streak
//! and hands the loop replacement subgoals so the next turn replans instead
//! of burning budget.

use std::hash::{DefaultHasher, Hash, Hasher};

/// How much of a result participates in repeat comparison
const RESULT_PREFIX_CHARS: usize = 200;

/// Watches consecutive tool outcomes for a repeat streak.
pub struct LoopGuard {
    /// Fingerprint of the most recent (tool, result) pair, if any
    last: Option<u64>,
    /// Consecutive sightings of that fingerprint
    streak: usize,
    /// Streak length that forces a replan
    threshold: usize,
}

impl LoopGuard {
    /// Create a guard that fires after `threshold` consecutive identical
    /// outcomes from the same tool. Anything below 2 cannot distinguish a
    /// repeat from a first call, so the floor is 2.
    pub fn new(threshold: usize) -> Self {
        LoopGuard {
            last: None,
            streak: 0,
            threshold: threshold.max(2),
        }
    }

    /// Note one executed call and its rendered result. Returns replacement
    /// subgoals once the streak reaches the threshold; the guard re-arms
    /// itself afterwards.
    pub fn record(&mut self, tool_name: &str, result: &str) -> Option<Vec<String>> {
        let fingerprint = Self::fingerprint(tool_name, result);
        if self.last == Some(fingerprint) {
            self.streak += 1;
        } else {
            self.last = Some(fingerprint);
            self.streak = 1;
        }

        if self.streak < self.threshold {
            return None;
        }

        self.reset();
        Some(vec![
            format!("stop_repeating_{}", tool_name),
            "use_different_tool".to_string(),
        ])
    }

    /// Forget any ongoing streak (between runs, or after firing).
    pub fn reset(&mut self) {
        self.last = None;
        self.streak = 0;
    }

    /// Hash the tool name together with a bounded result prefix. Comparing a
    /// prefix keeps large payloads cheap while still catching tools that
    /// answer identically every time.
    fn fingerprint(tool_name: &str, result: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        tool_name.hash(&mut hasher);
        for c in result.chars().take(RESULT_PREFIX_CHARS) {
            c.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varied_results_never_trigger() {
        let mut guard = LoopGuard::new(3);
        assert!(guard.record("list_directory", r#"{"count":1}"#).is_none());
        assert!(guard.record("list_directory", r#"{"count":2}"#).is_none());
        assert!(guard.record("list_directory", r#"{"count":3}"#).is_none());
    }

    #[test]
    fn repeated_outcome_forces_replan() {
        let mut guard = LoopGuard::new(3);
        let result = "Error: not_found - no such file";
        assert!(guard.record("read_file", result).is_none());
        assert!(guard.record("read_file", result).is_none());
        let subgoals = guard.record("read_file", result).unwrap();
        assert_eq!(subgoals[0], "stop_repeating_read_file");
        assert!(subgoals.contains(&"use_different_tool".to_string()));
    }

    #[test]
    fn alternating_tools_reset_the_streak() {
        let mut guard = LoopGuard::new(3);
        let result = "Error: permission_denied - path is outside the workspace";
        assert!(guard.record("read_file", result).is_none());
        assert!(guard.record("list_directory", result).is_none());
        assert!(guard.record("read_file", result).is_none());
        assert!(guard.record("list_directory", result).is_none());
    }

    #[test]
    fn guard_rearms_after_firing() {
        let mut guard = LoopGuard::new(2);
        let result = r#"{"count":0,"entries":[]}"#;
        assert!(guard.record("list_directory", result).is_none());
        assert!(guard.record("list_directory", result).is_some());
        // Fresh streak after the guard fired
        assert!(guard.record("list_directory", result).is_none());
    }

    #[test]
    fn reset_clears_an_ongoing_streak() {
        let mut guard = LoopGuard::new(2);
        let result = "ok (no data)";
        assert!(guard.record("move_file", result).is_none());
        guard.reset();
        assert!(guard.record("move_file", result).is_none());
        assert!(guard.record("move_file", result).is_some());
    }

    #[test]
    fn only_the_result_prefix_is_compared() {
        let mut guard = LoopGuard::new(2);
        let long_a = format!("{}tail-one", "x".repeat(RESULT_PREFIX_CHARS));
        let long_b = format!("{}tail-two", "x".repeat(RESULT_PREFIX_CHARS));
        assert!(guard.record("read_file", &long_a).is_none());
        // Identical within the compared prefix, so it counts as a repeat.
        assert!(guard.record("read_file", &long_b).is_some());
    }
}
