//! State manager
//!
//! Single writer for `AgentState`. Every update takes the previous state by
//! reference and produces a new value; the manager also fronts the pluggable
//! `StateStore` for persistence keyed by trace id.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::debug;

use crate::core::contracts::{AgentGoal, AgentState, Budget, Decision, Observation};
use crate::core::store::StateStore;
use crate::error::Result;

/// Default cap on working-memory digest entries
pub const DEFAULT_DIGEST_CAP: usize = 128;

/// Owns the current `AgentState` lifecycle for a run
pub struct StateManager {
    store: Arc<dyn StateStore>,
    digest_cap: usize,
}

impl StateManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        StateManager {
            store,
            digest_cap: DEFAULT_DIGEST_CAP,
        }
    }

    /// Override the digest cap (entries, FIFO-evicted)
    pub fn with_digest_cap(mut self, cap: usize) -> Self {
        self.digest_cap = cap.max(1);
        self
    }

    /// Build the state a run starts from
    pub fn create_initial(&self, goal: AgentGoal, budget: Budget) -> AgentState {
        AgentState {
            goal,
            subgoals: Vec::new(),
            last_action: None,
            last_observation: None,
            budget,
            turn_index: 0,
            working_memory_digest: IndexMap::new(),
        }
    }

    /// Apply one turn's outcome. Every update increments `turn_index` by
    /// exactly 1; what else changes depends on the decision.
    pub fn update(
        &self,
        state: &AgentState,
        decision: &Decision,
        observation: Option<&Observation>,
        critic_opinion: Option<&Decision>,
    ) -> AgentState {
        let mut next = state.clone();

        match decision {
            Decision::CallTool(call) => {
                next.last_action = Some(call.clone());
                if let Some(obs) = observation {
                    for (key, value) in &obs.key_facts {
                        self.digest_insert(&mut next, format!("fact_{}", key), value.clone());
                    }
                    next.last_observation = Some(obs.clone());
                }
            }
            Decision::Replan { new_subgoals } => {
                next.subgoals = new_subgoals.clone();
                let note = format!(
                    "{}: replaced subgoals ({} entries)",
                    Utc::now().to_rfc3339(),
                    new_subgoals.len()
                );
                self.digest_insert(&mut next, "replan".to_string(), note);
            }
            // No mutation beyond the turn counter.
            Decision::AskUser { .. } | Decision::Stop { .. } => {}
        }

        if let Some(opinion) = critic_opinion {
            self.digest_insert(
                &mut next,
                "critic".to_string(),
                format!("{}: overrode next decision with {}", Utc::now().to_rfc3339(), opinion.label()),
            );
        }

        next.turn_index += 1;
        debug!(
            turn_index = next.turn_index,
            decision = decision.label(),
            "state updated"
        );
        next
    }

    /// Insert into the digest, evicting the oldest entry on overflow.
    /// Re-inserting an existing key refreshes its value in place.
    fn digest_insert(&self, state: &mut AgentState, key: String, value: String) {
        if !state.working_memory_digest.contains_key(&key)
            && state.working_memory_digest.len() >= self.digest_cap
        {
            state.working_memory_digest.shift_remove_index(0);
        }
        state.working_memory_digest.insert(key, value);
    }

    /// Persist the state for a trace id
    pub async fn save(&self, trace_id: &str, state: &AgentState) -> Result<()> {
        self.store.save(trace_id, state).await
    }

    /// Load the state for a trace id
    pub async fn load(&self, trace_id: &str) -> Result<Option<AgentState>> {
        self.store.load(trace_id).await
    }

    /// Remove the state for a trace id
    pub async fn clear(&self, trace_id: &str) -> Result<()> {
        self.store.delete(trace_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::normalizer::normalize;
    use crate::core::contracts::{ToolCall, ToolResult};
    use crate::core::store::InMemoryStateStore;
    use serde_json::json;
    use std::time::Duration;

    fn manager() -> StateManager {
        StateManager::new(InMemoryStateStore::shared())
    }

    fn initial(manager: &StateManager) -> AgentState {
        manager.create_initial(AgentGoal::new("test goal"), Budget::default())
    }

    #[test]
    fn initial_state_is_empty() {
        let m = manager();
        let s = initial(&m);
        assert_eq!(s.turn_index, 0);
        assert!(s.subgoals.is_empty());
        assert!(s.last_action.is_none());
        assert!(s.working_memory_digest.is_empty());
    }

    #[test]
    fn every_update_increments_turn_index_once() {
        let m = manager();
        let s0 = initial(&m);

        let s1 = m.update(&s0, &Decision::Stop { reason: "done".into() }, None, None);
        assert_eq!(s1.turn_index, 1);

        let s2 = m.update(
            &s1,
            &Decision::AskUser { question: "q".into(), missing_fields: vec![] },
            None,
            None,
        );
        assert_eq!(s2.turn_index, 2);
        // Prior states untouched (value semantics)
        assert_eq!(s0.turn_index, 0);
        assert_eq!(s1.turn_index, 1);
    }

    #[test]
    fn call_tool_update_records_action_and_facts() {
        let m = manager();
        let s0 = initial(&m);

        let call = ToolCall::new("read_file", json!({"file_path": "a.txt"}));
        let result = ToolResult::success(Some(json!({"size_bytes": 9})), 1, Duration::from_millis(3));
        let obs = normalize("read_file", &result);

        let s1 = m.update(&s0, &Decision::CallTool(call.clone()), Some(&obs), None);
        assert_eq!(s1.last_action.as_ref().unwrap().tool_name, "read_file");
        assert!(s1.last_observation.is_some());
        assert_eq!(s1.working_memory_digest["fact_size_bytes"], "9");
        assert_eq!(s1.working_memory_digest["fact_attempt"], "1");
    }

    #[test]
    fn replan_replaces_subgoals_and_notes_digest() {
        let m = manager();
        let s0 = initial(&m);

        let s1 = m.update(
            &s0,
            &Decision::Replan { new_subgoals: vec!["x".into(), "y".into()] },
            None,
            None,
        );
        assert_eq!(s1.subgoals, vec!["x", "y"]);
        assert!(s1.working_memory_digest.contains_key("replan"));

        let s2 = m.update(
            &s1,
            &Decision::Replan { new_subgoals: vec!["z".into()] },
            None,
            None,
        );
        assert_eq!(s2.subgoals, vec!["z"]);
    }

    #[test]
    fn ask_user_and_stop_only_touch_turn_index() {
        let m = manager();
        let s0 = initial(&m);
        let s1 = m.update(
            &s0,
            &Decision::Replan { new_subgoals: vec!["a".into()] },
            None,
            None,
        );

        let s2 = m.update(&s1, &Decision::Stop { reason: "done".into() }, None, None);
        assert_eq!(s2.subgoals, s1.subgoals);
        assert_eq!(s2.working_memory_digest, s1.working_memory_digest);
        assert_eq!(s2.turn_index, s1.turn_index + 1);
    }

    #[test]
    fn digest_evicts_oldest_at_cap() {
        let m = StateManager::new(InMemoryStateStore::shared()).with_digest_cap(3);
        let mut state = initial(&m);

        for i in 0..5 {
            let mut data = serde_json::Map::new();
            data.insert(format!("k{}", i), json!(i));
            let result = ToolResult::success(
                Some(serde_json::Value::Object(data)),
                1,
                Duration::ZERO,
            );
            let obs = normalize("t", &result);
            let call = ToolCall::new("t", json!({}));
            state = m.update(&state, &Decision::CallTool(call), Some(&obs), None);
        }

        assert_eq!(state.working_memory_digest.len(), 3);
        // The fixed facts are refreshed each turn; the oldest data facts fell out.
        assert!(!state.working_memory_digest.contains_key("fact_k0"));
        assert!(state.working_memory_digest.contains_key("fact_k4"));
    }

    #[test]
    fn critic_opinion_is_noted() {
        let m = manager();
        let s0 = initial(&m);
        let opinion = Decision::Replan { new_subgoals: vec!["retry differently".into()] };
        let s1 = m.update(
            &s0,
            &Decision::CallTool(ToolCall::new("t", json!({}))),
            None,
            Some(&opinion),
        );
        assert!(s1.working_memory_digest["critic"].contains("replan"));
    }

    #[tokio::test]
    async fn persistence_round_trip() {
        let m = manager();
        let s = initial(&m);
        m.save("trace-9", &s).await.unwrap();
        let loaded = m.load("trace-9").await.unwrap().unwrap();
        assert_eq!(loaded.turn_index, 0);
        m.clear("trace-9").await.unwrap();
        assert!(m.load("trace-9").await.unwrap().is_none());
    }
}
