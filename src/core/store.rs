//! State store — pluggable persistence for agent state.
//!
//! The store maps a trace id to the current [`AgentState`] with at-least-once
//! write semantics. Callers guarantee one writer per trace id; the store only
//! needs to be safe for concurrent access across *distinct* trace ids.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::contracts::AgentState;
use crate::error::Result;

/// Abstract interface for state persistence backends
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the backend ID
    fn id(&self) -> &str;

    /// Persist the state for a trace id
    async fn save(&self, trace_id: &str, state: &AgentState) -> Result<()>;

    /// Load the state for a trace id
    async fn load(&self, trace_id: &str) -> Result<Option<AgentState>>;

    /// Delete the state for a trace id
    async fn delete(&self, trace_id: &str) -> Result<()>;
}

/// In-memory state store. The minimal correct implementation — also the one
/// the harness uses so scenarios leave nothing behind.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, AgentState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for the common `Arc<dyn StateStore>` seam
    pub fn shared() -> Arc<dyn StateStore> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    fn id(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, trace_id: &str, state: &AgentState) -> Result<()> {
        self.states
            .write()
            .await
            .insert(trace_id.to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, trace_id: &str) -> Result<Option<AgentState>> {
        Ok(self.states.read().await.get(trace_id).cloned())
    }

    async fn delete(&self, trace_id: &str) -> Result<()> {
        self.states.write().await.remove(trace_id);
        Ok(())
    }
}
