//! Typed loop events
//!
//! The loop publishes events over bounded channels rather than direct
//! callbacks, so a slow listener can never deadlock or back-pressure the
//! run: when a subscriber's queue is full the event is dropped for that
//! subscriber and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::core::contracts::{AgentState, ToolResult};

/// Events emitted by the agent loop, in turn order within a run
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A tool was executed (once per attempt)
    ToolCalled {
        tool_name: String,
        args: Value,
        result: ToolResult,
        attempt: u32,
        duration: Duration,
    },
    /// The planner produced a decision
    PlannerCalled {
        request_digest: String,
        response_digest: String,
        tokens: u32,
    },
    /// A turn finished and state was updated
    TurnCompleted { turn_index: u32, state: AgentState },
    /// The loop terminated
    Stopped { reason: String, success: bool },
}

impl AgentEvent {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            AgentEvent::ToolCalled { .. } => "tool_called",
            AgentEvent::PlannerCalled { .. } => "planner_called",
            AgentEvent::TurnCompleted { .. } => "turn_completed",
            AgentEvent::Stopped { .. } => "stopped",
        }
    }
}

/// Fan-out of loop events to bounded subscriber queues
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::Sender<AgentEvent>>>,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe with a bounded queue. Events that arrive while the queue is
    /// full are dropped for this subscriber.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.lock().expect("event bus poisoned").push(tx);
        rx
    }

    /// Publish an event to all live subscribers without blocking
    pub fn emit(&self, event: AgentEvent) {
        trace!(event = event.label(), "emit");
        let mut subscribers = self.subscribers.lock().expect("event bus poisoned");
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Events dropped across all subscribers because a queue was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("event bus poisoned").len()
    }
}
