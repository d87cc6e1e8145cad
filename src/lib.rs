//! # Tiller
//!
//! A closed-loop runtime for LLM tool-calling agents. The loop drives a
//! language model through successive turns of propose → execute → observe →
//! decide, under explicit budget, policy, and cancellation constraints, and
//! ships with a scenario-driven benchmark harness.
//!
//! ## Architecture
//!
//! - **Core contracts** (`core`): value types for goals, budgets, tool calls
//!   and results, observations, decisions, actions, and agent state, plus the
//!   LLM-provider and state-store boundaries
//! - **Agent** (`agent`): the turn cycle — state manager, observation
//!   normalizer, policy engine, executor, planner, critic, conversation
//!   manager, loop events
//! - **Tools** (`tools`): the tool trait, registry, and the filesystem tool
//!   set scenarios exercise
//! - **Harness** (`harness`): declarative scenarios, workspace provisioning,
//!   mock LLM, validation, and reporting
//! - **Configuration** (`config`): runtime defaults with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiller::harness::{builtin_scenarios, LlmMode, ScenarioRunner};
//! use tiller::config::RuntimeConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = ScenarioRunner::new(LlmMode::Mock, RuntimeConfig::from_env());
//!     for scenario in builtin_scenarios() {
//!         let result = runner.run(&scenario).await;
//!         println!("{}: {}", result.scenario_id, result.success);
//!     }
//! }
//! ```

// Core abstractions (contracts and boundary traits)
pub mod core;

// Agent loop and its collaborators
pub mod agent;

// Tool system
pub mod tools;

// Benchmark harness
pub mod harness;

// Runtime configuration
pub mod config;

// Error types
pub mod error;

// Re-export commonly used items
pub use error::{Error, Result};

pub use agent::{
    AgentEvent, AgentLoop, Conversation, ConversationManager, Critic, EventBus, Executor,
    LlmCritic, LlmPlanner, Message, Planner, Role, StateManager,
};
pub use crate::core::{
    Action, AgentGoal, AgentResult, AgentState, Budget, Decision, ErrorHandlingPolicy,
    LlmProvider, Observation, StateStore, ToolCall, ToolErrorCode, ToolResult,
};
pub use tools::{Tool, ToolContext, ToolRegistry};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
