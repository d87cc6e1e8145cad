//! Runtime configuration
//!
//! Defaults cover everything; the environment can override the interesting
//! knobs. Real-LLM mode is gated on `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`
//! being present; `.env` files are honoured via dotenvy.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

use crate::core::contracts::ErrorHandlingPolicy;
use crate::error::{Error, Result};

/// Environment variable naming the chat-completions base URL
pub const ENV_BASE_URL: &str = "TILLER_BASE_URL";
/// Environment variable naming the model
pub const ENV_MODEL: &str = "TILLER_MODEL";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Top-level runtime configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cap on working-memory digest entries
    pub digest_cap: usize,
    /// Per-tool-call timeout
    #[serde(with = "humantime_serde")]
    pub tool_timeout: Duration,
    /// Planner parse failures tolerated before stopping
    pub planner_retry_budget: u32,
    /// Consecutive identical tool outcomes before a forced replan
    pub loop_guard_threshold: usize,
    /// Bound on conversation history turns (unbounded when absent)
    pub max_history_turns: Option<usize>,
    /// Error-handling policy defaults
    pub policy: ErrorHandlingPolicy,
    /// LLM provider settings (real mode)
    pub llm: LlmConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            digest_cap: 128,
            tool_timeout: Duration::from_secs(30),
            planner_retry_budget: 2,
            loop_guard_threshold: 3,
            max_history_turns: None,
            policy: ErrorHandlingPolicy::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Settings for the OpenAI-compatible chat client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key; never read from config files, only from the environment
    #[serde(skip)]
    pub api_key: Option<SecretString>,
    /// Chat-completions base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
        }
    }
}

impl RuntimeConfig {
    /// Build a config from defaults plus environment overrides. Loads `.env`
    /// first so local development keys are picked up.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = RuntimeConfig::default();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.llm.api_key = Some(SecretString::from(key));
            }
        } else if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                config.llm.api_key = Some(SecretString::from(key));
                config.llm.base_url = DEFAULT_ANTHROPIC_BASE_URL.to_string();
                config.llm.model = "claude-3-5-haiku-latest".to_string();
            }
        }

        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.is_empty() {
                config.llm.base_url = url;
            }
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.is_empty() {
                config.llm.model = model;
            }
        }

        debug!(base_url = %config.llm.base_url, model = %config.llm.model, "runtime config loaded");
        config
    }

    /// Whether real-LLM mode is available
    pub fn real_llm_available(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// The LLM settings, or a configuration error if no key is present
    pub fn require_llm(&self) -> Result<&LlmConfig> {
        if self.llm.api_key.is_none() {
            return Err(Error::Config(
                "real LLM mode needs OPENAI_API_KEY or ANTHROPIC_API_KEY".to_string(),
            ));
        }
        Ok(&self.llm)
    }
}
