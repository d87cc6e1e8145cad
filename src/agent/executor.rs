//! Executor - runs a single tool call
//!
//! Resolves the tool through the registry, validates arguments against the
//! tool's schema, and invokes it under a timeout with cooperative
//! cancellation. The executor never retries on its own — retries are policy
//! decisions, re-entering `execute` with a bumped attempt counter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::contracts::{ToolCall, ToolErrorCode, ToolResult};
use crate::tools::{ToolContext, ToolRegistry};

/// Default per-call timeout when the caller imposes no tighter cap
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes tool calls against a shared registry
pub struct Executor {
    registry: Arc<ToolRegistry>,
    default_timeout: Duration,
}

impl Executor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Executor {
            registry,
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Override the default per-call timeout
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// The registry this executor resolves tools from
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one attempt of a call. `timeout_cap` further bounds the
    /// per-call timeout (the remaining wall-clock budget); the effective
    /// timeout is the shorter of the two.
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        cancel: &CancellationToken,
        attempt: u32,
        timeout_cap: Option<Duration>,
    ) -> ToolResult {
        let started = Instant::now();

        if cancel.is_cancelled() {
            return ToolResult::failure(
                ToolErrorCode::Cancelled,
                "cancelled before execution",
                attempt,
                started.elapsed(),
            );
        }

        if let Err(tool_err) = self.registry.validate_args(&call.tool_name, &call.args) {
            warn!(tool = %call.tool_name, code = %tool_err.code, "argument validation failed");
            return ToolResult::failure(tool_err.code, tool_err.message, attempt, started.elapsed());
        }

        let tool = match self.registry.get(&call.tool_name) {
            Some(tool) => tool,
            // validate_args already reports unknown tools; this guards a race
            // that cannot happen with a read-only registry.
            None => {
                return ToolResult::failure(
                    ToolErrorCode::NotFound,
                    format!("Unknown tool: {}", call.tool_name),
                    attempt,
                    started.elapsed(),
                )
            }
        };

        let timeout = match timeout_cap {
            Some(cap) => self.default_timeout.min(cap),
            None => self.default_timeout,
        };

        // The tool gets a child token: caller cancellation fans out to it,
        // and a timeout cancels the tool without touching the caller's token.
        let tool_cancel = cancel.child_token();
        let args = call.args.clone();
        let call_ctx = ctx.for_call(call.id.clone());
        let task_cancel = tool_cancel.clone();
        let mut handle =
            tokio::spawn(async move { tool.execute(args, call_ctx, task_cancel).await });

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                tool_cancel.cancel();
                handle.abort();
                ToolResult::failure(
                    ToolErrorCode::Cancelled,
                    "cancelled during execution",
                    attempt,
                    started.elapsed(),
                )
            }
            _ = tokio::time::sleep(timeout) => {
                tool_cancel.cancel();
                handle.abort();
                ToolResult::failure(
                    ToolErrorCode::Timeout,
                    format!("tool '{}' exceeded {}ms", call.tool_name, timeout.as_millis()),
                    attempt,
                    started.elapsed(),
                )
            }
            joined = &mut handle => {
                let latency = started.elapsed();
                match joined {
                    Ok(Ok(data)) => {
                        let data = if data.is_null() { None } else { Some(data) };
                        ToolResult::success(data, attempt, latency)
                    }
                    Ok(Err(tool_err)) => {
                        ToolResult::failure(tool_err.code, tool_err.message, attempt, latency)
                    }
                    Err(join_err) => {
                        let details = if join_err.is_panic() {
                            match join_err.into_panic().downcast::<String>() {
                                Ok(msg) => *msg,
                                Err(payload) => payload
                                    .downcast::<&str>()
                                    .map(|s| s.to_string())
                                    .unwrap_or_else(|_| "tool panicked".to_string()),
                            }
                        } else {
                            "tool task was aborted".to_string()
                        };
                        ToolResult::failure(ToolErrorCode::ToolBug, details, attempt, latency)
                    }
                }
            }
        };

        debug!(
            tool = %call.tool_name,
            ok = outcome.ok,
            code = %outcome.error_code,
            attempt,
            latency_ms = outcome.latency.as_millis() as u64,
            "tool executed"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{filesystem_registry, Tool, ToolError, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow_tool"
        }
        fn description(&self) -> &str {
            "Sleeps until cancelled"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _args: Value,
            _ctx: ToolContext,
            cancel: CancellationToken,
        ) -> Result<Value, ToolError> {
            tokio::select! {
                _ = cancel.cancelled() => Err(ToolError::cancelled()),
                _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(Value::Null),
            }
        }
    }

    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn name(&self) -> &str {
            "panicky_tool"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _args: Value,
            _ctx: ToolContext,
            _cancel: CancellationToken,
        ) -> Result<Value, ToolError> {
            panic!("tool blew up");
        }
    }

    fn executor_with(extra: Option<Box<dyn FnOnce(&mut ToolRegistry)>>) -> Executor {
        let mut registry = filesystem_registry().unwrap();
        if let Some(add) = extra {
            add(&mut registry);
        }
        Executor::new(Arc::new(registry))
    }

    fn ctx(dir: &tempfile::TempDir) -> ToolContext {
        ToolContext::new(dir.path(), "trace-test")
    }

    #[tokio::test]
    async fn executes_a_tool_successfully() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let executor = executor_with(None);
        let call = ToolCall::new("read_file", json!({"file_path": "a.txt"}));
        let result = executor
            .execute(&call, &ctx(&dir), &CancellationToken::new(), 1, None)
            .await;

        assert!(result.ok);
        assert_eq!(result.error_code, ToolErrorCode::None);
        assert_eq!(result.attempt, 1);
        assert!(result.schema_validated);
        assert_eq!(result.data.as_ref().unwrap()["content"], "hello");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(None);
        let call = ToolCall::new("no_such_tool", json!({}));
        let result = executor
            .execute(&call, &ctx(&dir), &CancellationToken::new(), 1, None)
            .await;
        assert!(!result.ok);
        assert_eq!(result.error_code, ToolErrorCode::NotFound);
    }

    #[tokio::test]
    async fn schema_violation_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(None);
        // file_path must be a string
        let call = ToolCall::new("read_file", json!({"file_path": 42}));
        let result = executor
            .execute(&call, &ctx(&dir), &CancellationToken::new(), 1, None)
            .await;
        assert!(!result.ok);
        assert_eq!(result.error_code, ToolErrorCode::InvalidInput);
        assert!(!result.schema_validated);
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn timeout_cancels_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(Some(Box::new(|r| {
            r.register(SlowTool).unwrap();
        })))
        .with_default_timeout(Duration::from_millis(50));

        let call = ToolCall::new("slow_tool", json!({}));
        let result = executor
            .execute(&call, &ctx(&dir), &CancellationToken::new(), 1, None)
            .await;
        assert!(!result.ok);
        assert_eq!(result.error_code, ToolErrorCode::Timeout);
    }

    #[tokio::test]
    async fn timeout_cap_tightens_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(Some(Box::new(|r| {
            r.register(SlowTool).unwrap();
        })));

        let call = ToolCall::new("slow_tool", json!({}));
        let started = Instant::now();
        let result = executor
            .execute(
                &call,
                &ctx(&dir),
                &CancellationToken::new(),
                1,
                Some(Duration::from_millis(50)),
            )
            .await;
        assert_eq!(result.error_code, ToolErrorCode::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let call = ToolCall::new("read_file", json!({"file_path": "a.txt"}));
        let result = executor.execute(&call, &ctx(&dir), &cancel, 1, None).await;
        assert_eq!(result.error_code, ToolErrorCode::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_during_execution_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(Some(Box::new(|r| {
            r.register(SlowTool).unwrap();
        })));

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let call = ToolCall::new("slow_tool", json!({}));
        let result = executor.execute(&call, &ctx(&dir), &cancel, 2, None).await;
        assert_eq!(result.error_code, ToolErrorCode::Cancelled);
        assert_eq!(result.attempt, 2);
    }

    #[tokio::test]
    async fn panicking_tool_is_a_tool_bug() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(Some(Box::new(|r| {
            r.register(PanickyTool).unwrap();
        })));

        let call = ToolCall::new("panicky_tool", json!({}));
        let result = executor
            .execute(&call, &ctx(&dir), &CancellationToken::new(), 1, None)
            .await;
        assert!(!result.ok);
        assert_eq!(result.error_code, ToolErrorCode::ToolBug);
        assert!(result.error_details.as_deref().unwrap().contains("blew up"));
    }

    #[tokio::test]
    async fn attempt_counter_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let executor = executor_with(None);
        let call = ToolCall::new("read_file", json!({"file_path": "a.txt"}));
        let result = executor
            .execute(&call, &ctx(&dir), &CancellationToken::new(), 3, None)
            .await;
        assert_eq!(result.attempt, 3);
    }
}
