//! Core tool trait, error, and execution context types

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agent::types::{FunctionDefinition, ToolDefinition};
use crate::core::contracts::ToolErrorCode;

/// A failure raised by a tool implementation. The executor wraps this into a
/// full `ToolResult` together with attempt and latency bookkeeping.
#[derive(Debug, Clone)]
pub struct ToolError {
    /// Classified error code
    pub code: ToolErrorCode,
    /// Human-readable details
    pub message: String,
}

impl ToolError {
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        ToolError {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::PermissionDenied, message)
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::NonRetryableServer, message)
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::RetryableServer, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ToolErrorCode::Cancelled, "operation cancelled")
    }

    /// Map an I/O error to the closest tool error code
    pub fn from_io(err: &std::io::Error, context: &str) -> Self {
        use std::io::ErrorKind;
        let code = match err.kind() {
            ErrorKind::NotFound => ToolErrorCode::NotFound,
            ErrorKind::PermissionDenied => ToolErrorCode::PermissionDenied,
            ErrorKind::AlreadyExists => ToolErrorCode::NonRetryableServer,
            ErrorKind::TimedOut => ToolErrorCode::Timeout,
            ErrorKind::Interrupted | ErrorKind::WouldBlock => ToolErrorCode::RetryableServer,
            _ => ToolErrorCode::NonRetryableServer,
        };
        Self::new(code, format!("{}: {}", context, err))
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

/// Execution context handed to every tool invocation
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Root directory the tool may operate in
    pub workspace: PathBuf,
    /// Additional paths the tool may touch outside the workspace
    pub allowed_paths: Vec<PathBuf>,
    /// Trace id of the run, for correlation
    pub trace_id: String,
    /// Correlation id of the tool call being executed
    pub call_id: String,
}

impl ToolContext {
    /// Create a context rooted at a workspace directory
    pub fn new(workspace: impl Into<PathBuf>, trace_id: impl Into<String>) -> Self {
        ToolContext {
            workspace: workspace.into(),
            allowed_paths: Vec::new(),
            trace_id: trace_id.into(),
            call_id: String::new(),
        }
    }

    /// Clone with a fresh call id
    pub fn for_call(&self, call_id: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.call_id = call_id.into();
        ctx
    }

    /// Resolve a user-supplied path against the workspace, rejecting any path
    /// that escapes the workspace or the explicitly allowed paths.
    ///
    /// Resolution is lexical (no filesystem access) so it works for paths
    /// that do not exist yet.
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace.join(candidate)
        };

        let normalized = normalize(&joined);
        let permitted = normalized.starts_with(&self.workspace)
            || self.allowed_paths.iter().any(|p| normalized.starts_with(p));
        if !permitted {
            return Err(ToolError::permission_denied(format!(
                "path '{}' is outside the workspace",
                raw
            )));
        }
        Ok(normalized)
    }
}

/// Lexically normalize a path: resolve `.` and `..` without touching the
/// filesystem. `..` at the root is dropped rather than escaping.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name (stable, snake_case)
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the JSON Schema for tool parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with validated arguments
    async fn execute(
        &self,
        args: Value,
        ctx: ToolContext,
        cancel: CancellationToken,
    ) -> Result<Value, ToolError>;

    /// Convert to a provider tool definition
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

/// Argument extraction helpers shared by the built-in tools
pub(crate) mod args {
    use super::ToolError;
    use serde_json::Value;

    pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
        args.get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::invalid_input(format!("Missing '{}' parameter", key)))
    }

    pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
        args.get(key).and_then(|v| v.as_str())
    }

    pub fn optional_bool(args: &Value, key: &str, default: bool) -> bool {
        args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn optional_u64(args: &Value, key: &str) -> Option<u64> {
        args.get(key).and_then(|v| v.as_u64())
    }

    pub fn optional_str_list(args: &Value, key: &str) -> Vec<String> {
        args.get(key)
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext::new("/work/space", "trace-1")
    }

    #[test]
    fn resolve_relative_path_inside_workspace() {
        let resolved = ctx().resolve_path("sub/dir/file.txt").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/space/sub/dir/file.txt"));
    }

    #[test]
    fn resolve_rejects_parent_escape() {
        let err = ctx().resolve_path("../outside.txt").unwrap_err();
        assert_eq!(err.code, ToolErrorCode::PermissionDenied);
    }

    #[test]
    fn resolve_rejects_sneaky_escape() {
        let err = ctx().resolve_path("sub/../../../etc/passwd").unwrap_err();
        assert_eq!(err.code, ToolErrorCode::PermissionDenied);
    }

    #[test]
    fn resolve_accepts_absolute_path_inside_workspace() {
        let resolved = ctx().resolve_path("/work/space/a.txt").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/space/a.txt"));
    }

    #[test]
    fn resolve_accepts_allowed_paths() {
        let mut c = ctx();
        c.allowed_paths.push(PathBuf::from("/shared/data"));
        assert!(c.resolve_path("/shared/data/x.csv").is_ok());
        assert!(c.resolve_path("/shared/other/x.csv").is_err());
    }

    #[test]
    fn io_error_mapping() {
        let nf = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ToolError::from_io(&nf, "read").code, ToolErrorCode::NotFound);

        let pd = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(
            ToolError::from_io(&pd, "read").code,
            ToolErrorCode::PermissionDenied
        );
    }
}
