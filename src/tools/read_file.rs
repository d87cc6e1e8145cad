//! Read file tool
//!
//! Allows the agent to read files from the workspace, optionally restricted
//! to a line range.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::traits::{args, Tool, ToolContext, ToolError};

/// Built-in tool: Read file
#[derive(Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        ReadFileTool
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file, optionally restricted to a line range"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to read (relative to the workspace)"
                },
                "encoding": {
                    "type": "string",
                    "description": "Text encoding; only utf-8 is supported"
                },
                "start_line": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "First line to return (1-based, inclusive)"
                },
                "end_line": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Last line to return (1-based, inclusive)"
                },
                "max_size_mb": {
                    "type": "number",
                    "minimum": 0,
                    "description": "Refuse files larger than this many megabytes"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(
        &self,
        args_value: Value,
        ctx: ToolContext,
        cancel: CancellationToken,
    ) -> Result<Value, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::cancelled());
        }

        let raw_path = args::required_str(&args_value, "file_path")?;
        if let Some(enc) = args::optional_str(&args_value, "encoding") {
            let enc = enc.to_ascii_lowercase();
            if enc != "utf-8" && enc != "utf8" {
                return Err(ToolError::invalid_input(format!(
                    "unsupported encoding '{}'; only utf-8 is supported",
                    enc
                )));
            }
        }

        let path = ctx.resolve_path(raw_path)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to read file"))?;
        if metadata.is_dir() {
            return Err(ToolError::invalid_input(format!(
                "'{}' is a directory, not a file",
                raw_path
            )));
        }
        if let Some(max_mb) = args_value.get("max_size_mb").and_then(|v| v.as_f64()) {
            let max_bytes = (max_mb * 1024.0 * 1024.0) as u64;
            if metadata.len() > max_bytes {
                return Err(ToolError::invalid_input(format!(
                    "file is {} bytes, larger than the {} MB limit",
                    metadata.len(),
                    max_mb
                )));
            }
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to read file"))?;

        let start = args::optional_u64(&args_value, "start_line");
        let end = args::optional_u64(&args_value, "end_line");
        let (content, line_count) = match (start, end) {
            (None, None) => {
                let lines = content.lines().count();
                (content, lines)
            }
            (start, end) => {
                let start = start.unwrap_or(1).max(1) as usize;
                let lines: Vec<&str> = content.lines().collect();
                let end = end.map(|e| e as usize).unwrap_or(lines.len()).min(lines.len());
                if start > end {
                    return Err(ToolError::invalid_input(format!(
                        "start_line {} is past end_line {}",
                        start, end
                    )));
                }
                let slice = lines[start - 1..end].join("\n");
                (slice, end - start + 1)
            }
        };

        Ok(json!({
            "file_path": raw_path,
            "content": content,
            "line_count": line_count,
            "size_bytes": metadata.len(),
        }))
    }
}
