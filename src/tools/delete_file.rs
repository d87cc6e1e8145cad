//! Delete file tool
//!
//! Deletes a file, or a whole directory when `recursive` is set.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::traits::{args, Tool, ToolContext, ToolError};

/// Built-in tool: Delete file or directory
#[derive(Default)]
pub struct DeleteFileTool;

impl DeleteFileTool {
    pub fn new() -> Self {
        DeleteFileTool
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file, or a directory tree when recursive=true"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_path": {
                    "type": "string",
                    "description": "File or directory to delete"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Delete directories and their contents (default false)"
                },
                "force": {
                    "type": "boolean",
                    "description": "Treat a missing target as success (default false)"
                }
            },
            "required": ["target_path"]
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

        let raw_target = args::required_str(&args_value, "target_path")?;
        let recursive = args::optional_bool(&args_value, "recursive", false);
        let force = args::optional_bool(&args_value, "force", false);

        let target = ctx.resolve_path(raw_target)?;

        let metadata = match tokio::fs::symlink_metadata(&target).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && force => {
                return Ok(json!({
                    "target_path": raw_target,
                    "deleted": false,
                    "was_directory": false,
                }));
            }
            Err(e) => return Err(ToolError::from_io(&e, "Failed to stat target")),
        };

        let was_directory = metadata.is_dir();
        if was_directory {
            if !recursive {
                return Err(ToolError::invalid_input(format!(
                    "'{}' is a directory; pass recursive=true to delete it",
                    raw_target
                )));
            }
            tokio::fs::remove_dir_all(&target)
                .await
                .map_err(|e| ToolError::from_io(&e, "Failed to delete directory"))?;
        } else {
            tokio::fs::remove_file(&target)
                .await
                .map_err(|e| ToolError::from_io(&e, "Failed to delete file"))?;
        }

        Ok(json!({
            "target_path": raw_target,
            "deleted": true,
            "was_directory": was_directory,
        }))
    }
}
