//! Write file tool
//!
//! Allows the agent to write/create files in the workspace. Refuses to
//! clobber an existing file unless `overwrite` is set.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::traits::{args, Tool, ToolContext, ToolError};

/// Built-in tool: Write file
#[derive(Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        WriteFileTool
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file; set overwrite=true to replace an existing file"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to write (relative to the workspace)"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace the file if it already exists (default false)"
                },
                "create_backup": {
                    "type": "boolean",
                    "description": "When overwriting, keep the old content as <file>.bak (default false)"
                }
            },
            "required": ["file_path", "content"]
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
        let content = args::required_str(&args_value, "content")?;
        let overwrite = args::optional_bool(&args_value, "overwrite", false);
        let create_backup = args::optional_bool(&args_value, "create_backup", false);

        let path = ctx.resolve_path(raw_path)?;

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to stat file"))?;
        if exists && !overwrite {
            return Err(ToolError::non_retryable(format!(
                "file '{}' already exists; pass overwrite=true to replace it",
                raw_path
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::from_io(&e, "Failed to create directories"))?;
        }

        let mut backup_path = None;
        if exists && create_backup {
            let backup = path.with_extension(match path.extension() {
                Some(ext) => format!("{}.bak", ext.to_string_lossy()),
                None => "bak".to_string(),
            });
            tokio::fs::copy(&path, &backup)
                .await
                .map_err(|e| ToolError::from_io(&e, "Failed to create backup"))?;
            backup_path = Some(backup.to_string_lossy().to_string());
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to write file"))?;

        Ok(json!({
            "file_path": raw_path,
            "bytes_written": content.len(),
            "overwritten": exists,
            "backup_path": backup_path,
        }))
    }
}
