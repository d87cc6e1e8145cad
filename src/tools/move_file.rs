//! Move file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::traits::{args, Tool, ToolContext, ToolError};

/// Built-in tool: Move (rename) file
#[derive(Default)]
pub struct MoveFileTool;

impl MoveFileTool {
    pub fn new() -> Self {
        MoveFileTool
    }
}

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        "move_file"
    }

    fn description(&self) -> &str {
        "Move or rename a file within the workspace"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_path": {
                    "type": "string",
                    "description": "File to move"
                },
                "destination_path": {
                    "type": "string",
                    "description": "Where to move it"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace the destination if it exists (default false)"
                },
                "create_destination_directory": {
                    "type": "boolean",
                    "description": "Create missing parent directories of the destination (default false)"
                }
            },
            "required": ["source_path", "destination_path"]
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

        let raw_source = args::required_str(&args_value, "source_path")?;
        let raw_dest = args::required_str(&args_value, "destination_path")?;
        let overwrite = args::optional_bool(&args_value, "overwrite", false);
        let create_parents = args::optional_bool(&args_value, "create_destination_directory", false);

        let source = ctx.resolve_path(raw_source)?;
        let dest = ctx.resolve_path(raw_dest)?;

        if !tokio::fs::try_exists(&source)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to stat source"))?
        {
            return Err(ToolError::not_found(format!(
                "source '{}' does not exist",
                raw_source
            )));
        }

        let dest_exists = tokio::fs::try_exists(&dest)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to stat destination"))?;
        if dest_exists && !overwrite {
            return Err(ToolError::non_retryable(format!(
                "destination '{}' already exists; pass overwrite=true to replace it",
                raw_dest
            )));
        }

        if create_parents {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ToolError::from_io(&e, "Failed to create destination directory"))?;
            }
        }

        // Rename first; fall back to copy+delete across filesystems.
        match tokio::fs::rename(&source, &dest).await {
            Ok(()) => {}
            Err(_) => {
                tokio::fs::copy(&source, &dest)
                    .await
                    .map_err(|e| ToolError::from_io(&e, "Failed to copy during move"))?;
                tokio::fs::remove_file(&source)
                    .await
                    .map_err(|e| ToolError::from_io(&e, "Failed to remove source after copy"))?;
            }
        }

        Ok(json!({
            "source_path": raw_source,
            "destination_path": raw_dest,
            "overwritten": dest_exists,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::ToolErrorCode;

    fn ctx(dir: &tempfile::TempDir) -> ToolContext {
        ToolContext::new(dir.path(), "trace-test")
    }

    #[tokio::test]
    async fn moves_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), "payload").unwrap();

        MoveFileTool::new()
            .execute(
                json!({"source_path": "src.txt", "destination_path": "dst.txt"}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!dir.path().join("src.txt").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dst.txt")).unwrap(),
            "payload"
        );
    }

    #[tokio::test]
    async fn refuses_existing_destination_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), "new").unwrap();
        std::fs::write(dir.path().join("dst.txt"), "old").unwrap();

        let err = MoveFileTool::new()
            .execute(
                json!({"source_path": "src.txt", "destination_path": "dst.txt"}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::NonRetryableServer);
        assert!(dir.path().join("src.txt").exists());
    }

    #[tokio::test]
    async fn overwrite_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), "new").unwrap();
        std::fs::write(dir.path().join("dst.txt"), "old").unwrap();

        MoveFileTool::new()
            .execute(
                json!({"source_path": "src.txt", "destination_path": "dst.txt", "overwrite": true}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dst.txt")).unwrap(),
            "new"
        );
    }
}
