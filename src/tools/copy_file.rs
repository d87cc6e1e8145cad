//! Copy file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::traits::{args, Tool, ToolContext, ToolError};

/// Built-in tool: Copy file
#[derive(Default)]
pub struct CopyFileTool;

impl CopyFileTool {
    pub fn new() -> Self {
        CopyFileTool
    }
}

#[async_trait]
impl Tool for CopyFileTool {
    fn name(&self) -> &str {
        "copy_file"
    }

    fn description(&self) -> &str {
        "Copy a file to a new location within the workspace"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_path": {
                    "type": "string",
                    "description": "File to copy"
                },
                "destination_path": {
                    "type": "string",
                    "description": "Where to copy it"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace the destination if it exists (default false)"
                },
                "create_destination_directory": {
                    "type": "boolean",
                    "description": "Create missing parent directories of the destination (default false)"
                },
                "preserve_timestamps": {
                    "type": "boolean",
                    "description": "Carry the source's modified/accessed times to the copy (default false)"
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
        let preserve_timestamps = args::optional_bool(&args_value, "preserve_timestamps", false);

        let source = ctx.resolve_path(raw_source)?;
        let dest = ctx.resolve_path(raw_dest)?;

        let source_meta = tokio::fs::metadata(&source)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to read source"))?;
        if source_meta.is_dir() {
            return Err(ToolError::invalid_input(format!(
                "'{}' is a directory; copy_file only copies files",
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

        let bytes_copied = tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to copy file"))?;

        if preserve_timestamps {
            let (accessed, modified) = (source_meta.accessed(), source_meta.modified());
            if let (Ok(accessed), Ok(modified)) = (accessed, modified) {
                let dest_clone = dest.clone();
                // set_times is sync-only; run it off the reactor
                tokio::task::spawn_blocking(move || {
                    let file = std::fs::File::options().write(true).open(&dest_clone)?;
                    file.set_times(
                        std::fs::FileTimes::new()
                            .set_accessed(accessed)
                            .set_modified(modified),
                    )
                })
                .await
                .map_err(|e| ToolError::new(crate::core::contracts::ToolErrorCode::ToolBug, e.to_string()))?
                .map_err(|e| ToolError::from_io(&e, "Failed to preserve timestamps"))?;
            }
        }

        Ok(json!({
            "source_path": raw_source,
            "destination_path": raw_dest,
            "bytes_copied": bytes_copied,
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
    async fn copies_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), "payload").unwrap();

        let out = CopyFileTool::new()
            .execute(
                json!({"source_path": "src.txt", "destination_path": "dst.txt"}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out["bytes_copied"], 7);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dst.txt")).unwrap(),
            "payload"
        );
    }

    #[tokio::test]
    async fn refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), "payload").unwrap();
        std::fs::write(dir.path().join("dst.txt"), "keep me").unwrap();

        let err = CopyFileTool::new()
            .execute(
                json!({"source_path": "src.txt", "destination_path": "dst.txt"}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::NonRetryableServer);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dst.txt")).unwrap(),
            "keep me"
        );
    }

    #[tokio::test]
    async fn creates_destination_directory_on_request() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), "x").unwrap();

        CopyFileTool::new()
            .execute(
                json!({
                    "source_path": "src.txt",
                    "destination_path": "deep/nest/dst.txt",
                    "create_destination_directory": true
                }),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(dir.path().join("deep/nest/dst.txt").exists());
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CopyFileTool::new()
            .execute(
                json!({"source_path": "ghost.txt", "destination_path": "dst.txt"}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::NotFound);
    }
}
