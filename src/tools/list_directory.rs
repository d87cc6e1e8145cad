//! List directory tool
//!
//! Lists directory entries with optional recursion, glob filtering, and
//! sorting. Hidden entries are skipped unless requested.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glob::Pattern;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::traits::{args, Tool, ToolContext, ToolError};

const DEFAULT_MAX_DEPTH: u64 = 16;

/// Built-in tool: List directory
#[derive(Default)]
pub struct ListDirectoryTool;

impl ListDirectoryTool {
    pub fn new() -> Self {
        ListDirectoryTool
    }
}

struct EntryRecord {
    name: String,
    path: String,
    kind: &'static str,
    size_bytes: u64,
    modified: Option<DateTime<Utc>>,
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, optionally recursively"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory_path": {
                    "type": "string",
                    "description": "Directory to list (relative to the workspace)"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Descend into subdirectories (default false)"
                },
                "include_hidden": {
                    "type": "boolean",
                    "description": "Include dotfiles (default false)"
                },
                "max_depth": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Recursion depth limit (default 16)"
                },
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern entries must match (e.g. *.txt)"
                },
                "exclude_patterns": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Glob patterns to skip"
                },
                "sort_by": {
                    "type": "string",
                    "enum": ["name", "size", "modified"],
                    "description": "Sort order (default name)"
                }
            },
            "required": ["directory_path"]
        })
    }

    async fn execute(
        &self,
        args_value: Value,
        ctx: ToolContext,
        cancel: CancellationToken,
    ) -> Result<Value, ToolError> {
        let raw_dir = args::required_str(&args_value, "directory_path")?;
        let recursive = args::optional_bool(&args_value, "recursive", false);
        let include_hidden = args::optional_bool(&args_value, "include_hidden", false);
        let max_depth = args::optional_u64(&args_value, "max_depth").unwrap_or(DEFAULT_MAX_DEPTH);
        let sort_by = args::optional_str(&args_value, "sort_by").unwrap_or("name");

        let pattern = match args::optional_str(&args_value, "pattern") {
            Some(p) => Some(
                Pattern::new(p)
                    .map_err(|e| ToolError::invalid_input(format!("bad pattern '{}': {}", p, e)))?,
            ),
            None => None,
        };
        let excludes: Vec<Pattern> = args::optional_str_list(&args_value, "exclude_patterns")
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| ToolError::invalid_input(format!("bad exclude pattern '{}': {}", p, e)))
            })
            .collect::<Result<_, _>>()?;

        let root = ctx.resolve_path(raw_dir)?;
        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| ToolError::from_io(&e, "Failed to read directory"))?;
        if !metadata.is_dir() {
            return Err(ToolError::invalid_input(format!(
                "'{}' is not a directory",
                raw_dir
            )));
        }

        let mut entries: Vec<EntryRecord> = Vec::new();
        // Depth-first walk; (dir, depth) pairs still to visit.
        let mut pending: Vec<(PathBuf, u64)> = vec![(root.clone(), 0)];

        while let Some((dir, depth)) = pending.pop() {
            if cancel.is_cancelled() {
                return Err(ToolError::cancelled());
            }

            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| ToolError::from_io(&e, "Failed to read directory"))?;

            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| ToolError::from_io(&e, "Failed to read directory entry"))?
            {
                let name = entry.file_name().to_string_lossy().to_string();
                if !include_hidden && name.starts_with('.') {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&root)
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|_| name.clone());
                if excludes.iter().any(|p| p.matches(&name) || p.matches(&rel)) {
                    continue;
                }

                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| ToolError::from_io(&e, "Failed to stat entry"))?;
                let is_dir = meta.is_dir();

                if is_dir && recursive && depth + 1 < max_depth {
                    pending.push((entry.path(), depth + 1));
                }

                if let Some(ref p) = pattern {
                    if !p.matches(&name) && !p.matches(&rel) {
                        continue;
                    }
                }

                entries.push(EntryRecord {
                    name,
                    path: rel,
                    kind: if is_dir { "directory" } else { "file" },
                    size_bytes: meta.len(),
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        match sort_by {
            "size" => entries.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
            "modified" => entries.sort_by(|a, b| b.modified.cmp(&a.modified)),
            _ => entries.sort_by(|a, b| a.path.cmp(&b.path)),
        }

        let rendered: Vec<Value> = entries
            .iter()
            .map(|e| {
                json!({
                    "name": e.name,
                    "path": e.path,
                    "type": e.kind,
                    "size_bytes": e.size_bytes,
                    "modified": e.modified.map(|m| m.to_rfc3339()),
                })
            })
            .collect();

        Ok(json!({
            "directory_path": raw_dir,
            "count": rendered.len(),
            "entries": rendered,
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

    fn seed(dir: &tempfile::TempDir) {
        std::fs::write(dir.path().join("a.txt"), "aaa").unwrap();
        std::fs::write(dir.path().join("b.log"), "b").unwrap();
        std::fs::write(dir.path().join(".hidden"), "h").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.txt"), "cc").unwrap();
    }

    #[tokio::test]
    async fn lists_top_level_without_hidden() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);

        let out = ListDirectoryTool::new()
            .execute(
                json!({"directory_path": "."}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out["count"], 3); // a.txt, b.log, sub
        let names: Vec<&str> = out["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert!(!names.contains(&".hidden"));
    }

    #[tokio::test]
    async fn recursive_listing_includes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);

        let out = ListDirectoryTool::new()
            .execute(
                json!({"directory_path": ".", "recursive": true}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let paths: Vec<&str> = out["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"sub/c.txt"));
    }

    #[tokio::test]
    async fn pattern_filters_entries() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);

        let out = ListDirectoryTool::new()
            .execute(
                json!({"directory_path": ".", "pattern": "*.txt", "recursive": true}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        for entry in out["entries"].as_array().unwrap() {
            assert!(entry["name"].as_str().unwrap().ends_with(".txt"));
        }
    }

    #[tokio::test]
    async fn not_a_directory_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);

        let err = ListDirectoryTool::new()
            .execute(
                json!({"directory_path": "a.txt"}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::InvalidInput);
    }

    #[tokio::test]
    async fn sort_by_size_is_descending() {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir);

        let out = ListDirectoryTool::new()
            .execute(
                json!({"directory_path": ".", "sort_by": "size"}),
                ctx(&dir),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let sizes: Vec<u64> = out["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["size_bytes"].as_u64().unwrap())
            .collect();
        let mut sorted = sizes.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(sizes, sorted);
    }
}
