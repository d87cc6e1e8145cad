//! Scenario workspaces
//!
//! Each scenario gets an exclusively-owned temp directory, seeded from the
//! scenario's workspace config. Cleanup is drop-based, so the directory is
//! removed on every exit path — validation failures, panics, and timeouts
//! included.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};
use crate::harness::scenario::{WorkspaceConfig, WorkspaceSource};

/// An exclusively-owned scenario workspace directory
pub struct Workspace {
    root: TempDir,
}

impl Workspace {
    /// Create and seed a workspace
    pub async fn provision(config: &WorkspaceConfig) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("tiller-ws-")
            .tempdir()
            .map_err(|e| Error::Scenario(format!("cannot create workspace: {}", e)))?;

        if let WorkspaceSource::CopyFrom { path } = &config.source {
            copy_dir_recursive(path, root.path()).await?;
        }

        for dir in &config.directories {
            tokio::fs::create_dir_all(root.path().join(dir))
                .await
                .map_err(|e| Error::Scenario(format!("cannot create directory '{}': {}", dir, e)))?;
        }

        for file in &config.files {
            let path = root.path().join(&file.path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Scenario(format!("cannot create parents for '{}': {}", file.path, e))
                })?;
            }
            tokio::fs::write(&path, &file.content)
                .await
                .map_err(|e| Error::Scenario(format!("cannot write '{}': {}", file.path, e)))?;
        }

        debug!(path = %root.path().display(), "workspace provisioned");
        Ok(Workspace { root })
    }

    /// The workspace root
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Remove the workspace now rather than on drop, surfacing I/O errors
    pub fn close(self) -> Result<PathBuf> {
        let path = self.root.path().to_path_buf();
        self.root
            .close()
            .map_err(|e| Error::Scenario(format!("workspace cleanup failed: {}", e)))?;
        Ok(path)
    }
}

/// Copy a directory tree. Symlinks are not followed.
async fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir_all(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await.map_err(|e| {
            Error::Scenario(format!("cannot read source dir '{}': {}", src.display(), e))
        })?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let target = dst.join(entry.file_name());
            if file_type.is_dir() {
                pending.push((entry.path(), target));
            } else if file_type.is_file() {
                tokio::fs::copy(entry.path(), target).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::scenario::InjectedFile;

    #[tokio::test]
    async fn provisions_files_and_directories() {
        let config = WorkspaceConfig {
            source: WorkspaceSource::Ephemeral,
            files: vec![
                InjectedFile {
                    path: "readme.txt".into(),
                    content: "hello".into(),
                },
                InjectedFile {
                    path: "sub/deep/nested.txt".into(),
                    content: "deep".into(),
                },
            ],
            directories: vec!["empty_dir".into()],
        };

        let ws = Workspace::provision(&config).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(ws.path().join("readme.txt")).unwrap(),
            "hello"
        );
        assert_eq!(
            std::fs::read_to_string(ws.path().join("sub/deep/nested.txt")).unwrap(),
            "deep"
        );
        assert!(ws.path().join("empty_dir").is_dir());
    }

    #[tokio::test]
    async fn close_removes_the_directory() {
        let ws = Workspace::provision(&WorkspaceConfig::default()).await.unwrap();
        let path = ws.path().to_path_buf();
        assert!(path.exists());
        let closed = ws.close().unwrap();
        assert_eq!(closed, path);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_the_directory() {
        let path;
        {
            let ws = Workspace::provision(&WorkspaceConfig::default()).await.unwrap();
            path = ws.path().to_path_buf();
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn copy_from_seeds_the_workspace() {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir(source.path().join("inner")).unwrap();
        std::fs::write(source.path().join("inner/data.txt"), "copied").unwrap();
        std::fs::write(source.path().join("top.txt"), "top").unwrap();

        let config = WorkspaceConfig {
            source: WorkspaceSource::CopyFrom {
                path: source.path().to_path_buf(),
            },
            files: vec![],
            directories: vec![],
        };
        let ws = Workspace::provision(&config).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(ws.path().join("inner/data.txt")).unwrap(),
            "copied"
        );
        assert_eq!(
            std::fs::read_to_string(ws.path().join("top.txt")).unwrap(),
            "top"
        );
    }
}
