//! Tools module - Modular tool system for agent capabilities
//!
//! Each tool is a self-contained module that implements the `Tool` trait.
//! Tools are registered into a `ToolRegistry` and made available to the LLM
//! for function calling; the executor validates arguments against each
//! tool's schema before invoking it.
//!
//! ## Built-in Tools
//!
//! - **read_file**: Read files from the workspace
//! - **write_file**: Write/create files (overwrite-guarded)
//! - **copy_file**: Copy files
//! - **move_file**: Move/rename files
//! - **delete_file**: Delete files or directory trees
//! - **list_directory**: List directory entries with filtering
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `src/tools/` (e.g., `my_tool.rs`)
//! 2. Implement the `Tool` trait
//! 3. Add `mod my_tool;` and `pub use` in this file
//! 4. Register it wherever the registry is assembled

mod copy_file;
mod delete_file;
mod list_directory;
mod move_file;
mod read_file;
mod registry;
mod traits;
mod write_file;

// Core trait and types
pub use traits::{Tool, ToolContext, ToolError};

// Registry
pub use registry::ToolRegistry;

// Built-in tools
pub use copy_file::CopyFileTool;
pub use delete_file::DeleteFileTool;
pub use list_directory::ListDirectoryTool;
pub use move_file::MoveFileTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

use crate::error::Result;

/// Build a registry with the full filesystem tool set
pub fn filesystem_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new())?;
    registry.register(WriteFileTool::new())?;
    registry.register(CopyFileTool::new())?;
    registry.register(MoveFileTool::new())?;
    registry.register(DeleteFileTool::new())?;
    registry.register(ListDirectoryTool::new())?;
    Ok(registry)
}
