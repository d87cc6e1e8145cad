//! Tool registry - manages available tools and their argument validators

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;

use crate::agent::types::ToolDefinition;
use crate::error::{Error, Result};

use super::traits::{Tool, ToolError};

struct Entry {
    tool: Arc<dyn Tool>,
    /// Compiled once at registration so execution never pays for it
    validator: Validator,
}

/// Registry of available tools. Read-only after initialization; safe to share
/// across concurrent runs behind an `Arc`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Entry>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, compiling its parameter schema
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already-shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.parameters_schema();
        let validator = jsonschema::validator_for(&schema).map_err(|e| {
            Error::Tool(format!(
                "invalid parameter schema for tool '{}': {}",
                tool.name(),
                e
            ))
        })?;
        self.tools
            .insert(tool.name().to_string(), Entry { tool, validator });
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| e.tool.clone())
    }

    /// Validate arguments against the tool's compiled schema
    pub fn validate_args(&self, name: &str, args: &Value) -> std::result::Result<(), ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::not_found(format!("Unknown tool: {}", name)))?;
        entry.validator.validate(args).map_err(|e| {
            ToolError::invalid_input(format!("argument validation failed: {}", e))
        })
    }

    /// Get all tool definitions, sorted by name for stable prompts
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|e| e.tool.to_definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Get tool count
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// List tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
