//! Tool trait: the abstraction over model-callable capabilities.
//!
//! Tools are what let a flow's model act: look up the weather, read and
//! patch a canvas file, query the menu index, or pause to ask the user.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Per-call context handed to a tool.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The `ref` of the tool request being answered.
    pub ref_id: Option<String>,
}

impl ToolContext {
    /// Build the error a tool returns to pause generation and hand
    /// `metadata` to the caller.
    pub fn interrupt(&self, tool_name: &str, metadata: serde_json::Value) -> ToolError {
        ToolError::Interrupted {
            tool_name: tool_name.to_string(),
            metadata,
        }
    }
}

/// The core Tool trait.
///
/// Tools are registered in a [`ToolRegistry`]; flows pick the subset they
/// expose to the model by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "getWeather", "find_and_replace").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    async fn execute(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A registry of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for the named tools, in the order given.
    pub fn definitions_for(&self, names: &[&str]) -> Result<Vec<ToolDefinition>, ToolError> {
        names
            .iter()
            .map(|name| {
                self.tools
                    .get(*name)
                    .map(|t| t.to_definition())
                    .ok_or_else(|| ToolError::NotFound((*name).to_string()))
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(ctx, input).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
