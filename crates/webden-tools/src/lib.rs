//! Tool implementations exposed to the agent framework.
//!
//! Tools are capabilities exposed to the LLM during agent runs. Each tool
//! implements the [`Tool`] trait. Browser tools act on the session bound
//! for the calling task and fail if none is bound; they never take a
//! session parameter.

pub mod browser;
pub mod render;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use webden_browser::WebBrowser;

/// Context provided to tools during execution.
pub struct ToolContext {
    pub web: Arc<WebBrowser>,
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// The core tool trait. Every built-in tool implements this.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the LLM (e.g. "go_to_url").
    fn name(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Human-readable description for the LLM.
    fn description(&self) -> &str;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput>;
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Generate tool definitions for the LLM API request.
    pub fn to_llm_tools(&self) -> Vec<serde_json::Value> {
        self.tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.parameters_schema(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::browser_tools;

    #[test]
    fn test_registry_lists_browser_tools() {
        let mut registry = ToolRegistry::new();
        for tool in browser_tools() {
            registry.register(tool);
        }
        let names = registry.list();
        assert!(names.contains(&"go_to_url"));
        assert!(names.contains(&"get_page_content"));
        assert!(registry.get("go_to_url").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_llm_tool_definitions_carry_schemas() {
        let mut registry = ToolRegistry::new();
        for tool in browser_tools() {
            registry.register(tool);
        }
        for def in registry.to_llm_tools() {
            assert!(def.get("name").is_some());
            assert!(def.get("description").is_some());
            assert_eq!(def["input_schema"]["type"], "object");
        }
    }
}
