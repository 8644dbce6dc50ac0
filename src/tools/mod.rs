//! Tool system for agents.
//!
//! Tools are the callables an assistant runtime may invoke during an agent
//! turn: user-supplied tools, the human-interaction tool and the per-task
//! completion tools generated by the controller.

mod human;
mod task_status;
mod tracked;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::llm::{FunctionDefinition, ToolDefinition};

pub use human::{ConsoleHuman, HumanInput, HumanRef, TalkToHuman};
pub use task_status::{completion_tools, MarkTaskFailed, MarkTaskSuccessful};
pub use tracked::{adapt_tool, TrackedTool};

/// Shared tool handle.
pub type ToolRef = Arc<dyn Tool>;

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

type ToolHandler = dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync;

/// A tool backed by an async closure.
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> ToolRef {
        Arc::new(self)
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        (self.handler)(args).await
    }
}

/// Ordered set of tools available to one agent turn.
///
/// Registration order is kept; a later tool with an existing name replaces
/// the earlier one in place.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolRef>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolRef) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn extend(&mut self, tools: impl IntoIterator<Item = ToolRef>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolRef> {
        self.index.get(name).map(|&pos| &self.tools[pos])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all available tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Get tool schemas in LLM-compatible format.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(name: &str) -> ToolRef {
        FnTool::new(name, "Echo the input", json!({"type": "object"}), |args| async move {
            Ok(args.to_string())
        })
        .into_ref()
    }

    #[tokio::test]
    async fn test_fn_tool_executes() {
        let tool = echo("echo");
        let out = tool.execute(json!({"x": 1})).await.unwrap();
        assert_eq!(out, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn test_registry_keeps_order_and_replaces_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.extend([echo("b"), echo("a"), echo("b")]);

        let names: Vec<_> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(registry.get_tool_schemas()[0].function.name, "b");
    }

    #[tokio::test]
    async fn test_unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Unknown tool: nope"));
    }
}
