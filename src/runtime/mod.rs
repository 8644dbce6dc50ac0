//! Assistant runtime seam.
//!
//! The controller hands each agent turn to an [`AssistantRuntime`], which
//! talks to the model, executes the tools it asks for and reports the
//! messages it produced. Task completion happens through the completion tools
//! included in the turn's registry.

mod llm_assistant;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::{ChatMessage, TokenUsage};
use crate::task::{Context, TaskSnapshot};
use crate::tools::ToolRegistry;

pub use llm_assistant::LlmAssistant;

/// Handle of an external conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new() -> Self {
        Self(format!("thread_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ThreadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything an assistant runtime needs for one agent turn.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub thread: ThreadId,
    pub agent_name: String,
    pub agent_instructions: String,
    pub flow_instructions: Option<String>,
    pub flow_context: Context,
    /// Open tasks assigned to the agent, subtasks before parents
    pub tasks: Vec<TaskSnapshot>,
    pub tools: ToolRegistry,
}

/// What the runtime produced during a turn.
#[derive(Debug, Clone, Default)]
pub struct TurnReport {
    pub messages: Vec<ChatMessage>,
    /// Tokens spent across the turn, when the model reports them.
    pub usage: Option<TokenUsage>,
}

/// Shared runtime handle.
pub type RuntimeRef = Arc<dyn AssistantRuntime>;

/// Executes agent turns against an external assistant.
#[async_trait]
pub trait AssistantRuntime: Send + Sync {
    /// Run one turn. Errors abort the controller run.
    async fn run_turn(&self, turn: AgentTurn) -> anyhow::Result<TurnReport>;
}
