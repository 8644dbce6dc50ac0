//! Assistant runtime backed by an [`LlmClient`] tool-calling loop.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{AgentTurn, AssistantRuntime, ThreadId, TurnReport};
use crate::config;
use crate::llm::{ChatMessage, LlmClient, TokenUsage};

const SYSTEM_TEMPLATE: &str = "You are an AI agent named {{ agent_name }}.\n\n\
{{ agent_instructions }}\n\n\
You are working on the following tasks (JSON):\n{{ tasks }}\n\n\
Each task has a completion tool. Call mark_task_<id>_successful with the \
result when a task is done, or mark_task_<id>_failed with a reason if it \
cannot be done. Tasks completed by their subtasks have no completion tool.";

const USER_PROMPT: &str = "Work on your assigned tasks now.";

/// Runs agent turns through a chat model, executing requested tool calls
/// until the model stops calling tools. Conversation history is kept per
/// thread.
pub struct LlmAssistant {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tool_rounds: usize,
    threads: RwLock<HashMap<ThreadId, Vec<ChatMessage>>>,
}

impl LlmAssistant {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tool_rounds: config::settings().max_tool_rounds,
            threads: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// Messages recorded on `thread` so far (system prompts excluded).
    pub async fn history(&self, thread: &ThreadId) -> Vec<ChatMessage> {
        self.threads
            .read()
            .await
            .get(thread)
            .cloned()
            .unwrap_or_default()
    }

    fn system_prompt(turn: &AgentTurn) -> ChatMessage {
        let mut instructions = turn.agent_instructions.clone();
        if let Some(extra) = &turn.flow_instructions {
            instructions.push_str("\n\nAdditional instructions: ");
            instructions.push_str(extra);
        }
        if !turn.flow_context.is_empty() {
            instructions.push_str("\n\nFlow context: ");
            instructions.push_str(&json!(turn.flow_context).to_string());
        }

        let tasks = serde_json::to_string_pretty(&turn.tasks).unwrap_or_else(|_| "[]".to_string());
        let vars = BTreeMap::from([
            ("agent_name".to_string(), Value::String(turn.agent_name.clone())),
            ("agent_instructions".to_string(), Value::String(instructions)),
            ("tasks".to_string(), Value::String(tasks)),
        ]);
        ChatMessage::system(SYSTEM_TEMPLATE).render(&vars)
    }
}

#[async_trait]
impl AssistantRuntime for LlmAssistant {
    async fn run_turn(&self, turn: AgentTurn) -> anyhow::Result<TurnReport> {
        let history = self.history(&turn.thread).await;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Self::system_prompt(&turn));
        messages.extend(history);

        let mut produced = vec![ChatMessage::user(USER_PROMPT)];
        messages.push(produced[0].clone());

        let schemas = turn.tools.get_tool_schemas();
        let tools = (!schemas.is_empty()).then_some(schemas.as_slice());
        let mut usage: Option<TokenUsage> = None;

        for round in 0..self.max_tool_rounds {
            let response = self
                .llm
                .chat_completion(&self.model, &messages, tools)
                .await?;

            if let Some(spent) = &response.usage {
                usage.get_or_insert_with(TokenUsage::default).add(spent);
            }

            let reply = ChatMessage::assistant(response.content, response.tool_calls);
            messages.push(reply.clone());
            produced.push(reply.clone());

            let Some(calls) = reply.tool_calls.filter(|c| !c.is_empty()) else {
                break;
            };

            for call in calls {
                let output = match serde_json::from_str::<Value>(&call.function.arguments) {
                    Ok(args) => match turn.tools.execute(&call.function.name, args).await {
                        Ok(out) => out,
                        Err(e) => format!("Error: {}", e),
                    },
                    Err(e) => format!("Error: invalid JSON arguments: {}", e),
                };
                let result = ChatMessage::tool(call.id, output);
                messages.push(result.clone());
                produced.push(result);
            }

            if round + 1 == self.max_tool_rounds {
                tracing::warn!(
                    agent = %turn.agent_name,
                    "Stopped after {} tool rounds",
                    self.max_tool_rounds
                );
            }
        }

        self.threads
            .write()
            .await
            .entry(turn.thread.clone())
            .or_default()
            .extend(produced.iter().cloned());

        if let Some(usage) = &usage {
            tracing::debug!(
                agent = %turn.agent_name,
                total_tokens = usage.total_tokens,
                "Turn finished"
            );
        }

        Ok(TurnReport {
            messages: produced,
            usage,
        })
    }
}
