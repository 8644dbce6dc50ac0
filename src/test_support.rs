use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatMessage, ChatResponse, FunctionCall, LlmClient, ToolCall, ToolDefinition};
use crate::runtime::{AgentTurn, AssistantRuntime, ThreadId, TurnReport};
use crate::task::TaskSnapshot;
use crate::tools::HumanInput;

/// What the scripted runtime does with one task during a turn.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Succeed(Value),
    Fail(String),
    /// Leave the task open
    Skip,
    /// Abort the whole turn with this error
    Error(String),
}

/// Turn as seen by the scripted runtime.
#[derive(Debug, Clone)]
pub(crate) struct RecordedTurn {
    pub agent_name: String,
    pub thread: ThreadId,
    pub flow_instructions: Option<String>,
    pub tasks: Vec<TaskSnapshot>,
    pub tool_names: Vec<String>,
}

type Script = dyn Fn(&TaskSnapshot) -> Step + Send + Sync;

/// Assistant runtime that completes tasks through the completion tools
/// according to a script, recording every turn it is given.
pub(crate) struct ScriptedRuntime {
    script: Box<Script>,
    turns: Mutex<Vec<RecordedTurn>>,
}

impl ScriptedRuntime {
    pub(crate) fn new(script: impl Fn(&TaskSnapshot) -> Step + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            turns: Mutex::new(Vec::new()),
        }
    }

    /// Marks every task successful with its objective as the result.
    pub(crate) fn succeed_all() -> Self {
        Self::new(|s| Step::Succeed(json!(s.objective)))
    }

    pub(crate) fn turns(&self) -> Vec<RecordedTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssistantRuntime for ScriptedRuntime {
    async fn run_turn(&self, turn: AgentTurn) -> anyhow::Result<TurnReport> {
        self.turns.lock().unwrap().push(RecordedTurn {
            agent_name: turn.agent_name.clone(),
            thread: turn.thread.clone(),
            flow_instructions: turn.flow_instructions.clone(),
            tasks: turn.tasks.clone(),
            tool_names: turn
                .tools
                .get_tool_schemas()
                .into_iter()
                .map(|d| d.function.name)
                .collect(),
        });

        for task in turn.tasks.iter().filter(|t| !t.auto_complete_by_subtasks) {
            let short = task.id.short();
            match (self.script)(task) {
                Step::Succeed(result) => {
                    let _ = turn
                        .tools
                        .execute(
                            &format!("mark_task_{}_successful", short),
                            json!({ "result": result }),
                        )
                        .await;
                }
                Step::Fail(reason) => {
                    let _ = turn
                        .tools
                        .execute(
                            &format!("mark_task_{}_failed", short),
                            json!({ "reason": reason }),
                        )
                        .await;
                }
                Step::Skip => {}
                Step::Error(message) => return Err(anyhow::anyhow!(message)),
            }
        }

        Ok(TurnReport::default())
    }
}

/// LLM client that replays canned responses and records each request.
pub(crate) struct ScriptedLlm {
    responses: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub(crate) fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        _tools: Option<&[ToolDefinition]>,
    ) -> anyhow::Result<ChatResponse> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }
}

pub(crate) fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        call_type: "function".to_string(),
        function: FunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        },
    }
}

/// Human that answers from a fixed list of replies.
pub(crate) struct ScriptedHuman {
    replies: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedHuman {
    pub(crate) fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl HumanInput for ScriptedHuman {
    async fn ask(&self, message: &str) -> anyhow::Result<String> {
        self.questions.lock().unwrap().push(message.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
    }
}
