//! Tasks - units of work an agent drives to a terminal status.
//!
//! # Status transitions
//! ```text
//! Pending ──> Running ──> Successful
//!    │           │
//!    └───────────┴──────> Failed
//! ```
//! `Successful` and `Failed` are terminal: once reached, a task never changes
//! again. A task is successful iff it holds a result, failed iff it holds an
//! error.

mod resolve;
mod result_type;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agents::{Agent, Controller};
use crate::ambient::{self, Frame, ScopeGuard, Scoped};
use crate::blocking;
use crate::error::{FlowError, Result};
use crate::flow::{Flow, FlowInner};
use crate::tools::ToolRef;

pub use resolve::{resolve_tasks, FlowValue};
pub use result_type::ResultType;

/// Named values supplied to a task as additional input.
pub type Context = BTreeMap<String, Value>;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex characters, used in tool names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Successful,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Successful => write!(f, "successful"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    result: Option<Value>,
    error: Option<String>,
}

pub(crate) struct TaskInner {
    id: TaskId,
    objective: String,
    instructions: Option<String>,
    context: Context,
    result_type: Option<ResultType>,
    tools: Vec<ToolRef>,
    agents: Option<Vec<Agent>>,
    user_access: bool,
    auto_complete_by_subtasks: bool,
    parent: Option<Weak<TaskInner>>,
    flow: Option<Weak<FlowInner>>,
    subtasks: Mutex<Vec<Task>>,
    state: Mutex<TaskState>,
}

/// Shared handle to a task. Clones refer to the same task; equality and
/// hashing are by identity.
#[derive(Clone)]
pub struct Task(Arc<TaskInner>);

/// Serializable view of a task handed to the assistant runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub objective: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub context: Context,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_schema: Option<Value>,
    pub status: TaskStatus,
    pub user_access: bool,
    /// Completed by its subtasks rather than by an agent
    pub auto_complete_by_subtasks: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
    pub subtasks: Vec<TaskId>,
}

/// Builder for [`Task`].
pub struct TaskBuilder {
    objective: String,
    instructions: Option<String>,
    context: Context,
    result_type: Option<ResultType>,
    tools: Vec<ToolRef>,
    agents: Option<Vec<Agent>>,
    user_access: bool,
    auto_complete_by_subtasks: bool,
    parent: Option<Task>,
    flow: Option<Flow>,
}

impl TaskBuilder {
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn maybe_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = Some(result_type);
        self
    }

    pub fn maybe_result_type(mut self, result_type: Option<ResultType>) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn tool(mut self, tool: ToolRef) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolRef>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents = Some(agents.into_iter().collect());
        self
    }

    pub fn maybe_agents(mut self, agents: Option<Vec<Agent>>) -> Self {
        self.agents = agents;
        self
    }

    pub fn user_access(mut self, user_access: bool) -> Self {
        self.user_access = user_access;
        self
    }

    /// Complete this task automatically once all its subtasks are complete.
    pub fn auto_complete_by_subtasks(mut self) -> Self {
        self.auto_complete_by_subtasks = true;
        self
    }

    /// Attach to `parent` instead of the ambient parent task.
    pub fn parent(mut self, parent: &Task) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Register with `flow` instead of the ambient flow.
    pub fn flow(mut self, flow: &Flow) -> Self {
        self.flow = Some(flow.clone());
        self
    }

    /// Create the task and register it with its flow and parent.
    pub fn build(self) -> Task {
        let flow = self.flow.or_else(ambient::current_flow);
        let parent = self.parent.or_else(ambient::current_task);

        let task = Task(Arc::new(TaskInner {
            id: TaskId::new(),
            objective: self.objective,
            instructions: self.instructions,
            context: self.context,
            result_type: self.result_type,
            tools: self.tools,
            agents: self.agents,
            user_access: self.user_access,
            auto_complete_by_subtasks: self.auto_complete_by_subtasks,
            parent: parent.as_ref().map(|p| Arc::downgrade(&p.0)),
            flow: flow.as_ref().map(Flow::downgrade),
            subtasks: Mutex::new(Vec::new()),
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                result: None,
                error: None,
            }),
        }));

        if let Some(parent) = &parent {
            parent.lock_subtasks().push(task.clone());
        }
        if let Some(flow) = &flow {
            flow.add_task(task.clone());
        }

        tracing::debug!(task = %task.id(), "Created task \"{}\"", task.objective());
        task
    }
}

impl Task {
    pub fn builder(objective: impl Into<String>) -> TaskBuilder {
        TaskBuilder {
            objective: objective.into(),
            instructions: None,
            context: Context::new(),
            result_type: None,
            tools: Vec::new(),
            agents: None,
            user_access: false,
            auto_complete_by_subtasks: false,
            parent: None,
            flow: None,
        }
    }

    /// Create a task with just an objective.
    pub fn new(objective: impl Into<String>) -> Self {
        Self::builder(objective).build()
    }

    pub fn id(&self) -> TaskId {
        self.0.id
    }

    pub fn objective(&self) -> &str {
        &self.0.objective
    }

    pub fn instructions(&self) -> Option<&str> {
        self.0.instructions.as_deref()
    }

    pub fn context(&self) -> &Context {
        &self.0.context
    }

    pub fn result_type(&self) -> Option<&ResultType> {
        self.0.result_type.as_ref()
    }

    pub fn tools(&self) -> &[ToolRef] {
        &self.0.tools
    }

    pub fn agents(&self) -> Option<&[Agent]> {
        self.0.agents.as_deref()
    }

    pub fn user_access(&self) -> bool {
        self.0.user_access
    }

    pub fn is_auto_completed_by_subtasks(&self) -> bool {
        self.0.auto_complete_by_subtasks
    }

    pub fn parent(&self) -> Option<Task> {
        self.0.parent.as_ref().and_then(Weak::upgrade).map(Task)
    }

    /// The flow this task was registered with, if it is still alive.
    pub fn flow(&self) -> Option<Flow> {
        self.0.flow.as_ref().and_then(Flow::upgrade)
    }

    pub fn subtasks(&self) -> Vec<Task> {
        self.lock_subtasks().clone()
    }

    fn lock_subtasks(&self) -> MutexGuard<'_, Vec<Task>> {
        self.0
            .subtasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        self.0
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> TaskStatus {
        self.lock_state().status
    }

    pub fn result(&self) -> Option<Value> {
        self.lock_state().result.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_successful(&self) -> bool {
        self.status() == TaskStatus::Successful
    }

    pub fn is_failed(&self) -> bool {
        self.status() == TaskStatus::Failed
    }

    /// Move a pending task to `Running`. Returns false otherwise.
    pub fn mark_running(&self) -> bool {
        let mut state = self.lock_state();
        if state.status != TaskStatus::Pending {
            return false;
        }
        state.status = TaskStatus::Running;
        tracing::debug!(task = %self.id(), "Task running");
        true
    }

    /// Record a result. Returns false if the task was already complete.
    pub fn mark_successful(&self, result: Value) -> bool {
        let mut state = self.lock_state();
        if state.status.is_terminal() {
            return false;
        }
        state.status = TaskStatus::Successful;
        state.result = Some(result);
        tracing::info!(task = %self.id(), "Task \"{}\" successful", self.objective());
        true
    }

    /// Record a failure. Returns false if the task was already complete.
    pub fn mark_failed(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let mut state = self.lock_state();
        if state.status.is_terminal() {
            return false;
        }
        tracing::warn!(task = %self.id(), "Task \"{}\" failed: {}", self.objective(), reason);
        state.status = TaskStatus::Failed;
        state.error = Some(reason);
        true
    }

    /// Complete auto-completed tasks whose subtasks are all complete,
    /// depth-first. A parent fails if any subtask failed.
    pub fn sync_with_subtasks(&self) {
        let subtasks = self.subtasks();
        for subtask in &subtasks {
            subtask.sync_with_subtasks();
        }

        if !self.0.auto_complete_by_subtasks || self.is_complete() {
            return;
        }
        if !subtasks.iter().all(Task::is_complete) {
            return;
        }

        let failed: Vec<&str> = subtasks
            .iter()
            .filter(|t| t.is_failed())
            .map(Task::objective)
            .collect();
        if failed.is_empty() {
            self.mark_successful(Value::Null);
        } else {
            self.mark_failed(format!("Failed subtasks: {}", failed.join(", ")));
        }
    }

    /// Incomplete tasks in this tree, subtasks before their parent.
    pub fn open_tasks(&self) -> Vec<Task> {
        let mut out = Vec::new();
        self.collect_open(&mut out);
        out
    }

    fn collect_open(&self, out: &mut Vec<Task>) {
        for subtask in self.subtasks() {
            subtask.collect_open(out);
        }
        if !self.is_complete() && !out.contains(self) {
            out.push(self.clone());
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id(),
            objective: self.0.objective.clone(),
            instructions: self.0.instructions.clone(),
            context: self.0.context.clone(),
            result_schema: self.0.result_type.as_ref().map(ResultType::json_schema),
            status: self.status(),
            user_access: self.0.user_access,
            auto_complete_by_subtasks: self.0.auto_complete_by_subtasks,
            parent: self.parent().map(|p| p.id()),
            subtasks: self.subtasks().iter().map(Task::id).collect(),
        }
    }

    /// Make this task the ambient parent until the guard is dropped.
    pub fn enter(&self) -> ScopeGuard {
        ambient::push(Frame::Task(self.clone()))
    }

    /// Run `fut` with this task as the ambient parent.
    pub fn scope<F: Future>(&self, fut: F) -> Scoped<F> {
        Scoped::new(Frame::Task(self.clone()), fut)
    }

    /// Run the task to completion and return its result.
    ///
    /// Uses the task's own agents, else the flow's agents, else a default
    /// agent, plus every agent named by an open subtask. Fails if the task
    /// fails or is still open when the controller gives up.
    pub async fn run_async(&self) -> Result<Value> {
        let flow = self.flow().or_else(ambient::current_flow);
        self.run_in(flow).await
    }

    /// Blocking form of [`Task::run_async`].
    pub fn run(&self) -> Result<Value> {
        let flow = self.flow().or_else(ambient::current_flow);
        blocking::block_on(self.run_in(flow))?
    }

    async fn run_in(&self, flow: Option<Flow>) -> Result<Value> {
        let mut agents = match (self.agents(), &flow) {
            (Some(agents), _) if !agents.is_empty() => agents.to_vec(),
            (_, Some(flow)) if !flow.agents().is_empty() => flow.agents().to_vec(),
            _ => vec![Agent::default_agent_with_access(self.user_access())],
        };
        for subtask in self.open_tasks() {
            for agent in subtask.agents().unwrap_or_default() {
                if !agents.contains(agent) {
                    agents.push(agent.clone());
                }
            }
        }

        let controller = Controller::new(flow, agents, vec![self.clone()]);
        controller.run_async().await?;
        self.outcome()
    }

    fn outcome(&self) -> Result<Value> {
        let state = self.lock_state();
        match state.status {
            TaskStatus::Successful => Ok(state.result.clone().unwrap_or(Value::Null)),
            TaskStatus::Failed => Err(FlowError::TaskFailed {
                objective: self.0.objective.clone(),
                reason: state.error.clone().unwrap_or_default(),
            }),
            _ => Err(FlowError::TasksIncomplete(vec![self.0.objective.clone()])),
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.0.id)
            .field("objective", &self.0.objective)
            .field("status", &self.status())
            .finish()
    }
}
