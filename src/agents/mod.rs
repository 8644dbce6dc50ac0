//! Agents module - named actors that run tasks through an assistant runtime.
//!
//! # Design Principles
//! - An agent is a handle: clones refer to the same agent, and two agents with
//!   the same name are still distinct
//! - Tools are resolved on demand and adapted before exposure
//! - Execution is delegated to a [`Controller`] scoped to the ambient flow

mod controller;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;

use crate::ambient;
use crate::blocking;
use crate::config;
use crate::error::{FlowError, Result};
use crate::flow::Flow;
use crate::runtime::{RuntimeRef, TurnReport};
use crate::task::Task;
use crate::tools::{adapt_tool, ConsoleHuman, HumanRef, TalkToHuman, ToolRef};

pub use controller::Controller;

/// Unique identifier for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct AgentInner {
    id: AgentId,
    name: String,
    instructions: String,
    user_access: bool,
    tools: Vec<ToolRef>,
    runtime: Option<RuntimeRef>,
    human: HumanRef,
}

/// Shared handle to an agent.
#[derive(Clone)]
pub struct Agent(Arc<AgentInner>);

/// Builder for [`Agent`].
pub struct AgentBuilder {
    name: String,
    instructions: String,
    user_access: bool,
    tools: Vec<ToolRef>,
    runtime: Option<RuntimeRef>,
    human: Option<HumanRef>,
}

impl AgentBuilder {
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Give the agent the `talk_to_human` tool.
    pub fn user_access(mut self, user_access: bool) -> Self {
        self.user_access = user_access;
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

    /// Runtime used instead of the flow's.
    pub fn runtime(mut self, runtime: RuntimeRef) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn maybe_runtime(mut self, runtime: Option<RuntimeRef>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Channel for `talk_to_human`; defaults to the console.
    pub fn human(mut self, human: HumanRef) -> Self {
        self.human = Some(human);
        self
    }

    pub fn build(self) -> Agent {
        Agent(Arc::new(AgentInner {
            id: AgentId::new(),
            name: self.name,
            instructions: self.instructions,
            user_access: self.user_access,
            tools: self.tools,
            runtime: self.runtime,
            human: self.human.unwrap_or_else(|| Arc::new(ConsoleHuman)),
        }))
    }
}

/// Tasks handed to [`Agent::run`]: none, one, or many.
#[derive(Debug, Clone, Default)]
pub struct TaskList(pub Vec<Task>);

impl From<()> for TaskList {
    fn from(_: ()) -> Self {
        Self(Vec::new())
    }
}

impl From<Task> for TaskList {
    fn from(task: Task) -> Self {
        Self(vec![task])
    }
}

impl From<&Task> for TaskList {
    fn from(task: &Task) -> Self {
        Self(vec![task.clone()])
    }
}

impl From<Vec<Task>> for TaskList {
    fn from(tasks: Vec<Task>) -> Self {
        Self(tasks)
    }
}

impl From<&[Task]> for TaskList {
    fn from(tasks: &[Task]) -> Self {
        Self(tasks.to_vec())
    }
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            instructions: String::new(),
            user_access: false,
            tools: Vec::new(),
            runtime: None,
            human: None,
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Builder preloaded with the configured default name and instructions.
    pub fn default_builder() -> AgentBuilder {
        let settings = config::settings();
        Self::builder(settings.default_agent_name.clone())
            .instructions(settings.default_agent_instructions.clone())
    }

    /// The agent used when none is supplied.
    pub fn default_agent() -> Self {
        Self::default_builder().build()
    }

    pub(crate) fn default_agent_with_access(user_access: bool) -> Self {
        Self::default_builder().user_access(user_access).build()
    }

    pub fn id(&self) -> AgentId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn instructions(&self) -> &str {
        &self.0.instructions
    }

    pub fn user_access(&self) -> bool {
        self.0.user_access
    }

    pub fn runtime(&self) -> Option<&RuntimeRef> {
        self.0.runtime.as_ref()
    }

    pub fn human(&self) -> &HumanRef {
        &self.0.human
    }

    /// Declared tools, then `talk_to_human` if the agent has user access,
    /// each adapted for the runtime.
    pub fn get_tools(&self) -> Vec<ToolRef> {
        let mut tools = self.0.tools.clone();
        if self.0.user_access {
            tools.push(Arc::new(TalkToHuman::new(self.0.human.clone())));
        }
        tools.into_iter().map(adapt_tool).collect()
    }

    /// Run one turn of this agent on `tasks` inside the ambient flow.
    pub async fn run_async(&self, tasks: impl Into<TaskList>) -> Result<TurnReport> {
        let flow = ambient::current_flow();
        self.run_in(flow, tasks.into()).await
    }

    /// Blocking form of [`Agent::run_async`].
    pub fn run(&self, tasks: impl Into<TaskList>) -> Result<TurnReport> {
        let flow = ambient::current_flow();
        blocking::block_on(self.run_in(flow, tasks.into()))?
    }

    async fn run_in(&self, flow: Option<Flow>, tasks: TaskList) -> Result<TurnReport> {
        let flow = flow.ok_or(FlowError::NoActiveFlow)?;
        let controller = Controller::new(Some(flow), vec![self.clone()], tasks.0);
        controller.run_agent_async(self).await
    }
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Agent {}

impl Hash for Agent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("user_access", &self.0.user_access)
            .finish()
    }
}
