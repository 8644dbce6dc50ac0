//! Flows - execution contexts that own tasks and pin a conversation thread.

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, Weak};

use uuid::Uuid;

use crate::agents::Agent;
use crate::ambient::{self, Frame, ScopeGuard, Scoped};
use crate::runtime::{RuntimeRef, ThreadId};
use crate::task::{Context, Task};
use crate::tools::ToolRef;

pub(crate) struct FlowInner {
    id: Uuid,
    name: Option<String>,
    thread: ThreadId,
    context: Context,
    instructions: Option<String>,
    tools: Vec<ToolRef>,
    agents: Vec<Agent>,
    runtime: RuntimeRef,
    tasks: Mutex<Vec<Task>>,
}

/// Shared handle to a flow. Clones refer to the same flow.
#[derive(Clone)]
pub struct Flow(Arc<FlowInner>);

/// Builder for [`Flow`].
pub struct FlowBuilder {
    runtime: RuntimeRef,
    name: Option<String>,
    thread: Option<ThreadId>,
    context: Context,
    instructions: Option<String>,
    tools: Vec<ToolRef>,
    agents: Vec<Agent>,
}

impl FlowBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Continue an existing conversation thread instead of starting one.
    pub fn thread(mut self, thread: ThreadId) -> Self {
        self.thread = Some(thread);
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Tools offered in every agent turn of this flow.
    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolRef>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Agents used by tasks that do not name their own.
    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn build(self) -> Flow {
        Flow(Arc::new(FlowInner {
            id: Uuid::new_v4(),
            name: self.name,
            thread: self.thread.unwrap_or_default(),
            context: self.context,
            instructions: self.instructions,
            tools: self.tools,
            agents: self.agents,
            runtime: self.runtime,
            tasks: Mutex::new(Vec::new()),
        }))
    }
}

impl Flow {
    pub fn builder(runtime: RuntimeRef) -> FlowBuilder {
        FlowBuilder {
            runtime,
            name: None,
            thread: None,
            context: Context::new(),
            instructions: None,
            tools: Vec::new(),
            agents: Vec::new(),
        }
    }

    /// Flow on a fresh thread with no defaults.
    pub fn new(runtime: RuntimeRef) -> Self {
        Self::builder(runtime).build()
    }

    /// The innermost ambient flow, if any.
    pub fn current() -> Option<Flow> {
        ambient::current_flow()
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn thread(&self) -> &ThreadId {
        &self.0.thread
    }

    pub fn context(&self) -> &Context {
        &self.0.context
    }

    pub fn instructions(&self) -> Option<&str> {
        self.0.instructions.as_deref()
    }

    pub fn tools(&self) -> &[ToolRef] {
        &self.0.tools
    }

    pub fn agents(&self) -> &[Agent] {
        &self.0.agents
    }

    pub fn runtime(&self) -> &RuntimeRef {
        &self.0.runtime
    }

    /// Tasks registered with this flow, in creation order.
    pub fn tasks(&self) -> Vec<Task> {
        self.0
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn add_task(&self, task: Task) {
        self.0
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(task);
    }

    pub(crate) fn downgrade(&self) -> Weak<FlowInner> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<FlowInner>) -> Option<Flow> {
        weak.upgrade().map(Flow)
    }

    /// Make this the ambient flow until the guard is dropped.
    pub fn enter(&self) -> ScopeGuard {
        tracing::debug!(flow = %self.id(), thread = %self.thread(), "Entering flow");
        ambient::push(Frame::Flow(self.clone()))
    }

    /// Run `fut` with this as the ambient flow.
    pub fn scope<F: Future>(&self, fut: F) -> Scoped<F> {
        Scoped::new(Frame::Flow(self.clone()), fut)
    }
}

impl PartialEq for Flow {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Flow {}

impl Hash for Flow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("thread", &self.0.thread)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRuntime;

    #[test]
    fn test_thread_is_pinned_when_given() {
        let runtime = Arc::new(ScriptedRuntime::succeed_all());
        let pinned = ThreadId::from("thread_abc");
        let flow = Flow::builder(runtime.clone()).thread(pinned.clone()).build();
        assert_eq!(flow.thread(), &pinned);

        let fresh = Flow::new(runtime);
        assert_ne!(fresh.thread(), &pinned);
    }

    #[test]
    fn test_tasks_register_with_ambient_flow() {
        let flow = Flow::new(Arc::new(ScriptedRuntime::succeed_all()));
        let inside = {
            let _guard = flow.enter();
            Task::new("inside")
        };
        let _outside = Task::new("outside");

        assert_eq!(flow.tasks(), vec![inside.clone()]);
        assert_eq!(inside.flow(), Some(flow));
    }

    #[test]
    fn test_task_flow_link_is_weak() {
        let task = {
            let flow = Flow::new(Arc::new(ScriptedRuntime::succeed_all()));
            Task::builder("short-lived").flow(&flow).build()
        };
        assert!(task.flow().is_none());
    }

    #[tokio::test]
    async fn test_flow_and_task_scopes_borrow_their_handles() {
        let flow = Flow::new(Arc::new(ScriptedRuntime::succeed_all()));
        let parent = Task::builder("parent").flow(&flow).build();

        let child = flow
            .scope(parent.scope(async { Task::new("child") }))
            .await;

        assert_eq!(parent.subtasks(), vec![child.clone()]);
        assert_eq!(child.flow(), Some(flow.clone()));
        assert!(crate::ambient::current_flow().is_none());
    }
}
