//! Controller - drives agents against tasks until the tasks are complete.
//!
//! # Run loop
//! ```text
//! 1. Auto-complete parent tasks whose subtasks are done
//! 2. Stop if every task is complete (or the turn budget is spent)
//! 3. Pick the next agent (round-robin) with an open task it can complete
//! 4. Run one agent turn through the assistant runtime
//! ```

use crate::blocking;
use crate::config;
use crate::error::{FlowError, Result};
use crate::flow::Flow;
use crate::runtime::{AgentTurn, ThreadId, TurnReport};
use crate::task::Task;
use crate::tools::{adapt_tool, completion_tools, TalkToHuman, ToolRegistry};

use super::Agent;

/// Orchestrates agents over tasks within one flow. Built per run; holds
/// handles only.
pub struct Controller {
    flow: Option<Flow>,
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    thread: ThreadId,
    max_iterations: usize,
}

impl Controller {
    /// Create a controller. With no agents, the default agent is used.
    pub fn new(flow: Option<Flow>, agents: Vec<Agent>, tasks: Vec<Task>) -> Self {
        let agents = if agents.is_empty() {
            vec![Agent::default_agent()]
        } else {
            agents
        };
        let thread = flow
            .as_ref()
            .map(|f| f.thread().clone())
            .unwrap_or_default();

        Self {
            flow,
            agents,
            tasks,
            thread,
            max_iterations: config::settings().max_iterations,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn flow(&self) -> Option<&Flow> {
        self.flow.as_ref()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    fn sync_tasks(&self) {
        for task in &self.tasks {
            task.sync_with_subtasks();
        }
    }

    fn all_complete(&self) -> bool {
        self.tasks.iter().all(Task::is_complete)
    }

    /// Open tasks `agent` may work on, subtasks first, without duplicates.
    fn assigned_tasks(&self, agent: &Agent) -> Vec<Task> {
        let mut open: Vec<Task> = Vec::new();
        for task in &self.tasks {
            for candidate in task.open_tasks() {
                if !open.contains(&candidate) {
                    open.push(candidate);
                }
            }
        }
        open.retain(|t| t.agents().map_or(true, |agents| agents.contains(agent)));
        open
    }

    /// Whether `agent` has an assigned task it can complete itself.
    /// Auto-completed parents only finish through their subtasks.
    fn has_workable_tasks(&self, agent: &Agent) -> bool {
        self.assigned_tasks(agent)
            .iter()
            .any(|t| !t.is_auto_completed_by_subtasks())
    }

    /// Run agents until every task is complete or the turn budget is spent.
    pub async fn run_async(&self) -> Result<()> {
        if self.tasks.is_empty() {
            tracing::debug!("Controller has no tasks; nothing to run");
            return Ok(());
        }

        let mut cursor = 0usize;
        for iteration in 0..self.max_iterations {
            self.sync_tasks();
            if self.all_complete() {
                break;
            }

            let next = (0..self.agents.len())
                .map(|offset| (cursor + offset) % self.agents.len())
                .find(|&i| self.has_workable_tasks(&self.agents[i]));
            let Some(index) = next else {
                tracing::warn!("Open tasks remain but no agent can complete them");
                break;
            };
            cursor = index + 1;

            tracing::debug!(iteration, agent = %self.agents[index].name(), "Controller turn");
            self.run_agent_async(&self.agents[index]).await?;
        }

        self.sync_tasks();
        if !self.all_complete() {
            tracing::warn!(
                "Controller stopped with {} open task(s)",
                self.tasks.iter().filter(|t| !t.is_complete()).count()
            );
        }
        Ok(())
    }

    /// Blocking form of [`Controller::run_async`].
    pub fn run(&self) -> Result<()> {
        blocking::block_on(self.run_async())?
    }

    /// Run a single turn of `agent` on its assigned open tasks.
    pub async fn run_agent_async(&self, agent: &Agent) -> Result<TurnReport> {
        let runtime = agent
            .runtime()
            .or_else(|| self.flow.as_ref().map(Flow::runtime))
            .cloned()
            .ok_or_else(|| FlowError::NoRuntime(agent.name().to_string()))?;

        self.sync_tasks();
        let tasks = self.assigned_tasks(agent);
        for task in &tasks {
            task.mark_running();
        }

        let mut tools = ToolRegistry::new();
        tools.extend(agent.get_tools());
        if let Some(flow) = &self.flow {
            tools.extend(flow.tools().iter().cloned().map(adapt_tool));
        }
        for task in &tasks {
            tools.extend(task.tools().iter().cloned().map(adapt_tool));
        }
        if !agent.user_access() && tasks.iter().any(Task::user_access) {
            tools.register(adapt_tool(std::sync::Arc::new(TalkToHuman::new(
                agent.human().clone(),
            ))));
        }
        for task in tasks.iter().filter(|t| !t.is_auto_completed_by_subtasks()) {
            tools.extend(completion_tools(task));
        }

        let turn = AgentTurn {
            thread: self.thread.clone(),
            agent_name: agent.name().to_string(),
            agent_instructions: agent.instructions().to_string(),
            flow_instructions: self
                .flow
                .as_ref()
                .and_then(|f| f.instructions().map(str::to_string)),
            flow_context: self
                .flow
                .as_ref()
                .map(|f| f.context().clone())
                .unwrap_or_default(),
            tasks: tasks.iter().map(Task::snapshot).collect(),
            tools,
        };

        tracing::info!(
            agent = %agent.name(),
            thread = %self.thread,
            "Running agent turn on {} task(s)",
            turn.tasks.len()
        );
        let report = runtime.run_turn(turn).await?;

        self.sync_tasks();
        Ok(report)
    }

    /// Blocking form of [`Controller::run_agent_async`].
    pub fn run_agent(&self, agent: &Agent) -> Result<TurnReport> {
        blocking::block_on(self.run_agent_async(agent))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use crate::test_support::{ScriptedHuman, ScriptedRuntime, Step};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_until_all_tasks_complete() {
        let runtime = Arc::new(ScriptedRuntime::new(|s| Step::Succeed(json!(s.objective))));
        let flow = Flow::new(runtime.clone());
        let tasks: Vec<Task> = ["a", "b"]
            .iter()
            .map(|o| Task::builder(*o).flow(&flow).build())
            .collect();

        Controller::new(Some(flow), vec![], tasks.clone())
            .run_async()
            .await
            .unwrap();

        assert!(tasks.iter().all(Task::is_successful));
        assert_eq!(runtime.turns().len(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_iteration_cap() {
        let runtime = Arc::new(ScriptedRuntime::new(|_| Step::Skip));
        let flow = Flow::new(runtime.clone());
        let task = Task::builder("never done").flow(&flow).build();

        Controller::new(Some(flow), vec![], vec![task.clone()])
            .with_max_iterations(3)
            .run_async()
            .await
            .unwrap();

        assert_eq!(task.status(), TaskStatus::Running);
        assert_eq!(runtime.turns().len(), 3);
    }

    #[tokio::test]
    async fn test_agents_take_turns_on_assigned_tasks() {
        let runtime = Arc::new(ScriptedRuntime::new(|s| Step::Succeed(json!(s.objective))));
        let flow = Flow::new(runtime.clone());
        let alice = Agent::new("alice");
        let bob = Agent::new("bob");

        let for_bob = Task::builder("bob's job")
            .flow(&flow)
            .agents([bob.clone()])
            .build();

        Controller::new(Some(flow), vec![alice, bob], vec![for_bob.clone()])
            .run_async()
            .await
            .unwrap();

        let turns = runtime.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].agent_name, "bob");
        assert!(for_bob.is_successful());
    }

    #[tokio::test]
    async fn test_subtasks_offered_before_auto_completed_parent() {
        let runtime = Arc::new(ScriptedRuntime::new(|s| Step::Succeed(json!(s.objective))));
        let flow = Flow::new(runtime.clone());
        let parent = Task::builder("parent")
            .flow(&flow)
            .auto_complete_by_subtasks()
            .build();
        let child = Task::builder("child").flow(&flow).parent(&parent).build();

        Controller::new(Some(flow), vec![], vec![parent.clone()])
            .run_async()
            .await
            .unwrap();

        let turn = &runtime.turns()[0];
        let objectives: Vec<&str> = turn.tasks.iter().map(|t| t.objective.as_str()).collect();
        assert_eq!(objectives, vec!["child", "parent"]);
        assert!(turn.tool_names.iter().all(|n| !n.contains(&parent.id().short())));
        assert!(child.is_successful());
        assert!(parent.is_successful());
    }

    #[tokio::test]
    async fn test_parent_alone_does_not_earn_a_turn() {
        let runtime = Arc::new(ScriptedRuntime::new(|s| Step::Succeed(json!(s.objective))));
        let flow = Flow::new(runtime.clone());
        let alice = Agent::new("alice");
        let bob = Agent::new("bob");

        let parent = Task::builder("parent")
            .flow(&flow)
            .auto_complete_by_subtasks()
            .build();
        let child = Task::builder("child")
            .flow(&flow)
            .parent(&parent)
            .agents([bob.clone()])
            .build();

        Controller::new(Some(flow), vec![alice, bob], vec![parent.clone()])
            .run_async()
            .await
            .unwrap();

        let turns = runtime.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].agent_name, "bob");
        assert!(child.is_successful());
        assert!(parent.is_successful());
    }

    #[tokio::test]
    async fn test_stops_when_no_agent_can_work_open_subtasks() {
        let runtime = Arc::new(ScriptedRuntime::succeed_all());
        let flow = Flow::new(runtime.clone());
        let outsider = Agent::new("outsider");

        let parent = Task::builder("parent")
            .flow(&flow)
            .auto_complete_by_subtasks()
            .build();
        Task::builder("reserved")
            .flow(&flow)
            .parent(&parent)
            .agents([outsider])
            .build();

        Controller::new(Some(flow), vec![Agent::new("alice")], vec![parent.clone()])
            .run_async()
            .await
            .unwrap();

        assert!(runtime.turns().is_empty());
        assert_eq!(parent.status(), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_runtime_is_an_error() {
        let task = Task::new("orphan");
        let err = Controller::new(None, vec![], vec![task])
            .run_async()
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NoRuntime(_)));
    }

    #[tokio::test]
    async fn test_agent_runtime_works_without_flow() {
        let runtime = Arc::new(ScriptedRuntime::new(|_| Step::Succeed(json!(true))));
        let agent = Agent::builder("self-sufficient").runtime(runtime).build();
        let task = Task::new("standalone");

        Controller::new(None, vec![agent], vec![task.clone()])
            .run_async()
            .await
            .unwrap();
        assert_eq!(task.result(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_user_access_task_gets_human_tool() {
        let runtime = Arc::new(ScriptedRuntime::new(|_| Step::Skip));
        let flow = Flow::new(runtime.clone());
        let agent = Agent::builder("asker")
            .human(Arc::new(ScriptedHuman::new(["blue"])))
            .build();
        let task = Task::builder("ask favourite colour")
            .flow(&flow)
            .user_access(true)
            .build();

        Controller::new(Some(flow), vec![agent.clone()], vec![task])
            .run_agent_async(&agent)
            .await
            .unwrap();

        assert!(runtime.turns()[0]
            .tool_names
            .contains(&"talk_to_human".to_string()));
    }

    #[tokio::test]
    async fn test_runtime_errors_propagate() {
        let runtime = Arc::new(ScriptedRuntime::new(|_| Step::Error("model offline".into())));
        let flow = Flow::new(runtime);
        let task = Task::builder("doomed").flow(&flow).build();

        let err = Controller::new(Some(flow), vec![], vec![task])
            .run_async()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model offline"));
    }
}
