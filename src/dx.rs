//! Inline, ad-hoc AI tasks without a wrapped function.
//!
//! ```no_run
//! use agentflow::{run_ai, AiOutput, ResultType};
//!
//! # fn demo() -> agentflow::Result<()> {
//! let answer = run_ai("How many legs does a spider have?")
//!     .cast(ResultType::Integer)
//!     .run()?;
//! if let AiOutput::Single(n) = answer {
//!     println!("{}", n);
//! }
//! # Ok(())
//! # }
//! ```

use serde_json::Value;
use tracing::Instrument;

use crate::agents::{Agent, Controller};
use crate::ambient;
use crate::blocking;
use crate::error::{FlowError, Result};
use crate::flow::Flow;
use crate::runtime::RuntimeRef;
use crate::task::{Context, ResultType, Task, TaskStatus};
use crate::tools::ToolRef;

/// One objective or a batch of them.
#[derive(Debug, Clone)]
pub enum Objectives {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for Objectives {
    fn from(objective: &str) -> Self {
        Self::Single(objective.to_string())
    }
}

impl From<String> for Objectives {
    fn from(objective: String) -> Self {
        Self::Single(objective)
    }
}

impl From<Vec<String>> for Objectives {
    fn from(objectives: Vec<String>) -> Self {
        Self::Many(objectives)
    }
}

impl From<Vec<&str>> for Objectives {
    fn from(objectives: Vec<&str>) -> Self {
        Self::Many(objectives.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Objectives {
    fn from(objectives: [&str; N]) -> Self {
        Self::Many(objectives.iter().map(|s| s.to_string()).collect())
    }
}

/// How results are coerced before being returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cast {
    /// String when objectives were given, otherwise no coercion
    #[default]
    Infer,
    None,
    To(ResultType),
}

/// Outcome of an inline run.
#[derive(Debug, Clone, PartialEq)]
pub enum AiOutput {
    /// The result of a single objective
    Single(Value),
    /// Results in objective order
    List(Vec<Value>),
    /// No objectives were given, so nothing ran
    Empty,
}

/// Inline run configuration. Create with [`run_ai`].
#[derive(Clone)]
pub struct RunAi {
    objectives: Objectives,
    agents: Option<Vec<Agent>>,
    cast: Cast,
    context: Context,
    tools: Vec<ToolRef>,
    user_access: bool,
    runtime: Option<RuntimeRef>,
}

/// Start an inline run for one objective or a list of them.
pub fn run_ai(objectives: impl Into<Objectives>) -> RunAi {
    RunAi {
        objectives: objectives.into(),
        agents: None,
        cast: Cast::Infer,
        context: Context::new(),
        tools: Vec::new(),
        user_access: false,
        runtime: None,
    }
}

/// Run name for tracing, truncated like `Task: <objective>`.
pub fn task_run_name(objective: &str) -> String {
    const MAX: usize = 75;
    let objective = if objective.is_empty() {
        "Follow general instructions"
    } else {
        objective
    };
    if objective.chars().count() > MAX {
        format!("Task: {}...", objective.chars().take(MAX).collect::<String>())
    } else {
        format!("Task: {}", objective)
    }
}

impl RunAi {
    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents = Some(agents.into_iter().collect());
        self
    }

    pub fn cast(mut self, result_type: ResultType) -> Self {
        self.cast = Cast::To(result_type);
        self
    }

    pub fn cast_with(mut self, cast: Cast) -> Self {
        self.cast = cast;
        self
    }

    /// Context shared by every created task.
    pub fn context(mut self, context: Context) -> Self {
        self.context.extend(context);
        self
    }

    pub fn context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolRef>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn user_access(mut self, user_access: bool) -> Self {
        self.user_access = user_access;
        self
    }

    /// Runtime for the default agent when no flow is active.
    pub fn runtime(mut self, runtime: RuntimeRef) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Create the tasks (registered with `flow`) and the controller.
    fn prepare(self, flow: Option<Flow>) -> Prepared {
        let single = matches!(self.objectives, Objectives::Single(_));
        let objectives = match self.objectives {
            Objectives::Single(o) => vec![o],
            Objectives::Many(os) => os,
        };

        let cast = match self.cast {
            Cast::Infer if objectives.is_empty() => None,
            Cast::Infer => Some(ResultType::String),
            Cast::None => None,
            Cast::To(t) => Some(t),
        };

        let tasks: Vec<Task> = objectives
            .into_iter()
            .map(|objective| {
                let mut builder = Task::builder(objective)
                    .context(self.context.clone())
                    .user_access(self.user_access)
                    .tools(self.tools.iter().cloned())
                    .maybe_result_type(cast.clone());
                if let Some(flow) = &flow {
                    builder = builder.flow(flow);
                }
                builder.build()
            })
            .collect();

        let agents = self.agents.unwrap_or_else(|| {
            vec![Agent::default_builder()
                .user_access(self.user_access)
                .maybe_runtime(self.runtime.clone())
                .build()]
        });

        Prepared {
            controller: Controller::new(flow, agents, tasks.clone()),
            tasks,
            single,
            cast,
        }
    }

    pub async fn run_async(self) -> Result<AiOutput> {
        let prepared = self.prepare(ambient::current_flow());
        prepared.execute().await
    }

    /// Blocking form of [`RunAi::run_async`].
    pub fn run(self) -> Result<AiOutput> {
        let prepared = self.prepare(ambient::current_flow());
        blocking::block_on(prepared.execute())?
    }
}

struct Prepared {
    controller: Controller,
    tasks: Vec<Task>,
    single: bool,
    cast: Option<ResultType>,
}

impl Prepared {
    async fn execute(self) -> Result<AiOutput> {
        if self.tasks.is_empty() {
            return Ok(AiOutput::Empty);
        }

        let span = tracing::info_span!(
            "run_ai",
            run = %task_run_name(self.tasks[0].objective()),
            tasks = self.tasks.len()
        );
        self.controller.run_async().instrument(span).await?;

        if self.tasks.iter().all(Task::is_successful) {
            let results = self
                .tasks
                .iter()
                .map(|t| {
                    let value = t.result().unwrap_or(Value::Null);
                    match &self.cast {
                        Some(cast) => cast.coerce(value),
                        None => Ok(value),
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            return Ok(if self.single {
                AiOutput::Single(results.into_iter().next().unwrap_or(Value::Null))
            } else {
                AiOutput::List(results)
            });
        }

        let failed = objectives_with(&self.tasks, TaskStatus::Failed);
        if !failed.is_empty() {
            return Err(FlowError::TasksFailed(failed));
        }

        let open = self
            .tasks
            .iter()
            .filter(|t| !t.is_complete())
            .map(|t| t.objective().to_string())
            .collect();
        Err(FlowError::TasksIncomplete(open))
    }
}

fn objectives_with(tasks: &[Task], status: TaskStatus) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| t.status() == status)
        .map(|t| t.objective().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedRuntime, Step};
    use serde_json::json;
    use std::sync::Arc;

    fn scripted(step: impl Fn(&str) -> Step + Send + Sync + 'static) -> Arc<ScriptedRuntime> {
        Arc::new(ScriptedRuntime::new(move |s| step(&s.objective)))
    }

    #[tokio::test]
    async fn test_all_successful_returns_results_in_order() {
        let runtime = scripted(|o| Step::Succeed(json!(format!("{}!", o))));
        let out = run_ai(["one", "two", "three"])
            .runtime(runtime)
            .run_async()
            .await
            .unwrap();

        assert_eq!(
            out,
            AiOutput::List(vec![json!("one!"), json!("two!"), json!("three!")])
        );
    }

    #[tokio::test]
    async fn test_failures_list_every_failed_objective() {
        let runtime = scripted(|o| match o {
            "first" => Step::Succeed(json!("ok")),
            other => Step::Fail(format!("{} is impossible", other)),
        });
        let err = run_ai(["first", "second", "third"])
            .runtime(runtime)
            .run_async()
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("second"));
        assert!(message.contains("third"));
        assert!(!message.contains("first"));
    }

    #[tokio::test]
    async fn test_single_objective_is_unwrapped() {
        let runtime = scripted(|_| Step::Succeed(json!("Paris")));
        let out = run_ai("capital of France")
            .runtime(runtime)
            .run_async()
            .await
            .unwrap();
        assert_eq!(out, AiOutput::Single(json!("Paris")));
    }

    #[tokio::test]
    async fn test_single_element_list_is_not_unwrapped() {
        let runtime = scripted(|_| Step::Succeed(json!("Paris")));
        let out = run_ai(vec!["capital of France"])
            .runtime(runtime)
            .run_async()
            .await
            .unwrap();
        assert_eq!(out, AiOutput::List(vec![json!("Paris")]));
    }

    #[tokio::test]
    async fn test_zero_objectives_runs_nothing() {
        let runtime = Arc::new(ScriptedRuntime::succeed_all());
        let out = run_ai(Vec::<String>::new())
            .runtime(runtime.clone())
            .run_async()
            .await
            .unwrap();
        assert_eq!(out, AiOutput::Empty);
        assert!(runtime.turns().is_empty());
    }

    #[tokio::test]
    async fn test_default_cast_is_string() {
        let runtime = scripted(|_| Step::Succeed(json!(8)));
        let out = run_ai("legs of a spider")
            .runtime(runtime.clone())
            .run_async()
            .await
            .unwrap();
        assert_eq!(out, AiOutput::Single(json!("8")));
        assert_eq!(
            runtime.turns()[0].tasks[0].result_schema,
            Some(json!({"type": "string"}))
        );
    }

    #[tokio::test]
    async fn test_explicit_cast_and_no_cast() {
        let runtime = scripted(|_| Step::Succeed(json!("8")));
        let typed = run_ai("legs")
            .cast(ResultType::Integer)
            .runtime(runtime.clone())
            .run_async()
            .await
            .unwrap();
        assert_eq!(typed, AiOutput::Single(json!(8)));

        let raw = run_ai("legs")
            .cast_with(Cast::None)
            .runtime(runtime)
            .run_async()
            .await
            .unwrap();
        assert_eq!(raw, AiOutput::Single(json!("8")));
    }

    #[tokio::test]
    async fn test_context_and_user_access_are_shared() {
        let runtime = scripted(|_| Step::Succeed(json!("ok")));
        run_ai(["a", "b"])
            .context_value("city", json!("Oslo"))
            .user_access(true)
            .runtime(runtime.clone())
            .run_async()
            .await
            .unwrap();

        let turn = &runtime.turns()[0];
        assert!(turn.tasks.iter().all(|t| t.context["city"] == json!("Oslo")));
        assert!(turn.tasks.iter().all(|t| t.user_access));
        assert!(turn.tool_names.contains(&"talk_to_human".to_string()));
    }

    #[tokio::test]
    async fn test_ambient_flow_owns_inline_tasks() {
        let runtime = scripted(|_| Step::Succeed(json!("ok")));
        let flow = Flow::new(runtime);
        flow
            .scope(run_ai("inside a flow").run_async())
            .await
            .unwrap();
        assert_eq!(flow.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_unfinished_tasks_are_reported() {
        let runtime = scripted(|_| Step::Skip);
        let err = run_ai("ponder forever")
            .runtime(runtime)
            .run_async()
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::TasksIncomplete(ref open) if open == &vec!["ponder forever".to_string()]));
    }

    #[test]
    fn test_blocking_run() {
        let runtime = scripted(|_| Step::Succeed(json!("sync")));
        let out = run_ai("block").runtime(runtime).run().unwrap();
        assert_eq!(out, AiOutput::Single(json!("sync")));
    }

    #[test]
    fn test_task_run_name_truncates() {
        assert_eq!(task_run_name(""), "Task: Follow general instructions");
        let long = "x".repeat(80);
        let name = task_run_name(&long);
        assert!(name.ends_with("..."));
        assert_eq!(name.len(), "Task: ".len() + 75 + 3);
    }
}
