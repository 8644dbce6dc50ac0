//! Task functions: each call becomes one AI task built from the bound
//! arguments.

use serde_json::Value;

use super::binding::{CallArgs, Signature};
use crate::agents::Agent;
use crate::error::Result;
use crate::task::{ResultType, Task};
use crate::tools::ToolRef;

/// A function whose calls are answered by an AI task.
///
/// The objective defaults to the function name and the instructions to its
/// documentation; call arguments become the task context.
#[derive(Clone)]
pub struct TaskFn {
    name: String,
    objective: String,
    instructions: Option<String>,
    signature: Signature,
    result_type: Option<ResultType>,
    agents: Option<Vec<Agent>>,
    tools: Vec<ToolRef>,
    user_access: bool,
}

/// Builder for [`TaskFn`].
pub struct TaskFnBuilder {
    name: String,
    doc: Option<String>,
    objective: Option<String>,
    objective_includes_doc: bool,
    instructions: Option<String>,
    signature: Signature,
    result_type: Option<ResultType>,
    agents: Option<Vec<Agent>>,
    tools: Vec<ToolRef>,
    user_access: bool,
}

impl TaskFnBuilder {
    /// Documentation of the function; default instructions.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    /// Derive the objective as `"name: doc"` when no objective is given.
    pub fn objective_includes_doc(mut self, enabled: bool) -> Self {
        self.objective_includes_doc = enabled;
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.signature = self.signature.param(name);
        self
    }

    pub fn param_with_default(mut self, name: impl Into<String>, default: Value) -> Self {
        self.signature = self.signature.param_with_default(name, default);
        self
    }

    /// Declared return type of the function.
    pub fn result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = Some(result_type);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents = Some(agents.into_iter().collect());
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

    pub fn build(self) -> TaskFn {
        // the doc is used once, in the objective or as instructions
        let (objective, doc) = match (self.objective, self.doc) {
            (Some(objective), doc) => (objective, doc),
            (None, Some(doc)) if self.objective_includes_doc => {
                (format!("{}: {}", self.name, doc), None)
            }
            (None, doc) => (self.name.clone(), doc),
        };

        TaskFn {
            objective,
            instructions: self.instructions.or(doc),
            name: self.name,
            signature: self.signature,
            result_type: self.result_type,
            agents: self.agents,
            tools: self.tools,
            user_access: self.user_access,
        }
    }
}

impl TaskFn {
    pub fn builder(name: impl Into<String>) -> TaskFnBuilder {
        TaskFnBuilder {
            name: name.into(),
            doc: None,
            objective: None,
            objective_includes_doc: false,
            instructions: None,
            signature: Signature::new(),
            result_type: None,
            agents: None,
            tools: Vec::new(),
            user_access: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Bind `args` and create the task for one call, registered with the
    /// ambient flow and parent.
    pub fn create_task(&self, args: impl Into<CallArgs>, agents: Option<Vec<Agent>>) -> Result<Task> {
        let context = self.signature.bind(args.into())?;

        Ok(Task::builder(self.objective.clone())
            .maybe_instructions(self.instructions.clone())
            .context(context)
            .maybe_result_type(self.result_type.clone())
            .tools(self.tools.iter().cloned())
            .maybe_agents(agents.or_else(|| self.agents.clone()))
            .user_access(self.user_access)
            .build())
    }

    pub async fn call_async(&self, args: impl Into<CallArgs>) -> Result<Value> {
        self.create_task(args, None)?.run_async().await
    }

    /// Blocking call.
    pub fn call(&self, args: impl Into<CallArgs>) -> Result<Value> {
        self.create_task(args, None)?.run()
    }

    /// Blocking call with agents overriding the configured ones.
    pub fn call_with_agents(&self, args: impl Into<CallArgs>, agents: Vec<Agent>) -> Result<Value> {
        self.create_task(args, Some(agents))?.run()
    }

    pub async fn call_with_agents_async(
        &self,
        args: impl Into<CallArgs>,
        agents: Vec<Agent>,
    ) -> Result<Value> {
        self.create_task(args, Some(agents))?.run_async().await
    }
}
