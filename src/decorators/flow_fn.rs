//! Flow functions: each call runs the body in a fresh flow and drives the
//! tasks it creates to completion.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::binding::{CallArgs, Signature};
use crate::agents::Agent;
use crate::blocking;
use crate::error::Result;
use crate::flow::Flow;
use crate::runtime::{RuntimeRef, ThreadId};
use crate::task::{resolve_tasks, Context, FlowValue, Task};
use crate::tools::ToolRef;

const PARENT_INSTRUCTIONS: &str = "Complete all subtasks of this task.";

type FlowBody = dyn Fn(Context) -> BoxFuture<'static, anyhow::Result<FlowValue>> + Send + Sync;

/// Per-call settings for a [`FlowFn`]. Anything set here takes precedence
/// over what the builder configured.
#[derive(Clone, Default)]
pub struct FlowOptions {
    thread: Option<ThreadId>,
    instructions: Option<String>,
    tools: Option<Vec<ToolRef>>,
    agents: Option<Vec<Agent>>,
}

impl FlowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread(mut self, thread: ThreadId) -> Self {
        self.thread = Some(thread);
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Replaces the builder's tools for this call.
    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolRef>) -> Self {
        self.tools = Some(tools.into_iter().collect());
        self
    }

    /// Replaces the builder's agents for this call.
    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents = Some(agents.into_iter().collect());
        self
    }
}

/// A function run as a flow: every call gets a fresh flow, tasks created by
/// the body join it, and all of them are run to completion before the call
/// returns.
#[derive(Clone)]
pub struct FlowFn {
    name: String,
    signature: Signature,
    runtime: RuntimeRef,
    thread: Option<ThreadId>,
    instructions: Option<String>,
    tools: Vec<ToolRef>,
    agents: Vec<Agent>,
    resolve_results: bool,
    body: Arc<FlowBody>,
}

/// Builder for [`FlowFn`].
pub struct FlowFnBuilder {
    name: String,
    signature: Signature,
    runtime: RuntimeRef,
    thread: Option<ThreadId>,
    instructions: Option<String>,
    tools: Vec<ToolRef>,
    agents: Vec<Agent>,
    resolve_results: bool,
}

impl FlowFnBuilder {
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.signature = self.signature.param(name);
        self
    }

    pub fn param_with_default(mut self, name: impl Into<String>, default: serde_json::Value) -> Self {
        self.signature = self.signature.param_with_default(name, default);
        self
    }

    /// Run every call on this existing thread.
    pub fn thread(mut self, thread: ThreadId) -> Self {
        self.thread = Some(thread);
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolRef>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Replace tasks in the body's return value by their results. On by
    /// default.
    pub fn resolve_results(mut self, resolve: bool) -> Self {
        self.resolve_results = resolve;
        self
    }

    /// Attach the body and finish.
    pub fn build<F, Fut>(self, body: F) -> FlowFn
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<FlowValue>> + Send + 'static,
    {
        FlowFn {
            name: self.name,
            signature: self.signature,
            runtime: self.runtime,
            thread: self.thread,
            instructions: self.instructions,
            tools: self.tools,
            agents: self.agents,
            resolve_results: self.resolve_results,
            body: Arc::new(move |ctx| Box::pin(body(ctx))),
        }
    }
}

impl FlowFn {
    pub fn builder(name: impl Into<String>, runtime: RuntimeRef) -> FlowFnBuilder {
        FlowFnBuilder {
            name: name.into(),
            signature: Signature::new(),
            runtime,
            thread: None,
            instructions: None,
            tools: Vec::new(),
            agents: Vec::new(),
            resolve_results: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn new_flow(&self, context: Context, options: &FlowOptions) -> Flow {
        let tools = options.tools.as_ref().unwrap_or(&self.tools);
        let agents = options.agents.as_ref().unwrap_or(&self.agents);
        let mut builder = Flow::builder(self.runtime.clone())
            .name(self.name.clone())
            .context(context)
            .tools(tools.iter().cloned())
            .agents(agents.iter().cloned());
        if let Some(thread) = options.thread.as_ref().or(self.thread.as_ref()) {
            builder = builder.thread(thread.clone());
        }
        if let Some(instructions) = options.instructions.as_ref().or(self.instructions.as_ref()) {
            builder = builder.instructions(instructions.clone());
        }
        builder.build()
    }

    /// Call the flow. With `resolve_results` the output holds no task
    /// handles.
    pub async fn call_async(&self, args: impl Into<CallArgs>) -> Result<FlowValue> {
        self.call_with_options_async(args, FlowOptions::default()).await
    }

    /// [`FlowFn::call_async`] with per-call thread, instructions, tools or
    /// agents.
    pub async fn call_with_options_async(
        &self,
        args: impl Into<CallArgs>,
        options: FlowOptions,
    ) -> Result<FlowValue> {
        let context = self.signature.bind(args.into())?;
        let flow = self.new_flow(context.clone(), &options);

        tracing::info!(
            "Executing AI flow \"{}\" on thread \"{}\"",
            self.name,
            flow.thread()
        );

        let name = self.name.clone();
        let body = Arc::clone(&self.body);
        let resolve = self.resolve_results;

        let work = async move {
            let parent = Task::builder(name)
                .instructions(PARENT_INSTRUCTIONS)
                .auto_complete_by_subtasks()
                .context(context.clone())
                .build();

            let pending = {
                let _guard = parent.enter();
                body(context)
            };
            let result = parent.scope(pending).await?;

            // force any still-open subtasks to completion
            parent.run_async().await?;

            if resolve {
                Ok(FlowValue::Value(resolve_tasks(result)?))
            } else {
                Ok(result)
            }
        };

        flow.scope(work).await
    }

    /// Blocking form of [`FlowFn::call_async`].
    pub fn call(&self, args: impl Into<CallArgs>) -> Result<FlowValue> {
        blocking::block_on(self.call_async(args))?
    }

    /// Blocking form of [`FlowFn::call_with_options_async`].
    pub fn call_with_options(&self, args: impl Into<CallArgs>, options: FlowOptions) -> Result<FlowValue> {
        blocking::block_on(self.call_with_options_async(args, options))?
    }
}
