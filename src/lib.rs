//! agentflow - define AI tasks and flows as ordinary functions.
//!
//! A [`Flow`] is an execution context that owns tasks and pins a conversation
//! thread. A [`Task`] is a unit of work with an objective and a declared
//! result type, driven to completion by [`Agent`]s through an
//! [`AssistantRuntime`]. [`FlowFn`] and [`TaskFn`] wrap functions so that
//! calling them runs a flow or a task; [`run_ai`] runs ad-hoc objectives
//! inline.
//!
//! Tasks created inside a flow (or inside a parent task) attach to it
//! implicitly through the ambient scope, see [`ambient`].

pub mod agents;
pub mod ambient;
mod blocking;
pub mod config;
pub mod decorators;
pub mod devtools;
pub mod dx;
pub mod error;
pub mod flow;
pub mod llm;
pub mod logging;
pub mod runtime;
pub mod task;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use agents::{Agent, Controller};
pub use decorators::{CallArgs, FlowFn, FlowOptions, Signature, TaskFn};
pub use dx::{run_ai, AiOutput, Cast};
pub use error::{FlowError, Result};
pub use flow::Flow;
pub use runtime::{AssistantRuntime, LlmAssistant, RuntimeRef, ThreadId};
pub use task::{Context, FlowValue, ResultType, Task, TaskStatus};
pub use tools::{FnTool, Tool, ToolRef};
