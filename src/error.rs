//! Error types for flows, tasks and agent runs.

use crate::task::TaskStatus;

/// Result type for agentflow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors raised to the caller of a flow, task or inline run.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Call arguments do not satisfy the declared signature
    #[error("Argument binding failed: {0}")]
    ArgumentBinding(String),

    /// An agent was run outside of any flow scope
    #[error("No active flow: agents must be run inside a flow")]
    NoActiveFlow,

    /// Neither the agent nor the flow provides an assistant runtime
    #[error("No assistant runtime available for agent \"{0}\"")]
    NoRuntime(String),

    /// A task returned from a flow body did not succeed
    #[error("Task \"{objective}\" could not be resolved: status is {status}")]
    TaskResolution {
        objective: String,
        status: TaskStatus,
    },

    /// A single task run ended in failure
    #[error("Task \"{objective}\" failed: {reason}")]
    TaskFailed { objective: String, reason: String },

    /// One or more tasks of an inline run failed
    #[error("Failed tasks: {}", .0.join(", "))]
    TasksFailed(Vec<String>),

    /// Tasks were still open when the controller stopped
    #[error("Tasks did not complete: {}", .0.join(", "))]
    TasksIncomplete(Vec<String>),

    /// A result could not be coerced into the requested type
    #[error("Cannot cast {value} to {target}")]
    Cast { value: String, target: String },

    /// A blocking entry point was called on a current-thread runtime
    #[error("Blocking run called from within a single-threaded async runtime; use the async form")]
    BlockingInAsync,

    /// Error reported by the assistant runtime or a flow body
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Create an argument binding error
    pub fn binding<S: Into<String>>(msg: S) -> Self {
        Self::ArgumentBinding(msg.into())
    }
}
