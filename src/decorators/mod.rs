//! Function wrappers that turn ordinary functions into AI tasks and flows.
//!
//! Rust has no decorators, so a wrapped function is described explicitly: a
//! builder takes the name, documentation, parameter list and result type, and
//! a terminal `build` produces a callable with blocking and async forms.

mod binding;
mod flow_fn;
mod task_fn;

pub use binding::{CallArgs, Signature};
pub use flow_fn::{FlowFn, FlowFnBuilder, FlowOptions};
pub use task_fn::{TaskFn, TaskFnBuilder};
