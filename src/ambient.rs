//! Ambient scope: the currently active flow and parent task.
//!
//! Scopes form a per-thread stack. Synchronous code enters a scope with a
//! guard that pops it on drop; async code wraps a future in [`Scoped`], which
//! pushes its frame only while the inner future is being polled. Either way
//! the innermost scope wins and leaving it restores the enclosing one.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::flow::Flow;
use crate::task::Task;

#[derive(Clone)]
pub(crate) enum Frame {
    Flow(Flow),
    Task(Task),
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a scope active until dropped. Not `Send`: a guard must be dropped on
/// the thread that created it, so it cannot be held across an `.await` in a
/// spawned task.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        STACK.with(|stack| stack.borrow_mut().truncate(self.depth - 1));
    }
}

pub(crate) fn push(frame: Frame) -> ScopeGuard {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(frame);
        ScopeGuard {
            depth: stack.len(),
            _not_send: PhantomData,
        }
    })
}

/// The innermost active flow, if any.
pub fn current_flow() -> Option<Flow> {
    STACK.with(|stack| {
        stack.borrow().iter().rev().find_map(|frame| match frame {
            Frame::Flow(flow) => Some(flow.clone()),
            Frame::Task(_) => None,
        })
    })
}

/// The innermost active parent task of the current flow. A task scope opened
/// outside the innermost flow is not visible.
pub fn current_task() -> Option<Task> {
    STACK.with(|stack| {
        match stack.borrow().last() {
            Some(Frame::Task(task)) => Some(task.clone()),
            _ => None,
        }
    })
}

/// Future that runs its inner future inside a scope frame.
pub struct Scoped<F> {
    frame: Frame,
    inner: Pin<Box<F>>,
}

impl<F: Future> Scoped<F> {
    pub(crate) fn new(frame: Frame, inner: F) -> Self {
        Self {
            frame,
            inner: Box::pin(inner),
        }
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _guard = push(this.frame.clone());
        this.inner.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRuntime;
    use std::sync::Arc;

    fn flow() -> Flow {
        Flow::new(Arc::new(ScriptedRuntime::succeed_all()))
    }

    #[test]
    fn test_nested_flows_restore_enclosing() {
        let a = flow();
        let b = flow();
        assert!(current_flow().is_none());

        let guard_a = a.enter();
        assert_eq!(current_flow(), Some(a.clone()));
        {
            let _guard_b = b.enter();
            assert_eq!(current_flow(), Some(b.clone()));
        }
        assert_eq!(current_flow(), Some(a.clone()));
        drop(guard_a);
        assert!(current_flow().is_none());
    }

    #[test]
    fn test_task_scope_hidden_by_inner_flow() {
        let outer = flow();
        let _flow_guard = outer.enter();
        let parent = Task::builder("parent").build();
        let _task_guard = parent.enter();
        assert_eq!(current_task(), Some(parent.clone()));

        let inner = flow();
        let _inner_guard = inner.enter();
        assert!(current_task().is_none());
        assert_eq!(current_flow(), Some(inner));
    }

    #[tokio::test]
    async fn test_scoped_future_sees_its_flow_only_while_polled() {
        let a = flow();
        let seen = a
            .scope(async {
                tokio::task::yield_now().await;
                current_flow()
            })
            .await;
        assert_eq!(seen, Some(a));
        assert!(current_flow().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_scopes_do_not_interfere() {
        let a = flow();
        let b = flow();

        let check = |f: Flow| {
            let expected = f.clone();
            tokio::spawn(f.scope(async move {
                for _ in 0..50 {
                    tokio::task::yield_now().await;
                    assert_eq!(current_flow(), Some(expected.clone()));
                }
            }))
        };

        let (ra, rb) = tokio::join!(check(a), check(b));
        ra.unwrap();
        rb.unwrap();
    }
}
