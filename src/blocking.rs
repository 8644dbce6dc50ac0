//! Driving async work to completion from synchronous callers.

use std::future::Future;

use tokio::runtime::{Builder, Handle, RuntimeFlavor};

use crate::error::{FlowError, Result};

/// Run `fut` to completion on the calling thread.
///
/// Outside any runtime a current-thread runtime is built for the call. Inside
/// a multi-threaded runtime the worker is handed off with `block_in_place`.
/// A current-thread runtime cannot block on itself, so that case errors.
pub(crate) fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(FlowError::BlockingInAsync),
            _ => Ok(tokio::task::block_in_place(|| handle.block_on(fut))),
        },
        Err(_) => {
            let runtime = Builder::new_current_thread().enable_all().build()?;
            Ok(runtime.block_on(fut))
        }
    }
}
