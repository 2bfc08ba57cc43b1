//! Executors that run operations on behalf of the gate.
//!
//! The gate only needs "run this callable and give me its result". That
//! capability is the [`Executor`] trait, with two implementations:
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │   Caller        │
//!                     │ (gate / demo)   │
//!                     └────────┬────────┘
//!                              │ job channel
//!               ┌──────────────┼──────────────┐
//!               │              │              │
//!         ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!         │ Worker 0  │  │ Worker 1  │  │ Worker N  │
//!         │ (thread)  │  │ (thread)  │  │ (thread)  │
//!         └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! - [`WorkerPool`]: fixed-size pool of named threads, joined on drop
//! - [`InlineExecutor`]: runs on the calling thread
//!
//! Both contain task panics and report them as [`ExecutionError::Panicked`].

mod operation;
mod pool;

pub use operation::{Operation, TaskResult};
pub use pool::{
    DEFAULT_WORKER_COUNT, WorkerPool, WorkerPoolConfig, WorkerPoolStats, peak_rss_bytes,
};

use crate::error::ExecutionError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Runs operations and hands back their results.
pub trait Executor {
    /// Run `op(args)` and block until it finishes.
    fn run<A, T>(&self, op: &Operation<A, T>, args: A) -> Result<T, ExecutionError>
    where
        A: Send + 'static,
        T: Send + 'static;

    /// Run `op` once per entry of `args_list`.
    ///
    /// Results come back in input order. The first failure in input order is
    /// returned and the other results are discarded.
    fn run_batch<A, T>(&self, op: &Operation<A, T>, args_list: Vec<A>) -> Result<Vec<T>, ExecutionError>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        args_list.into_iter().map(|args| self.run(op, args)).collect()
    }
}

/// Runs every operation on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn run<A, T>(&self, op: &Operation<A, T>, args: A) -> Result<T, ExecutionError>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| op.call(args)));
        settle(op.name(), outcome)
    }
}

/// Turn a caught task outcome into the executor's result.
pub(crate) fn settle<T>(
    operation: &str,
    outcome: thread::Result<TaskResult<T>>,
) -> Result<T, ExecutionError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ExecutionError::failed(operation, e)),
        Err(payload) => Err(ExecutionError::Panicked {
            operation: operation.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
