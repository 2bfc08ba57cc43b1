//! Named callables handed to an executor.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Result type returned by task bodies.
pub type TaskResult<T> = anyhow::Result<T>;

type TaskFn<A, T> = dyn Fn(A) -> TaskResult<T> + Send + Sync;

/// A named, cheaply cloneable callable.
///
/// The name identifies the operation in decision records and errors, the way
/// a function name would in a log line.
pub struct Operation<A, T> {
    name: Cow<'static, str>,
    func: Arc<TaskFn<A, T>>,
}

impl<A, T> Operation<A, T> {
    /// Wrap `func` under `name`.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(A) -> TaskResult<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the operation on the calling thread.
    pub fn call(&self, args: A) -> TaskResult<T> {
        (self.func)(args)
    }
}

impl<A, T> Clone for Operation<A, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<A, T> fmt::Debug for Operation<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
