//! Fixed-size worker pool.
//!
//! Workers are named OS threads pulling boxed jobs from one shared channel.
//! Every job catches its own panic and reports the outcome over a private
//! reply channel, so a misbehaving task never takes a worker down.

use super::operation::{Operation, TaskResult};
use super::{Executor, settle};
use crate::error::ExecutionError;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{instrument, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

type Reply<T> = Receiver<thread::Result<TaskResult<T>>>;

/// Default number of worker threads.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    pub worker_count: usize,
    /// Prefix for worker thread names; the worker id is appended.
    pub thread_name: String,
    /// Stack size per worker, `None` for the platform default.
    pub stack_size: Option<usize>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            thread_name: "memgate-worker".to_string(),
            stack_size: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Default configuration with `worker_count` workers.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    panicked: AtomicUsize,
}

impl Counters {
    fn record<T>(&self, outcome: &thread::Result<TaskResult<T>>) {
        let counter = match outcome {
            Ok(Ok(_)) => &self.completed,
            Ok(Err(_)) => &self.failed,
            Err(_) => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A single worker thread.
struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        id: usize,
        config: &WorkerPoolConfig,
        jobs: Receiver<Job>,
    ) -> Result<Self, ExecutionError> {
        let mut builder = thread::Builder::new().name(format!("{}-{}", config.thread_name, id));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }
        let handle = builder
            .spawn(move || worker_loop(id, jobs))
            .map_err(ExecutionError::Spawn)?;
        Ok(Self {
            id,
            handle: Some(handle),
        })
    }
}

fn worker_loop(id: usize, jobs: Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        job();
    }
    trace!(worker_id = id, "Job channel closed, worker exiting");
}

/// A pool of worker threads executing operations.
///
/// Dropping the pool closes the job channel and joins every worker, so the
/// threads are released on every exit path, including unwinding.
pub struct WorkerPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Create a new worker pool and spawn its threads.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, ExecutionError> {
        if config.worker_count == 0 {
            return Err(ExecutionError::InvalidWorkerCount);
        }

        tracing::info!(workers = config.worker_count, "Initializing worker pool");

        let (sender, receiver) = unbounded::<Job>();

        let mut pool = Self {
            workers: Vec::with_capacity(config.worker_count),
            sender: Some(sender),
            counters: Arc::new(Counters::default()),
        };
        for id in 0..config.worker_count {
            // On failure, dropping `pool` joins the workers spawned so far.
            let worker = Worker::spawn(id, &config, receiver.clone())?;
            pool.workers.push(worker);
        }

        Ok(pool)
    }

    /// Pool with the default configuration and `worker_count` workers.
    pub fn with_workers(worker_count: usize) -> Result<Self, ExecutionError> {
        Self::new(WorkerPoolConfig::with_workers(worker_count))
    }

    /// Get the number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue `op(args)` and return the channel its outcome arrives on.
    fn dispatch<A, T>(&self, op: &Operation<A, T>, args: A) -> Result<Reply<T>, ExecutionError>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(ExecutionError::PoolClosed)?;
        let (tx, rx) = bounded(1);
        let op = op.clone();
        let counters = Arc::clone(&self.counters);

        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| op.call(args)));
            counters.record(&outcome);
            // The caller may have stopped waiting (batch aborted early).
            let _ = tx.send(outcome);
        });

        sender.send(job).map_err(|_| ExecutionError::PoolClosed)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(rx)
    }

    fn collect<T>(name: &str, reply: Reply<T>) -> Result<T, ExecutionError> {
        let outcome = reply.recv().map_err(|_| ExecutionError::PoolClosed)?;
        settle(name, outcome)
    }

    /// Close the job channel and join all workers. Idempotent.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take()
                && handle.join().is_err()
            {
                tracing::warn!(worker_id = worker.id, "Worker thread panicked");
            }
        }
        tracing::debug!(workers = self.workers.len(), "Worker pool shut down");
    }

    /// Get statistics about the worker pool.
    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            worker_count: self.workers.len(),
            jobs_submitted: self.counters.submitted.load(Ordering::Relaxed),
            jobs_completed: self.counters.completed.load(Ordering::Relaxed),
            jobs_failed: self.counters.failed.load(Ordering::Relaxed),
            jobs_panicked: self.counters.panicked.load(Ordering::Relaxed),
            peak_rss_bytes: peak_rss_bytes(),
        }
    }
}

impl Executor for WorkerPool {
    #[instrument(level = "debug", skip(self, op, args), fields(operation = op.name()))]
    fn run<A, T>(&self, op: &Operation<A, T>, args: A) -> Result<T, ExecutionError>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        let reply = self.dispatch(op, args)?;
        Self::collect(op.name(), reply)
    }

    #[instrument(level = "debug", skip(self, op, args_list), fields(operation = op.name(), tasks = args_list.len()))]
    fn run_batch<A, T>(&self, op: &Operation<A, T>, args_list: Vec<A>) -> Result<Vec<T>, ExecutionError>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        let replies = args_list
            .into_iter()
            .map(|args| self.dispatch(op, args))
            .collect::<Result<Vec<_>, _>>()?;

        let results = replies
            .into_iter()
            .map(|reply| Self::collect(op.name(), reply))
            .collect::<Result<Vec<_>, _>>()?;

        trace!(
            operation = op.name(),
            tasks = results.len(),
            batch_time_ms = start.elapsed().as_millis(),
            "Batch completed"
        );
        Ok(results)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Statistics about the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolStats {
    /// Number of workers in the pool.
    pub worker_count: usize,
    /// Jobs accepted by the pool.
    pub jobs_submitted: usize,
    /// Jobs whose task returned `Ok`.
    pub jobs_completed: usize,
    /// Jobs whose task returned an error.
    pub jobs_failed: usize,
    /// Jobs whose task panicked.
    pub jobs_panicked: usize,
    /// Peak resident set size of this process, if the OS reports it.
    pub peak_rss_bytes: Option<u64>,
}

/// Peak resident set size of the current process via `getrusage()`.
pub fn peak_rss_bytes() -> Option<u64> {
    use nix::sys::resource::{UsageWho, getrusage};

    let usage = getrusage(UsageWho::RUSAGE_SELF).ok()?;
    let max_rss = u64::try_from(usage.max_rss()).ok()?;

    // macOS reports bytes, Linux reports kilobytes.
    #[cfg(target_os = "macos")]
    let bytes = max_rss;
    #[cfg(not(target_os = "macos"))]
    let bytes = max_rss.saturating_mul(1024);

    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.thread_name, "memgate-worker");
        assert!(config.stack_size.is_none());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            WorkerPool::with_workers(0),
            Err(ExecutionError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn test_run_returns_result() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let square = Operation::new("square", |x: u64| Ok(x * x));
        assert_eq!(pool.run(&square, 7).unwrap(), 49);
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn test_run_runs_on_worker_thread() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            worker_count: 1,
            thread_name: "test-pool".into(),
            stack_size: Some(256 * 1024),
        })
        .unwrap();
        let whoami = Operation::new("whoami", |_: ()| {
            Ok(thread::current().name().map(String::from))
        });
        assert_eq!(pool.run(&whoami, ()).unwrap().as_deref(), Some("test-pool-0"));
    }

    #[test]
    fn test_run_batch_preserves_order() {
        let pool = WorkerPool::with_workers(4).unwrap();
        // Later tasks finish first.
        let slow_first = Operation::new("slow_first", |i: u64| {
            thread::sleep(Duration::from_millis((8 - i) * 5));
            Ok(i * 10)
        });
        let results = pool.run_batch(&slow_first, (0..8).collect()).unwrap();
        assert_eq!(results, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn test_workers_take_jobs_concurrently() {
        use std::sync::Barrier;

        // Every job waits for all the others, so this only finishes when
        // each worker holds a job at the same time.
        let pool = WorkerPool::with_workers(4).unwrap();
        let barrier = Arc::new(Barrier::new(4));
        let rendezvous = Operation::new("rendezvous", move |_: usize| {
            barrier.wait();
            Ok(thread::current().name().map(String::from))
        });
        let mut workers = pool.run_batch(&rendezvous, (0..4).collect()).unwrap();
        workers.sort();
        workers.dedup();
        assert_eq!(workers.len(), 4);
    }

    #[test]
    fn test_run_batch_empty() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let op = Operation::new("noop", |x: u8| Ok(x));
        assert!(pool.run_batch(&op, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_task_error_passes_through() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let op: Operation<(), ()> = Operation::new("broken", |_| anyhow::bail!("kaput"));
        let err = pool.run(&op, ()).unwrap_err();
        match err {
            ExecutionError::Failed { operation, source } => {
                assert_eq!(operation, "broken");
                assert_eq!(source.to_string(), "kaput");
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_run_batch_reports_first_failure_in_order() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let op = Operation::new("odd_fails", |i: u32| {
            if i % 2 == 1 {
                anyhow::bail!("task {} failed", i);
            }
            Ok(i)
        });
        let err = pool.run_batch(&op, vec![0, 2, 3, 5]).unwrap_err();
        assert!(err.to_string().contains("task 3 failed"));
    }

    #[test]
    fn test_panic_is_contained() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let op: Operation<(), ()> = Operation::new("boom", |_| panic!("worker exploded"));
        let err = pool.run(&op, ()).unwrap_err();
        match err {
            ExecutionError::Panicked { operation, message } => {
                assert_eq!(operation, "boom");
                assert!(message.contains("worker exploded"));
            }
            other => panic!("Expected Panicked, got {:?}", other),
        }

        // The single worker survived and still serves jobs.
        let ok = Operation::new("ok", |x: i32| Ok(x + 1));
        assert_eq!(pool.run(&ok, 1).unwrap(), 2);
    }

    #[test]
    fn test_stats() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let op = Operation::new("maybe", |ok: bool| {
            if ok { Ok(()) } else { anyhow::bail!("no") }
        });
        pool.run(&op, true).unwrap();
        pool.run(&op, true).unwrap();
        let _ = pool.run(&op, false);

        let stats = pool.stats();
        assert_eq!(stats.worker_count, 2);
        assert_eq!(stats.jobs_submitted, 3);
        assert_eq!(stats.jobs_completed, 2);
        assert_eq!(stats.jobs_failed, 1);
        assert_eq!(stats.jobs_panicked, 0);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_closes_pool() {
        let mut pool = WorkerPool::with_workers(2).unwrap();
        pool.shutdown();
        pool.shutdown();
        let op = Operation::new("late", |x: i32| Ok(x));
        assert!(matches!(pool.run(&op, 1), Err(ExecutionError::PoolClosed)));
    }

    #[test]
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    fn test_peak_rss_reported() {
        let rss = peak_rss_bytes().unwrap();
        // At least a megabyte, less than 1 TiB.
        assert!(rss > 1024 * 1024);
        assert!(rss < 1 << 40);
    }
}
