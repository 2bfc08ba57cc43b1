//! Test doubles for the capability traits.
//!
//! Every double keeps its own counters behind atomics or a mutex, so it can be
//! shared through an `Arc` and inspected after the gate has used it.

use crate::error::{EstimationError, MonitorError};
use crate::memory::MemorySize;
use crate::ports::{DecisionRecorder, MemoryEstimator, MemoryMonitor, MemoryPolicy, MemorySnapshot};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Monitor reporting configurable figures.
#[derive(Debug)]
pub struct MockMemoryMonitor {
    total: AtomicU64,
    available: AtomicU64,
    failing: AtomicBool,
}

impl MockMemoryMonitor {
    pub fn new(total: u64, available: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            available: AtomicU64::new(available),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: u64) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every subsequent query fail with [`MonitorError::Read`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for MockMemoryMonitor {
    /// 8 GiB total, 4 GiB available.
    fn default() -> Self {
        Self::new(MemorySize::from_gib(8).as_bytes(), MemorySize::from_gib(4).as_bytes())
    }
}

impl MemoryMonitor for MockMemoryMonitor {
    fn snapshot(&self) -> Result<MemorySnapshot, MonitorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MonitorError::Read {
                path: PathBuf::from("mock"),
                source: io::Error::other("simulated monitor failure"),
            });
        }
        Ok(MemorySnapshot::from_total_available(
            self.total.load(Ordering::SeqCst),
            self.available.load(Ordering::SeqCst),
        ))
    }
}

/// Estimator returning a fixed figure and counting its calls.
#[derive(Debug)]
pub struct MockEstimator {
    estimate: AtomicU64,
    calls: AtomicUsize,
}

impl MockEstimator {
    pub fn new(estimate: u64) -> Self {
        Self {
            estimate: AtomicU64::new(estimate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_estimate(&self, estimate: u64) {
        self.estimate.store(estimate, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockEstimator {
    /// 1 MiB.
    fn default() -> Self {
        Self::new(MemorySize::from_mib(1).as_bytes())
    }
}

impl<A> MemoryEstimator<A> for MockEstimator {
    fn estimate(&self, _args: &A) -> Result<u64, EstimationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.estimate.load(Ordering::SeqCst))
    }
}

/// Estimator returning a scripted sequence of figures.
///
/// Once the script runs out the last figure repeats; an empty script
/// estimates zero.
#[derive(Debug)]
pub struct SequenceEstimator {
    values: Vec<u64>,
    calls: AtomicUsize,
}

impl SequenceEstimator {
    pub fn new(values: impl Into<Vec<u64>>) -> Self {
        Self {
            values: values.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<A> MemoryEstimator<A> for SequenceEstimator {
    fn estimate(&self, _args: &A) -> Result<u64, EstimationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let value = match self.values.len() {
            0 => 0,
            len => self.values[call.min(len - 1)],
        };
        Ok(value)
    }
}

/// Estimator that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingEstimator {
    pub reason: String,
}

impl<A> MemoryEstimator<A> for FailingEstimator {
    fn estimate(&self, _args: &A) -> Result<u64, EstimationError> {
        Err(EstimationError::Failed(self.reason.clone()))
    }
}

/// Policy with a configurable verdict that records every decision.
#[derive(Debug)]
pub struct MockPolicy {
    verdict: AtomicBool,
    safety_margin: f64,
    decisions: Mutex<Vec<(u64, u64)>>,
}

impl MockPolicy {
    pub fn new(should_execute: bool, safety_margin: f64) -> Self {
        Self {
            verdict: AtomicBool::new(should_execute),
            safety_margin,
            decisions: Mutex::new(Vec::new()),
        }
    }

    /// Admits everything, 10% margin.
    pub fn admitting() -> Self {
        Self::new(true, 0.1)
    }

    /// Refuses everything, 10% margin.
    pub fn refusing() -> Self {
        Self::new(false, 0.1)
    }

    pub fn set_should_execute(&self, should_execute: bool) {
        self.verdict.store(should_execute, Ordering::SeqCst);
    }

    pub fn decision_count(&self) -> usize {
        lock(&self.decisions).len()
    }

    /// `(estimated, available)` pairs passed to `should_execute`.
    pub fn decision_history(&self) -> Vec<(u64, u64)> {
        lock(&self.decisions).clone()
    }
}

impl MemoryPolicy for MockPolicy {
    fn safe_available(&self, total_available: u64) -> u64 {
        MemorySize::from_bytes(total_available)
            .scale(1.0 - self.safety_margin)
            .as_bytes()
    }

    fn should_execute(&self, estimated: u64, available: u64) -> bool {
        lock(&self.decisions).push((estimated, available));
        self.verdict.load(Ordering::SeqCst)
    }
}

/// A decision as seen by [`MockRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDecision {
    pub operation: String,
    pub admitted: bool,
    pub reason: String,
}

/// Recorder that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MockRecorder {
    checks: Mutex<Vec<(u64, u64, u64)>>,
    decisions: Mutex<Vec<RecordedDecision>>,
    refusals: Mutex<Vec<(u64, u64)>>,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(estimated, available, safe_available)` per check.
    pub fn checks(&self) -> Vec<(u64, u64, u64)> {
        lock(&self.checks).clone()
    }

    pub fn decisions(&self) -> Vec<RecordedDecision> {
        lock(&self.decisions).clone()
    }

    /// `(estimated, available)` per refusal.
    pub fn refusals(&self) -> Vec<(u64, u64)> {
        lock(&self.refusals).clone()
    }

    pub fn clear(&self) {
        lock(&self.checks).clear();
        lock(&self.decisions).clear();
        lock(&self.refusals).clear();
    }
}

impl DecisionRecorder for MockRecorder {
    fn record_check(&self, estimated: u64, available: u64, safe_available: u64) {
        lock(&self.checks).push((estimated, available, safe_available));
    }

    fn record_decision(&self, operation: &str, admitted: bool, reason: &str) {
        lock(&self.decisions).push(RecordedDecision {
            operation: operation.to_string(),
            admitted,
            reason: reason.to_string(),
        });
    }

    fn record_refusal(&self, estimated: u64, available: u64) {
        lock(&self.refusals).push((estimated, available));
    }
}
