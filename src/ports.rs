//! Capability traits the gated executor is built from.
//!
//! The orchestrator only talks to these traits; concrete adapters live in
//! [`crate::adapters`] and test doubles in [`crate::testing`].

use crate::error::{EstimationError, MonitorError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Point-in-time view of host memory, all figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Total physical memory.
    pub total: u64,
    /// Memory that can be handed to a new workload without swapping.
    pub available: u64,
    /// `total - available`.
    pub used: u64,
    /// Share of `total` in use, 0 to 100.
    pub percent: f64,
    /// Portion of `available` considered safe to use. Monitors report
    /// `available` here; the policy's figure replaces it in
    /// [`MemoryGatedExecutor::memory_info`](crate::MemoryGatedExecutor::memory_info).
    pub safe_available: u64,
}

impl MemorySnapshot {
    /// Build a snapshot from total and available figures.
    ///
    /// `available` is clamped to `total`, so `used` never underflows.
    pub fn from_total_available(total: u64, available: u64) -> Self {
        let available = available.min(total);
        let used = total - available;
        let percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };
        Self {
            total,
            available,
            used,
            percent,
            safe_available: available,
        }
    }
}

/// Reports host memory.
pub trait MemoryMonitor: Send + Sync {
    /// Full snapshot of current memory.
    fn snapshot(&self) -> Result<MemorySnapshot, MonitorError>;

    /// Currently available memory in bytes.
    fn available(&self) -> Result<u64, MonitorError> {
        Ok(self.snapshot()?.available)
    }

    /// Total memory in bytes.
    fn total(&self) -> Result<u64, MonitorError> {
        Ok(self.snapshot()?.total)
    }
}

/// Predicts how many bytes an operation will need for the given arguments.
///
/// Estimators must not mutate shared state. The reference adapters are
/// permissive: when they cannot compute an estimate they return `Ok(0)`,
/// which lets the call through. Wrap or replace them when that is unsafe.
pub trait MemoryEstimator<A>: Send + Sync {
    fn estimate(&self, args: &A) -> Result<u64, EstimationError>;
}

/// Decides whether an estimate fits into available memory.
pub trait MemoryPolicy: Send + Sync {
    /// Share of `total_available` the policy lets operations use.
    fn safe_available(&self, total_available: u64) -> u64;

    /// Whether an operation estimated at `estimated` bytes may run.
    ///
    /// `available` is the raw figure from the monitor, never a value already
    /// reduced by [`safe_available`](Self::safe_available).
    fn should_execute(&self, estimated: u64, available: u64) -> bool;
}

/// Observability sink for gate decisions. Must never fail or panic.
pub trait DecisionRecorder: Send + Sync {
    fn record_check(&self, estimated: u64, available: u64, safe_available: u64);

    fn record_decision(&self, operation: &str, admitted: bool, reason: &str);

    fn record_refusal(&self, estimated: u64, available: u64);
}

impl<T: MemoryMonitor + ?Sized> MemoryMonitor for Arc<T> {
    fn snapshot(&self) -> Result<MemorySnapshot, MonitorError> {
        (**self).snapshot()
    }

    fn available(&self) -> Result<u64, MonitorError> {
        (**self).available()
    }

    fn total(&self) -> Result<u64, MonitorError> {
        (**self).total()
    }
}

impl<A, T: MemoryEstimator<A> + ?Sized> MemoryEstimator<A> for Arc<T> {
    fn estimate(&self, args: &A) -> Result<u64, EstimationError> {
        (**self).estimate(args)
    }
}

impl<T: MemoryPolicy + ?Sized> MemoryPolicy for Arc<T> {
    fn safe_available(&self, total_available: u64) -> u64 {
        (**self).safe_available(total_available)
    }

    fn should_execute(&self, estimated: u64, available: u64) -> bool {
        (**self).should_execute(estimated, available)
    }
}

impl<T: DecisionRecorder + ?Sized> DecisionRecorder for Arc<T> {
    fn record_check(&self, estimated: u64, available: u64, safe_available: u64) {
        (**self).record_check(estimated, available, safe_available)
    }

    fn record_decision(&self, operation: &str, admitted: bool, reason: &str) {
        (**self).record_decision(operation, admitted, reason)
    }

    fn record_refusal(&self, estimated: u64, available: u64) {
        (**self).record_refusal(estimated, available)
    }
}
