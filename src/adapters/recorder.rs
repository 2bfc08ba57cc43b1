//! Decision recorders.

use crate::memory::MemorySize;
use crate::ports::DecisionRecorder;

/// Target used for every decision event, so they can be filtered with
/// `MEMGATE_LOG=memgate::decision=debug` and similar.
pub const DECISION_TARGET: &str = "memgate::decision";

/// Emits gate decisions as structured `tracing` events.
///
/// Checks and admissions are logged at INFO; skips and refusals at WARN.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecorder;

impl DecisionRecorder for TracingRecorder {
    fn record_check(&self, estimated: u64, available: u64, safe_available: u64) {
        tracing::info!(
            target: DECISION_TARGET,
            estimated,
            available,
            safe_available,
            "Memory check: available={}, estimated={}, safe available={}",
            MemorySize::from_bytes(available),
            MemorySize::from_bytes(estimated),
            MemorySize::from_bytes(safe_available),
        );
    }

    fn record_decision(&self, operation: &str, admitted: bool, reason: &str) {
        if admitted {
            tracing::info!(
                target: DECISION_TARGET,
                operation,
                reason,
                "Executing {} with sufficient memory",
                operation
            );
        } else {
            tracing::warn!(
                target: DECISION_TARGET,
                operation,
                reason,
                "Skipping {}: {}",
                operation,
                reason
            );
        }
    }

    fn record_refusal(&self, estimated: u64, available: u64) {
        tracing::warn!(
            target: DECISION_TARGET,
            estimated,
            available,
            "Insufficient memory: estimated {} exceeds available {}",
            MemorySize::from_bytes(estimated),
            MemorySize::from_bytes(available),
        );
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl DecisionRecorder for NoopRecorder {
    fn record_check(&self, _estimated: u64, _available: u64, _safe_available: u64) {}

    fn record_decision(&self, _operation: &str, _admitted: bool, _reason: &str) {}

    fn record_refusal(&self, _estimated: u64, _available: u64) {}
}
