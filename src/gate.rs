//! Memory-gated execution.
//!
//! [`MemoryGatedExecutor`] wraps an [`Executor`] and, for every call that
//! comes with an estimator, runs the decision path
//!
//! ```text
//! estimate -> available -> record check -> policy -> record decision
//!                                                      |-> admitted: run
//!                                                      '-> refused:  record refusal, error
//! ```
//!
//! Calls without an estimator are not gated at all.

use crate::adapters::{ProcMeminfoMonitor, SafetyMarginPolicy, TracingRecorder};
use crate::error::{GateError, MemoryConstraintError, MonitorError, Result};
use crate::memory::MemorySize;
use crate::ports::{DecisionRecorder, MemoryEstimator, MemoryMonitor, MemoryPolicy, MemorySnapshot};
use crate::worker::{Executor, Operation};

/// Outcome of one entry of a gated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSlot<T> {
    /// The entry ran and produced this value.
    Completed(T),
    /// The entry was refused for lack of memory.
    Skipped,
}

impl<T> BatchSlot<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn as_completed(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped => None,
        }
    }

    pub fn into_completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped => None,
        }
    }
}

/// Executor that refuses operations whose estimated memory use does not fit.
///
/// Built with [`new`](Self::new), which reads `/proc/meminfo`, applies a 10%
/// safety margin and records decisions through `tracing`. Each collaborator
/// can be swapped with the `with_*` methods:
///
/// ```
/// use memgate::adapters::{FixedEstimator, SafetyMarginPolicy, StaticMemoryMonitor};
/// use memgate::worker::{InlineExecutor, Operation};
/// use memgate::MemoryGatedExecutor;
///
/// let gate = MemoryGatedExecutor::new(InlineExecutor)
///     .with_monitor(StaticMemoryMonitor::new(16 << 20, 8 << 20))
///     .with_policy(SafetyMarginPolicy::new(0.2).unwrap());
///
/// let double = Operation::new("double", |x: u32| Ok(x * 2));
/// let small = FixedEstimator(1 << 20);
/// assert_eq!(gate.execute(&double, Some(&small), 21).unwrap(), 42);
///
/// let huge = FixedEstimator(1 << 30);
/// assert!(gate.execute(&double, Some(&huge), 21).unwrap_err().is_memory_constraint());
/// ```
pub struct MemoryGatedExecutor<E> {
    executor: E,
    monitor: Box<dyn MemoryMonitor>,
    policy: Box<dyn MemoryPolicy>,
    recorder: Box<dyn DecisionRecorder>,
}

impl<E: Executor> MemoryGatedExecutor<E> {
    /// Gate `executor` with the default monitor, policy and recorder.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            monitor: Box::new(ProcMeminfoMonitor::new()),
            policy: Box::new(SafetyMarginPolicy::default()),
            recorder: Box::new(TracingRecorder),
        }
    }

    pub fn with_monitor(mut self, monitor: impl MemoryMonitor + 'static) -> Self {
        self.monitor = Box::new(monitor);
        self
    }

    pub fn with_policy(mut self, policy: impl MemoryPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_recorder(mut self, recorder: impl DecisionRecorder + 'static) -> Self {
        self.recorder = Box::new(recorder);
        self
    }

    /// The wrapped executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Unwrap the gate, returning the executor.
    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Run `op(args)` if the estimate fits into available memory.
    ///
    /// Without an estimator the call is delegated unconditionally. A refusal
    /// is returned as [`GateError::MemoryConstraint`]; executor failures come
    /// back as [`GateError::Execution`] unchanged.
    pub fn execute<A, T>(
        &self,
        op: &Operation<A, T>,
        estimator: Option<&dyn MemoryEstimator<A>>,
        args: A,
    ) -> Result<T>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        match estimator {
            Some(estimator) => {
                let estimated = estimator.estimate(&args)?;
                self.admit(op.name(), estimated)?;
            }
            None => {
                tracing::debug!(operation = op.name(), "No estimator, executing without memory check");
            }
        }
        Ok(self.executor.run(op, args)?)
    }

    /// Gate every entry of `args_list` in order.
    ///
    /// Each entry gets its own estimate. Refused entries become
    /// [`BatchSlot::Skipped`] and the batch carries on; any other failure
    /// aborts it. The result has one slot per input entry, in input order.
    pub fn execute_batch<A, T>(
        &self,
        op: &Operation<A, T>,
        args_list: Vec<A>,
        estimator: Option<&dyn MemoryEstimator<A>>,
    ) -> Result<Vec<BatchSlot<T>>>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        let total = args_list.len();
        let mut slots = Vec::with_capacity(total);
        let mut skipped = 0usize;

        for args in args_list {
            match self.execute(op, estimator, args) {
                Ok(value) => slots.push(BatchSlot::Completed(value)),
                Err(GateError::MemoryConstraint(_)) => {
                    skipped += 1;
                    slots.push(BatchSlot::Skipped);
                }
                Err(e) => return Err(e),
            }
        }

        if skipped > 0 {
            self.recorder.record_decision(
                &format!("batch_{}", op.name()),
                false,
                &format!(
                    "Skipped {} out of {} executions due to memory constraints",
                    skipped, total
                ),
            );
        }

        Ok(slots)
    }

    /// Run `op(args)` without a memory check.
    pub fn run<A, T>(&self, op: &Operation<A, T>, args: A) -> Result<T>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        Ok(self.executor.run(op, args)?)
    }

    /// Run `op` over `args_list` without memory checks.
    pub fn run_batch<A, T>(&self, op: &Operation<A, T>, args_list: Vec<A>) -> Result<Vec<T>>
    where
        A: Send + 'static,
        T: Send + 'static,
    {
        Ok(self.executor.run_batch(op, args_list)?)
    }

    /// Current memory with `safe_available` as the policy sees it.
    pub fn memory_info(&self) -> std::result::Result<MemorySnapshot, MonitorError> {
        let mut snapshot = self.monitor.snapshot()?;
        snapshot.safe_available = self.policy.safe_available(snapshot.available);
        Ok(snapshot)
    }

    fn admit(&self, operation: &str, estimated: u64) -> Result<()> {
        let available = self.monitor.available()?;
        let safe_available = self.policy.safe_available(available);
        self.recorder.record_check(estimated, available, safe_available);

        if self.policy.should_execute(estimated, available) {
            let reason = format!(
                "estimated {} against {} safe available",
                MemorySize::from_bytes(estimated),
                MemorySize::from_bytes(safe_available)
            );
            self.recorder.record_decision(operation, true, &reason);
            return Ok(());
        }

        let refusal = MemoryConstraintError { estimated, available };
        self.recorder.record_decision(operation, false, &refusal.to_string());
        self.recorder.record_refusal(estimated, available);
        Err(refusal.into())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::adapters::{FnEstimator, NoopRecorder, StaticMemoryMonitor};
    use crate::testing::MockEstimator;
    use crate::worker::InlineExecutor;
    use proptest::prelude::*;

    fn gate(available: u64) -> MemoryGatedExecutor<InlineExecutor> {
        MemoryGatedExecutor::new(InlineExecutor)
            .with_monitor(StaticMemoryMonitor::new(available, available))
            .with_policy(SafetyMarginPolicy::new(0.0).unwrap())
            .with_recorder(NoopRecorder)
    }

    proptest! {
        /// Batch output has one slot per input, in input order.
        #[test]
        fn batch_preserves_length_and_order(
            sizes in prop::collection::vec(0u64..2_000, 0..40),
            available in 0u64..2_000,
        ) {
            let gate = gate(available);
            let op = Operation::new("identity", |x: u64| Ok(x));
            let estimator = FnEstimator::new(|x: &u64| *x);

            let slots = gate.execute_batch(&op, sizes.clone(), Some(&estimator)).unwrap();

            prop_assert_eq!(slots.len(), sizes.len());
            for (slot, size) in slots.iter().zip(&sizes) {
                if *size <= available {
                    prop_assert_eq!(slot, &BatchSlot::Completed(*size));
                } else {
                    prop_assert!(slot.is_skipped());
                }
            }
        }

        /// The estimator runs exactly once per batch entry, even for repeated arguments.
        #[test]
        fn estimator_called_once_per_entry(len in 0usize..30, estimate in 0u64..100) {
            let gate = gate(50);
            let op = Operation::new("constant", |_: u8| Ok(()));
            let estimator = MockEstimator::new(estimate);

            let _ = gate.execute_batch(&op, vec![0u8; len], Some(&estimator)).unwrap();
            prop_assert_eq!(estimator.call_count(), len);
        }
    }
}
