//! memgate - memory-gated task execution.
//!
//! Operations run on an [`Executor`](worker::Executor) (normally a
//! [`WorkerPool`](worker::WorkerPool)). Wrapping the executor in a
//! [`MemoryGatedExecutor`] adds a pre-flight check: an estimator predicts
//! how much memory a call needs, a [`MemoryMonitor`] reports what is
//! available, and a [`MemoryPolicy`] decides whether the call may run.
//! Refused calls fail with [`MemoryConstraintError`]; in a batch they become
//! [`BatchSlot::Skipped`].
//!
//! Every collaborator is a trait in [`ports`] with reference
//! implementations in [`adapters`] and test doubles in [`testing`].

pub mod adapters;
pub mod error;
pub mod gate;
pub mod logging;
pub mod memory;
pub mod operations;
pub mod ports;
pub mod testing;
pub mod worker;

pub use error::{
    EstimationError, ExecutionError, GateError, MemoryConstraintError, MonitorError, PolicyError,
    Result,
};
pub use gate::{BatchSlot, MemoryGatedExecutor};
pub use memory::{MemorySize, ParseSizeError};
pub use ports::{DecisionRecorder, MemoryEstimator, MemoryMonitor, MemoryPolicy, MemorySnapshot};
