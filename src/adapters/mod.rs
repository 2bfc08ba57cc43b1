//! Concrete implementations of the capability traits in [`crate::ports`].

mod estimators;
mod monitor;
mod policy;
mod recorder;

pub use estimators::{
    DataSizeEstimator, FileSizeEstimator, FixedEstimator, FnEstimator, ListSizeEstimator,
};
pub use monitor::{PROC_MEMINFO, ProcMeminfoMonitor, StaticMemoryMonitor, parse_meminfo};
pub use policy::{DEFAULT_SAFETY_MARGIN, SafetyMarginPolicy};
pub use recorder::{DECISION_TARGET, NoopRecorder, TracingRecorder};
