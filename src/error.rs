//! Error types for memgate.
//!
//! Each failure domain has its own enum; [`GateError`] aggregates them for the
//! gated execution path.

use crate::memory::MemorySize;
use std::path::PathBuf;
use thiserror::Error;

/// The host memory query failed.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed memory info in {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Field '{field}' missing from {}", .path.display())]
    MissingField { path: PathBuf, field: &'static str },
}

/// An estimator chose to fail instead of returning a permissive zero.
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Memory estimation failed: {0}")]
    Failed(String),
}

/// The policy refused to run an operation.
///
/// This is the one error callers are expected to handle gracefully (skip,
/// retry later, degrade).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "Insufficient memory: estimated {estimated} bytes ({}) exceeds available memory {available} bytes ({})",
    human(.estimated),
    human(.available)
)]
pub struct MemoryConstraintError {
    /// Estimated usage in bytes.
    pub estimated: u64,
    /// Available memory in bytes at decision time.
    pub available: u64,
}

fn human(bytes: &u64) -> MemorySize {
    MemorySize::from_bytes(*bytes)
}

/// Failures of the underlying executor or of the task it ran.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Operation '{operation}' failed: {source}")]
    Failed {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Operation '{operation}' panicked: {message}")]
    Panicked { operation: String, message: String },

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Worker count cannot be zero")]
    InvalidWorkerCount,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl ExecutionError {
    /// Wrap a task failure, keeping its cause chain.
    pub fn failed(operation: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Failed {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Invalid policy configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PolicyError {
    #[error("Safety margin must be a fraction in [0, 1), got {0}")]
    InvalidMargin(f64),
}

/// Everything a gated call can fail with.
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error(transparent)]
    MemoryConstraint(#[from] MemoryConstraintError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl GateError {
    /// Whether this is a policy refusal rather than a hard failure.
    pub fn is_memory_constraint(&self) -> bool {
        matches!(self, Self::MemoryConstraint(_))
    }

    /// The refusal details, if this is a policy refusal.
    pub fn as_memory_constraint(&self) -> Option<&MemoryConstraintError> {
        match self {
            Self::MemoryConstraint(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for gated operations.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_memory_constraint_message_has_both_figures() {
        let err = MemoryConstraintError {
            estimated: 1024 * 1024,
            available: 512 * 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("Insufficient memory"));
        assert!(msg.contains("1048576"));
        assert!(msg.contains("524288"));
        assert!(msg.contains("1 MiB"));
    }

    #[test]
    fn test_gate_error_is_memory_constraint() {
        let refused: GateError = MemoryConstraintError {
            estimated: 2,
            available: 1,
        }
        .into();
        assert!(refused.is_memory_constraint());
        assert_eq!(refused.as_memory_constraint().unwrap().estimated, 2);

        let failed: GateError = ExecutionError::PoolClosed.into();
        assert!(!failed.is_memory_constraint());
        assert!(failed.as_memory_constraint().is_none());
    }

    #[test]
    fn test_execution_failure_keeps_source() {
        let err = ExecutionError::failed("read_file", anyhow::anyhow!("disk on fire"));
        let msg = err.to_string();
        assert!(msg.contains("read_file"));
        assert!(msg.contains("disk on fire"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_gate_error_is_transparent() {
        let err: GateError = ExecutionError::Panicked {
            operation: "boom".into(),
            message: "oops".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Operation 'boom' panicked: oops");
    }

    #[test]
    fn test_monitor_read_error_message() {
        let err = MonitorError::Read {
            path: PathBuf::from("/proc/meminfo"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/proc/meminfo"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_monitor_error_converts_into_gate_error() {
        let err: GateError = MonitorError::MissingField {
            path: PathBuf::from("/proc/meminfo"),
            field: "MemTotal",
        }
        .into();
        assert!(matches!(err, GateError::Monitor(_)));
        assert!(err.to_string().contains("MemTotal"));
    }

    #[test]
    fn test_invalid_margin_message() {
        let msg = PolicyError::InvalidMargin(1.5).to_string();
        assert!(msg.contains("1.5"));
        assert!(msg.contains("[0, 1)"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(EstimationError::Failed("no input".into()).into())
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
