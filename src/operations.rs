//! Example workloads used by the demo binary and the tests.

use crate::memory::MemorySize;
use anyhow::{Context, Result, bail};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

const CHUNK_SIZE: usize = 1024 * 1024;
const STRING_PATTERN: &str = "Hello, World! ";

/// Read a whole UTF-8 file into a string.
pub fn read_file_to_string(path: &Path) -> Result<String> {
    info!(path = %path.display(), "Reading file");
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    info!(path = %path.display(), chars = content.chars().count(), "Read file");
    Ok(content)
}

/// Build a string of roughly `size` bytes by repeating a short pattern.
pub fn create_large_string(size: MemorySize) -> String {
    info!(size = %size, "Creating large string");
    let repetitions = size.as_bytes() as usize / STRING_PATTERN.len();
    let result = STRING_PATTERN.repeat(repetitions);
    info!(len = result.len(), "Created large string");
    result
}

/// Produce `item_count` doubled integers.
pub fn process_large_list(item_count: usize) -> Vec<u64> {
    info!(items = item_count, "Processing list");
    let result: Vec<u64> = (0..item_count as u64).map(|i| i * 2).collect();
    info!(items = result.len(), "Processed list");
    result
}

/// Allocate `size` bytes as 1 MiB chunks; the last chunk may be shorter.
pub fn memory_intensive_operation(size: MemorySize) -> Vec<Vec<u8>> {
    info!(size = %size, "Running memory-intensive operation");
    let total = size.as_bytes() as usize;
    let chunks: Vec<Vec<u8>> = (0..total)
        .step_by(CHUNK_SIZE)
        .map(|offset| vec![b'x'; CHUNK_SIZE.min(total - offset)])
        .collect();
    info!(chunks = chunks.len(), "Allocated data chunks");
    chunks
}

/// File operation performed by [`safe_file_operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
    Delete,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

impl FromStr for FileOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            other => bail!("Unknown file operation: {}", other),
        }
    }
}

/// Read, write or delete `path`, logging failures before returning them.
///
/// `Read` returns the file contents; `Write` and `Delete` return a status line.
pub fn safe_file_operation(path: &Path, op: FileOp) -> Result<String> {
    info!(path = %path.display(), operation = %op, "Performing file operation");

    let outcome = match op {
        FileOp::Read => fs::read_to_string(path),
        FileOp::Write => fs::write(path, "Test content").map(|_| "File written successfully".to_string()),
        FileOp::Delete => fs::remove_file(path).map(|_| "File deleted successfully".to_string()),
    };

    outcome.map_err(|e| {
        error!(path = %path.display(), operation = %op, error = %e, "File operation failed");
        anyhow::Error::new(e).context(format!("Failed to {} {}", op, path.display()))
    })
}

/// Trivial task used to show work landing on a worker.
pub fn example_worker_task(task_id: u32) -> String {
    info!(task_id, "Worker executing task");
    format!("Task {} completed in worker", task_id)
}

/// `n!`, failing on overflow.
pub fn factorial(n: u32) -> Result<u128> {
    info!(n, "Computing factorial");
    (1..=u128::from(n)).try_fold(1u128, |acc, i| {
        acc.checked_mul(i)
            .with_context(|| format!("Factorial of {} overflows u128", n))
    })
}
