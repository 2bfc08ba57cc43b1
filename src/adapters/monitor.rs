//! Host memory monitors.
//!
//! [`ProcMeminfoMonitor`] reads `/proc/meminfo` on every query:
//!
//! ```text
//! MemTotal:       16318412 kB
//! MemFree:         1203464 kB
//! MemAvailable:    9871324 kB
//! Buffers:          412660 kB
//! Cached:          7612072 kB
//! ```
//!
//! `MemAvailable` is preferred. Kernels older than 3.14 lack it, in which case
//! `MemFree + Buffers + Cached` is used instead.

use crate::error::MonitorError;
use crate::ports::{MemoryMonitor, MemorySnapshot};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the kernel's memory accounting file.
pub const PROC_MEMINFO: &str = "/proc/meminfo";

/// Reads memory figures from a `meminfo`-formatted file.
#[derive(Debug, Clone)]
pub struct ProcMeminfoMonitor {
    path: PathBuf,
}

impl Default for ProcMeminfoMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcMeminfoMonitor {
    /// Monitor backed by `/proc/meminfo`.
    pub fn new() -> Self {
        Self::with_path(PROC_MEMINFO)
    }

    /// Monitor backed by an arbitrary file in `meminfo` format.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MemoryMonitor for ProcMeminfoMonitor {
    fn snapshot(&self) -> Result<MemorySnapshot, MonitorError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| MonitorError::Read {
            path: self.path.clone(),
            source,
        })?;
        parse_meminfo(&self.path, &contents)
    }
}

/// Parse `meminfo` contents into a snapshot.
pub fn parse_meminfo(path: &Path, contents: &str) -> Result<MemorySnapshot, MonitorError> {
    let mut total = None;
    let mut available = None;
    let mut mem_free = None;
    let mut buffers = 0u64;
    let mut cached = 0u64;

    for line in contents.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "MemTotal" => total = Some(parse_kib(path, key, rest)?),
            "MemAvailable" => available = Some(parse_kib(path, key, rest)?),
            "MemFree" => mem_free = Some(parse_kib(path, key, rest)?),
            "Buffers" => buffers = parse_kib(path, key, rest)?,
            "Cached" => cached = parse_kib(path, key, rest)?,
            _ => {}
        }
    }

    let total = total.ok_or_else(|| MonitorError::MissingField {
        path: path.to_path_buf(),
        field: "MemTotal",
    })?;

    let available = match (available, mem_free) {
        (Some(kib), _) => kib,
        (None, Some(free)) => free.saturating_add(buffers).saturating_add(cached),
        (None, None) => {
            return Err(MonitorError::MissingField {
                path: path.to_path_buf(),
                field: "MemAvailable",
            });
        }
    };

    Ok(MemorySnapshot::from_total_available(
        total.saturating_mul(1024),
        available.saturating_mul(1024),
    ))
}

/// Parse the value column of a meminfo line ("   12345 kB").
fn parse_kib(path: &Path, key: &str, rest: &str) -> Result<u64, MonitorError> {
    let value = rest.split_whitespace().next().unwrap_or_default();
    value.parse().map_err(|_| MonitorError::Parse {
        path: path.to_path_buf(),
        reason: format!("bad value '{}' for {}", value, key.trim()),
    })
}

/// Monitor reporting fixed figures.
///
/// Used to pin available memory from the command line and in tests that do
/// not need to change memory between calls.
#[derive(Debug, Clone, Copy)]
pub struct StaticMemoryMonitor {
    total: u64,
    available: u64,
}

impl StaticMemoryMonitor {
    pub fn new(total: u64, available: u64) -> Self {
        Self { total, available }
    }
}

impl MemoryMonitor for StaticMemoryMonitor {
    fn snapshot(&self) -> Result<MemorySnapshot, MonitorError> {
        Ok(MemorySnapshot::from_total_available(
            self.total,
            self.available,
        ))
    }
}
