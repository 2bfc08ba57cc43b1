//! Command-line interface definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use memgate::adapters::{DEFAULT_SAFETY_MARGIN, SafetyMarginPolicy};
use memgate::worker::DEFAULT_WORKER_COUNT;
use memgate::MemorySize;

/// Run tasks on a worker pool, refusing those that would not fit into memory.
#[derive(Parser, Debug)]
#[command(name = "memgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of worker threads.
    #[arg(short = 'w', long, env = "MEMGATE_WORKERS", default_value_t = DEFAULT_WORKER_COUNT, value_parser = parse_workers)]
    pub n_workers: usize,

    /// Execution handler used by the demo run.
    #[arg(long, value_enum, default_value_t = HandlerType::Regular)]
    pub handler_type: HandlerType,

    /// Fraction of available memory withheld from tasks (0.1 = 10% buffer).
    #[arg(long, env = "MEMGATE_SAFETY_MARGIN", default_value_t = DEFAULT_SAFETY_MARGIN, value_parser = parse_margin)]
    pub memory_safety_margin: f64,

    /// Pretend this much memory is available instead of reading /proc/meminfo
    /// (e.g. 512K, 64M, 1.5G; plain numbers are MiB).
    #[arg(long, value_name = "SIZE")]
    pub assume_available: Option<MemorySize>,

    /// Size of the string built by the memory-constrained demo.
    #[arg(long, value_name = "SIZE", default_value = "1M")]
    pub string_size: MemorySize,

    /// Enable verbose output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the demo workload (default).
    Run,

    /// Show memory as the gate sees it.
    Info(InfoArgs),
}

/// Arguments for the info command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct InfoArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Execution handler.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandlerType {
    /// Plain worker pool, no memory checks.
    #[default]
    Regular,
    /// Worker pool behind the memory gate.
    MemoryConstrained,
}

impl std::fmt::Display for HandlerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::MemoryConstrained => write!(f, "memory-constrained"),
        }
    }
}

fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{}", e))?;
    if n == 0 {
        return Err("worker count must be at least 1".to_string());
    }
    Ok(n)
}

fn parse_margin(s: &str) -> Result<f64, String> {
    let margin: f64 = s.parse().map_err(|e| format!("{}", e))?;
    SafetyMarginPolicy::new(margin)
        .map(|policy| policy.margin())
        .map_err(|e| e.to_string())
}
