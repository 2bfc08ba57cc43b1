//! memgate - memory-gated task execution

mod cli;

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr, Stream::Stdout};
use tracing::{info, warn};

use cli::{Cli, Commands, HandlerType, InfoArgs};
use memgate::adapters::{
    DataSizeEstimator, FileSizeEstimator, ListSizeEstimator, ProcMeminfoMonitor,
    SafetyMarginPolicy, StaticMemoryMonitor,
};
use memgate::logging::{self, LogConfig};
use memgate::operations::{
    create_large_string, example_worker_task, factorial, process_large_list, read_file_to_string,
};
use memgate::worker::{Executor, Operation, WorkerPool, WorkerPoolStats};
use memgate::{BatchSlot, GateError, MemoryGatedExecutor, MemoryMonitor, MemorySize};

const DEMO_LINE: &str = "This is a test file for memory-constrained execution.\n";

/// Program entry point: parses CLI arguments, sets up logging, dispatches the
/// selected command and prints the error chain on failure.
fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    logging::init(
        LogConfig::from_verbosity(cli.verbose, cli.quiet)
            .with_ansi(!cli.no_color && std::io::stderr().is_terminal())
            .with_env_overrides(),
    );

    let result = match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(&cli),
        Commands::Info(args) => cmd_info(&cli, &args),
    };

    if let Err(e) = result {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

/// Monitor selected on the command line.
///
/// `--assume-available` pins available memory; total comes from
/// `/proc/meminfo` when readable.
fn build_monitor(cli: &Cli) -> Arc<dyn MemoryMonitor> {
    match cli.assume_available {
        Some(available) => {
            let available = available.as_bytes();
            let total = ProcMeminfoMonitor::new()
                .total()
                .unwrap_or(available)
                .max(available);
            Arc::new(StaticMemoryMonitor::new(total, available))
        }
        None => Arc::new(ProcMeminfoMonitor::new()),
    }
}

fn build_gate<E: Executor>(cli: &Cli, executor: E) -> Result<MemoryGatedExecutor<E>> {
    let policy = SafetyMarginPolicy::new(cli.memory_safety_margin)?;
    Ok(MemoryGatedExecutor::new(executor)
        .with_monitor(build_monitor(cli))
        .with_policy(policy))
}

/// Print memory as the gate sees it.
fn cmd_info(cli: &Cli, args: &InfoArgs) -> Result<()> {
    let gate = build_gate(cli, memgate::worker::InlineExecutor)?;
    let snapshot = gate.memory_info().context("Failed to query memory")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let label = |s: &'static str| s.if_supports_color(Stdout, |t| t.bold()).to_string();
    println!("{:<16} {}", label("Total:"), MemorySize::from_bytes(snapshot.total));
    println!("{:<16} {}", label("Available:"), MemorySize::from_bytes(snapshot.available));
    println!(
        "{:<16} {} ({:.1}%)",
        label("Used:"),
        MemorySize::from_bytes(snapshot.used),
        snapshot.percent
    );
    println!(
        "{:<16} {} (margin {})",
        label("Safe available:"),
        MemorySize::from_bytes(snapshot.safe_available),
        cli.memory_safety_margin
    );
    Ok(())
}

/// Run the demo workload with the selected handler.
fn cmd_run(cli: &Cli) -> Result<()> {
    info!(
        workers = cli.n_workers,
        handler = %cli.handler_type,
        "Hello from memgate! Using {} workers with {} handler",
        cli.n_workers,
        cli.handler_type
    );

    let pool = WorkerPool::with_workers(cli.n_workers)?;
    let stats = match cli.handler_type {
        HandlerType::Regular => {
            run_regular(&pool)?;
            pool.stats()
        }
        HandlerType::MemoryConstrained => {
            let gate = build_gate(cli, pool)?;
            run_memory_constrained(cli, &gate)?;
            gate.executor().stats()
        }
    };

    report_stats(&stats);
    Ok(())
}

fn worker_task() -> Operation<u32, String> {
    Operation::new("example_worker_task", |id: u32| Ok(example_worker_task(id)))
}

fn log_batch(results: &[String]) {
    info!("Batch processing completed with {} results:", results.len());
    for result in results {
        info!("  - {}", result);
    }
}

fn run_regular(pool: &WorkerPool) -> Result<()> {
    info!("Executing single task on the worker pool...");
    let result = pool.run(&worker_task(), 1)?;
    info!("Result: {}", result);

    info!("Executing CPU intensive task on the worker pool...");
    let fact = pool.run(&Operation::new("factorial", factorial), 10)?;
    info!("Factorial of 10: {}", fact);

    info!("Running batch processing on the worker pool...");
    let results = pool.run_batch(&worker_task(), (1..=5).collect())?;
    log_batch(&results);
    Ok(())
}

fn run_memory_constrained(cli: &Cli, gate: &MemoryGatedExecutor<WorkerPool>) -> Result<()> {
    let snapshot = gate.memory_info().context("Failed to query memory")?;
    info!(
        "Memory info: {} available, {} safe to use",
        MemorySize::from_bytes(snapshot.available),
        MemorySize::from_bytes(snapshot.safe_available)
    );

    info!("Demonstrating memory-constrained file operations...");
    let demo_file = std::env::temp_dir().join(format!("memgate-demo-{}.txt", std::process::id()));
    let outcome = gated_payloads(cli, gate, &demo_file);
    // Best effort; the file may never have been written.
    let _ = fs::remove_file(&demo_file);

    match outcome {
        Err(e) if e.downcast_ref::<GateError>().is_some_and(GateError::is_memory_constraint) => {
            warn!("Memory constraint prevented execution: {}", e);
        }
        other => other?,
    }

    info!("Running gated list processing...");
    let list_op = Operation::new("process_large_list", |count: usize| Ok(process_large_list(count)));
    let slots = gate.execute_batch(
        &list_op,
        vec![1_000, 10_000, 100_000],
        Some(&ListSizeEstimator::default()),
    )?;
    for slot in &slots {
        match slot {
            BatchSlot::Completed(items) => info!("  - processed {} items", items.len()),
            BatchSlot::Skipped => info!("  - skipped"),
        }
    }

    info!("Running regular batch processing...");
    let results = gate.run_batch(&worker_task(), (1..=3).collect())?;
    log_batch(&results);
    Ok(())
}

fn gated_payloads(cli: &Cli, gate: &MemoryGatedExecutor<WorkerPool>, demo_file: &Path) -> Result<()> {
    fs::write(demo_file, DEMO_LINE.repeat(1000))
        .with_context(|| format!("Failed to write {}", demo_file.display()))?;

    let read_op = Operation::new("read_file_to_string", |path: PathBuf| read_file_to_string(&path));
    let content = gate.execute(
        &read_op,
        Some(&FileSizeEstimator::default()),
        demo_file.to_path_buf(),
    )?;
    info!("File read successfully: {} characters", content.len());

    info!("Demonstrating memory-intensive operation...");
    let string_op = Operation::new("create_large_string", |size: MemorySize| {
        Ok(create_large_string(size))
    });
    let large = gate.execute(&string_op, Some(&DataSizeEstimator::default()), cli.string_size)?;
    info!("Large string created: {} characters", large.len());
    Ok(())
}

fn report_stats(stats: &WorkerPoolStats) {
    info!(
        workers = stats.worker_count,
        completed = stats.jobs_completed,
        failed = stats.jobs_failed,
        panicked = stats.jobs_panicked,
        "Worker pool statistics"
    );
    if let Some(rss) = stats.peak_rss_bytes {
        info!(peak_rss_bytes = rss, "Peak memory usage: {}", MemorySize::from_bytes(rss));
    }
}
