//! Benchmarks for the gating overhead.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use memgate::adapters::{FixedEstimator, NoopRecorder, SafetyMarginPolicy, StaticMemoryMonitor, parse_meminfo};
use memgate::worker::{Executor, InlineExecutor, Operation, WorkerPool};
use memgate::MemoryGatedExecutor;
use std::path::Path;

const MIB: u64 = 1024 * 1024;

const MEMINFO: &str = "MemTotal:       16384000 kB
MemFree:         1024000 kB
MemAvailable:    8192000 kB
Buffers:          204800 kB
Cached:          4096000 kB
SwapCached:            0 kB
Active:          6144000 kB
Inactive:        3072000 kB
";

fn gate<E: Executor>(executor: E) -> MemoryGatedExecutor<E> {
    MemoryGatedExecutor::new(executor)
        .with_monitor(StaticMemoryMonitor::new(16 * 1024 * MIB, 8 * 1024 * MIB))
        .with_policy(SafetyMarginPolicy::default())
        .with_recorder(NoopRecorder)
}

fn bench_single_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_single");
    let gate = gate(InlineExecutor);
    let op = Operation::new("add_one", |x: u64| Ok(x + 1));
    let estimator = FixedEstimator(MIB);

    group.bench_function("ungated", |b| {
        b.iter(|| black_box(gate.run(&op, black_box(1)).unwrap()))
    });

    group.bench_function("admitted", |b| {
        b.iter(|| black_box(gate.execute(&op, Some(&estimator), black_box(1)).unwrap()))
    });

    let huge = FixedEstimator(u64::MAX);
    group.bench_function("refused", |b| {
        b.iter(|| black_box(gate.execute(&op, Some(&huge), black_box(1)).is_err()))
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_batch");
    let op = Operation::new("square", |x: u64| Ok(x * x));
    let estimator = FixedEstimator(MIB);

    for size in [10usize, 100, 1000].iter() {
        let inline = gate(InlineExecutor);
        group.bench_with_input(BenchmarkId::new("inline", size), size, |b, &size| {
            b.iter(|| {
                let args: Vec<u64> = (0..size as u64).collect();
                black_box(inline.execute_batch(&op, args, Some(&estimator)).unwrap())
            });
        });

        let pooled = gate(WorkerPool::with_workers(4).unwrap());
        group.bench_with_input(BenchmarkId::new("pool", size), size, |b, &size| {
            b.iter(|| {
                let args: Vec<u64> = (0..size as u64).collect();
                black_box(pooled.execute_batch(&op, args, Some(&estimator)).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_parse_meminfo(c: &mut Criterion) {
    c.bench_function("parse_meminfo", |b| {
        b.iter(|| black_box(parse_meminfo(Path::new("/proc/meminfo"), black_box(MEMINFO)).unwrap()))
    });
}

criterion_group!(benches, bench_single_call, bench_batch, bench_parse_meminfo);
criterion_main!(benches);
