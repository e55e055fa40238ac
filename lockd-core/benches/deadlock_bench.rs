use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lockd_core::deadlock::detect_cycles;
use lockd_core::state::WaitForGraph;

// ─── Helpers ────────────────────────────────────────────────────────────────

/// `n` clients in one ring: client i holds lock i and waits on lock i + 1.
fn ring(n: usize) -> WaitForGraph {
    let mut graph = WaitForGraph::default();
    for i in 0..n {
        graph.held_by.insert(format!("L{}", i), format!("c{}", i));
        graph
            .waiting_for
            .entry(format!("c{}", i))
            .or_default()
            .insert(format!("L{}", (i + 1) % n));
    }
    graph
}

/// `n` clients in a chain that ends at a free lock; no cycle.
fn chain(n: usize) -> WaitForGraph {
    let mut graph = WaitForGraph::default();
    for i in 0..n {
        graph.held_by.insert(format!("L{}", i), format!("c{}", i));
        graph
            .waiting_for
            .entry(format!("c{}", i))
            .or_default()
            .insert(format!("L{}", i + 1));
    }
    graph
}

// ─── Benchmarks ─────────────────────────────────────────────────────────────

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("deadlock_detect");

    for size in [10, 100, 1000] {
        let cyclic = ring(size);
        group.bench_with_input(BenchmarkId::new("ring", size), &cyclic, |b, graph| {
            b.iter(|| black_box(detect_cycles(graph, 0)))
        });

        let acyclic = chain(size);
        group.bench_with_input(BenchmarkId::new("chain", size), &acyclic, |b, graph| {
            b.iter(|| black_box(detect_cycles(graph, 0)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detect);
criterion_main!(benches);
