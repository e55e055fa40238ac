use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lockd_core::infrastructure_in_memory::InMemoryLeaseStore;
use lockd_core::{AcquireRequest, CoordinatorConfig, LockCoordinator};

use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Failed to build runtime")
}

fn bench_acquire_release(c: &mut Criterion) {
    let rt = runtime();
    let coordinator = LockCoordinator::new(
        Arc::new(InMemoryLeaseStore::new()),
        CoordinatorConfig::default(),
    );

    c.bench_function("lock_acquire_release_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let lease = coordinator
                    .acquire(AcquireRequest::new("res1", "client-1"))
                    .await
                    .expect("uncontended acquire");
                coordinator
                    .release("res1", "client-1", &lease.lease_id)
                    .await
                    .expect("release by owner");
            })
        })
    });
}

fn bench_throughput(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("lock_throughput");

    for client_count in [10, 50, 100] {
        group.bench_with_input(
            BenchmarkId::new("clients", client_count),
            &client_count,
            |b, &count| {
                b.iter(|| {
                    rt.block_on(async {
                        let coordinator = LockCoordinator::new(
                            Arc::new(InMemoryLeaseStore::new()),
                            CoordinatorConfig::default(),
                        );

                        // Each client takes a different lock
                        for i in 0..count {
                            let _ = coordinator
                                .acquire(AcquireRequest::new(
                                    format!("/locks/{}", i),
                                    format!("client-{}", i),
                                ))
                                .await;
                        }

                        black_box(coordinator.list_active().len())
                    })
                })
            },
        );
    }

    group.finish();
}

fn bench_fast_fail(c: &mut Criterion) {
    let rt = runtime();
    let coordinator = LockCoordinator::new(
        Arc::new(InMemoryLeaseStore::new()),
        CoordinatorConfig::default(),
    );
    rt.block_on(coordinator.acquire(AcquireRequest::new("hot", "holder")))
        .expect("initial acquire");

    c.bench_function("contended_acquire_fast_fail", |b| {
        b.iter(|| {
            black_box(rt.block_on(coordinator.acquire(AcquireRequest::new("hot", "challenger"))))
                .is_err()
        })
    });
}

criterion_group!(benches, bench_acquire_release, bench_throughput, bench_fast_fail);
criterion_main!(benches);
