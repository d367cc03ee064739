//! Benchmarks for bulk application and snapshot capture.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use service_graph_kernel::store::InMemoryGraphStore;
use service_graph_kernel::{BulkChanges, GraphEngine, NewDependency, NewService, ProjectId, UserId};

fn chain_batch(n: usize) -> BulkChanges {
    let services = (0..n)
        .map(|i| NewService::new(format!("svc-{i}"), "api").with_client_ref(format!("s{i}")))
        .collect();
    let dependencies = (1..n)
        .map(|i| NewDependency::new(format!("s{}", i - 1).as_str(), format!("s{i}").as_str()))
        .collect();
    BulkChanges {
        services,
        dependencies,
        ..BulkChanges::default()
    }
}

fn bench_bulk_apply(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("bulk_apply");

    for size in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let engine = GraphEngine::new(InMemoryGraphStore::new());
                    let result = engine
                        .apply_bulk_changes(ProjectId(1), UserId(1), chain_batch(size))
                        .await
                        .unwrap();
                    black_box(result)
                })
            });
        });
    }
    group.finish();
}

fn bench_snapshot_capture(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let engine = GraphEngine::new(InMemoryGraphStore::new());
    rt.block_on(engine.apply_bulk_changes(ProjectId(1), UserId(1), chain_batch(200)))
        .unwrap();

    c.bench_function("snapshot_capture_200", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(engine.create_snapshot(ProjectId(1), UserId(1), "").await.unwrap())
            })
        });
    });
}

criterion_group!(benches, bench_bulk_apply, bench_snapshot_capture);
criterion_main!(benches);
