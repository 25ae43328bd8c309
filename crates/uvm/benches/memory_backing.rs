//! Benchmarks for a full create, start and close cycle under each memory
//! backing strategy.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use uvm::test_utils::FakeHostService;
use uvm::{LinuxBootConfig, MemoryBackingPreference, MemoryBackingStrategy, Uvm};

fn custom_criterion() -> Criterion {
    Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(50)
}

fn preference_for(strategy: MemoryBackingStrategy) -> MemoryBackingPreference {
    match strategy {
        MemoryBackingStrategy::VirtualOvercommit => MemoryBackingPreference::default(),
        MemoryBackingStrategy::VirtualDeferredCommit => {
            MemoryBackingPreference::default().with_deferred_commit(true)
        }
        MemoryBackingStrategy::PhysicallyBacked => {
            MemoryBackingPreference::default().with_allow_overcommit(false)
        }
    }
}

fn lifecycle_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let host = Arc::new(FakeHostService::new());
    let mut group = c.benchmark_group("lifecycle");

    for strategy in [
        MemoryBackingStrategy::VirtualOvercommit,
        MemoryBackingStrategy::VirtualDeferredCommit,
        MemoryBackingStrategy::PhysicallyBacked,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(strategy),
            &strategy,
            |b, &strategy| {
                b.iter(|| {
                    rt.block_on(async {
                        let vm = Uvm::linux(LinuxBootConfig::new(
                            "/boot/kernel",
                            "/boot/initrd.img",
                        ))
                        .memory_mb(512)
                        .preference(preference_for(strategy))
                        .build(host.clone())
                        .expect("Failed to build VM");
                        assert_eq!(vm.backing(), strategy);
                        vm.create().await.expect("Failed to create VM");
                        vm.start(Duration::from_secs(30))
                            .await
                            .expect("Failed to start VM");
                        vm.close().await.expect("Failed to close VM");
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = custom_criterion();
    targets = lifecycle_benchmark
}

criterion_main!(benches);
