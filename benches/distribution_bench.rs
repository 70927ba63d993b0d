use balancer_sim::algorithms::{build_strategy, DistributionContext};
use balancer_sim::models::{AlgoConfig, WeightingConfig};
use balancer_sim::server::{Server, ServerRegistry};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

const AMOUNT: u64 = 5_000;

fn build_pool(count: usize) -> ServerRegistry {
    let mut registry = ServerRegistry::new();
    for idx in 0..count {
        let id = registry.add(100 + 50 * (idx as u64 % 3));
        if let Some(server) = registry.get_mut(id) {
            server.current_load = (idx as u64 * 7) % 60;
        }
    }
    registry
}

fn bench_distribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("distribute");

    for count in [8usize, 64, 512] {
        let registry = build_pool(count);
        let servers: Vec<Server> = registry.servers().to_vec();
        for (algo, weighting) in [
            (AlgoConfig::RoundRobin, WeightingConfig::ProportionalCapacity),
            (AlgoConfig::LeastLoaded, WeightingConfig::ProportionalCapacity),
            (AlgoConfig::WeightedOptimization, WeightingConfig::ProportionalCapacity),
            (AlgoConfig::WeightedOptimization, WeightingConfig::TargetUtilization),
        ] {
            let label = format!("{}/{}", algo, weighting);
            group.bench_with_input(BenchmarkId::new(label, count), &servers, |b, servers| {
                b.iter_batched(
                    || build_strategy(algo, weighting),
                    |mut strategy| {
                        let ctx = DistributionContext { servers };
                        black_box(strategy.distribute(&ctx, AMOUNT));
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_distribution);
criterion_main!(benches);
