//! # Shard Router Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Routing | Hash and range lookups per key |
//! | Planning | Rebalance plan after adding a shard |
//! | Rebalance | Full in-memory growth run |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use shard_router::{
    hash_route, plan_rebalance, range_route, RecordId, ShardDescriptor, ShardListing,
    ShardingApi, Topology,
};
use shard_tests::fixtures::{memory_descriptors, MemoryCluster};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Routing
// ============================================================================

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");
    let mut rng = rand::thread_rng();
    let keys: Vec<RecordId> = (0..1_000).map(|_| rng.gen()).collect();

    for shards in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(keys.len() as u64));
        group.bench_with_input(BenchmarkId::new("hash_route", shards), &shards, |b, &n| {
            b.iter(|| {
                for &key in &keys {
                    black_box(hash_route(key, n));
                }
            })
        });

        let bounds: Vec<RecordId> = (1..shards as RecordId).map(|i| i * 1_000_000).collect();
        group.bench_with_input(BenchmarkId::new("range_route", shards), &bounds, |b, bounds| {
            b.iter(|| {
                for &key in &keys {
                    black_box(range_route(key, bounds));
                }
            })
        });
    }

    group.finish();
}

// ============================================================================
// Planning
// ============================================================================

/// Listing placed by a 4-shard hash topology, planned against 5 shards.
fn grown_listing(records: usize) -> (ShardListing, Topology) {
    let cluster = MemoryCluster::hashed(4);
    cluster.populate(0..records as RecordId);
    let listing = cluster.router.list_all().expect("listing");
    let grown = Topology::hashed(memory_descriptors(5)).expect("topology");
    (listing, grown)
}

fn bench_plan_rebalance(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_rebalance");

    for records in [1_000usize, 10_000] {
        let (listing, topology) = grown_listing(records);
        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &listing, |b, listing| {
            b.iter(|| black_box(plan_rebalance(listing, &topology)))
        });
    }

    let empty: ShardListing = (0..5).map(|i| (i, Vec::new())).collect::<BTreeMap<_, _>>();
    let topology = Topology::hashed(memory_descriptors(5)).expect("topology");
    group.bench_function("empty", |b| {
        b.iter(|| black_box(plan_rebalance(&empty, &topology)))
    });

    group.finish();
}

// ============================================================================
// Rebalance
// ============================================================================

fn bench_add_shard(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_shard");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    group.bench_function("memory_1000_records", |b| {
        b.iter_with_setup(
            || {
                let cluster = MemoryCluster::hashed(4);
                cluster.populate(0..1_000);
                cluster
            },
            |cluster| {
                black_box(
                    cluster
                        .router
                        .add_shard(ShardDescriptor::new("shard5", "mem://4"))
                        .expect("add_shard"),
                )
            },
        )
    });

    group.finish();
}

criterion_group!(benches, bench_routing, bench_plan_rebalance, bench_add_shard);
criterion_main!(benches);
