//! Benchmarks for A* over generated maps.
//!
//! Run with: cargo bench --bench pathfinding

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hexlink::world::{find_path, generate_default, TerrainTable, UNLIMITED_STAMINA};
use hexlink::HexCoord;

fn bench_find_path(c: &mut Criterion) {
    let terrain = TerrainTable::default();
    let mut group = c.benchmark_group("find_path");

    for size in [16, 64, 128] {
        let world = generate_default(size, size, 42).unwrap();
        let start = HexCoord::from_offset(1, 1);
        let goal = HexCoord::from_offset(size - 2, size - 2);

        group.bench_with_input(BenchmarkId::new("unlimited", size), &size, |b, _| {
            b.iter(|| {
                let result = find_path(
                    &world,
                    black_box(start),
                    black_box(goal),
                    UNLIMITED_STAMINA,
                    |t| terrain.tile_cost(t),
                );
                black_box(result.cost)
            });
        });

        // Budget too small to arrive: the search exhausts the reachable area.
        group.bench_with_input(BenchmarkId::new("exhausted", size), &size, |b, _| {
            b.iter(|| {
                let result = find_path(&world, black_box(start), black_box(goal), 12, |t| {
                    terrain.tile_cost(t)
                });
                black_box(result.explored.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find_path);
criterion_main!(benches);
