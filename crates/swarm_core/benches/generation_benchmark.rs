//! # Generation Cycle Benchmark
//!
//! Measures the host-side bookkeeping of one dispatch cycle:
//! 1. Filling the write slot with actor ids
//! 2. Commit + harvest of the pending generation
//! 3. Arena rebuild at growing capacities

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use swarm_core::{grow_capacity, GenerationPair, SlotArena, MIN_SLOT_CAPACITY};

fn bench_commit_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_commit_cycle");

    for count in [1_000usize, 10_000, 100_000] {
        let mut pair: GenerationPair<Vec<u64>> = GenerationPair::default();

        group.bench_with_input(BenchmarkId::new("fill_commit_harvest", count), &count, |b, &n| {
            b.iter(|| {
                let _ = pair.take_pending();
                let slot = pair.write_slot_mut();
                slot.clear();
                slot.extend(0..n as u64);
                black_box(pair.commit(n, 1));
            });
        });
    }

    group.finish();
}

fn bench_arena_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_arena_rebuild");

    for count in [1_000usize, 50_000] {
        let capacity = grow_capacity(count, MIN_SLOT_CAPACITY);
        let mut arena: SlotArena<Vec<[f32; 4]>> = SlotArena::new();

        group.bench_with_input(BenchmarkId::new("rebuild", capacity), &capacity, |b, &cap| {
            b.iter(|| {
                let epoch = arena.rebuild(cap, |_, n| Ok::<_, ()>(vec![[0.0; 4]; n]));
                black_box(epoch)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_commit_cycle, bench_arena_rebuild);
criterion_main!(benches);
