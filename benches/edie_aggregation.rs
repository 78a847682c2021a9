//! Benchmarks for Edie aggregation over a 4 mile × 1 hour section.
//!
//!   cargo bench --bench edie_aggregation
//!   cargo bench edie_aggregation -- edie_aggregation/noisy_1h

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use egtf::edie::aggregate;
use egtf::grid::SpaceTimeGrid;
use egtf::trajectories::TrajectorySegment;

/// One vehicle every 2 s, sampled at 1 Hz, speeds drawn in [15, 70] mph per vehicle.
fn make_segments(rng: &mut StdRng, noise: f64) -> Vec<TrajectorySegment> {
    let mut segments = Vec::new();
    for v in 0..1800 {
        let speed: f64 = rng.random_range(15.0..70.0);
        let mut t = 2.0 * v as f64;
        let mut x = 0.0;
        while x < 4.0 {
            let jitter = if noise > 0.0 {
                rng.random_range(-noise..noise)
            } else {
                0.0
            };
            let x_next = x + speed / 3600.0 + jitter;
            segments.push(TrajectorySegment::new(t, x, t + 1.0, x_next));
            x = x_next;
            t += 1.0;
        }
    }
    segments
}

fn grid() -> SpaceTimeGrid {
    SpaceTimeGrid::builder()
        .space_extent(0.0, 4.0)
        .dx(0.02)
        .time_window(0.0, 3600.0)
        .dt(4.0)
        .build()
        .unwrap()
}

fn bench_clean(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xED1E);
    let segments = make_segments(&mut rng, 0.0);
    let grid = grid();

    c.bench_function("edie_aggregation/clean_1h", |b| {
        b.iter_batched(
            || segments.clone(),
            |segs| black_box(aggregate(segs, black_box(&grid))),
            BatchSize::LargeInput,
        )
    });
}

fn bench_noisy(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xB0C5);
    let segments = make_segments(&mut rng, 0.002);
    let grid = grid();

    c.bench_function("edie_aggregation/noisy_1h", |b| {
        b.iter_batched(
            || segments.clone(),
            |segs| black_box(aggregate(segs, black_box(&grid))),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_clean, bench_noisy);
criterion_main!(benches);
