//! Benchmarks for the adaptive smoothing method.
//!
//!   cargo bench --bench smooth_speed_field
//!   RAYON_NUM_THREADS=1 cargo bench --bench smooth_speed_field
//!
//! The raw field is synthetic: a 60 mph background with a 15 mph jam whose tail moves
//! upstream at 13 mph, and about 20% of the boxes left empty.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use egtf::edie::{aggregate, RawSpeedField};
use egtf::grid::SpaceTimeGrid;
use egtf::smoothing::{smooth_with, SmoothingParams};
use egtf::trajectories::TrajectorySegment;

fn make_raw_field(n_time_s: f64) -> RawSpeedField {
    let grid = SpaceTimeGrid::builder()
        .space_extent(0.0, 4.0)
        .dx(0.02)
        .time_window(0.0, n_time_s)
        .dt(4.0)
        .build()
        .unwrap();
    let mut rng = StdRng::seed_from_u64(0xA5A5);

    // one short probe segment per box, some boxes skipped
    let mut segments = Vec::new();
    for j in 0..grid.n_time() {
        for i in 0..grid.n_space() {
            if rng.random_bool(0.2) {
                continue;
            }
            let x = grid.space_center(i);
            let t = grid.time_center(j);
            let tail = 3.0 - 13.0 * t / 3600.0;
            let v = if x > tail && x < 3.5 { 15.0 } else { 60.0 };
            let v = v + rng.random_range(-3.0..3.0);
            segments.push(TrajectorySegment::new(t - 0.5, x, t + 0.5, x + v / 3600.0));
        }
    }
    aggregate(segments, &grid)
}

fn bench_default(c: &mut Criterion) {
    let raw = make_raw_field(900.0);
    let params = SmoothingParams::default();

    c.bench_function("smooth_speed_field/15min_default", |b| {
        b.iter(|| black_box(smooth_with(black_box(&raw), &params).unwrap()))
    });
}

fn bench_wide_kernel(c: &mut Criterion) {
    let raw = make_raw_field(900.0);
    let params = SmoothingParams::builder().kernel_reach(3.0).build().unwrap();

    c.bench_function("smooth_speed_field/15min_reach3", |b| {
        b.iter(|| black_box(smooth_with(black_box(&raw), &params).unwrap()))
    });
}

criterion_group!(benches, bench_default, bench_wide_kernel);
criterion_main!(benches);
