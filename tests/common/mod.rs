#![allow(dead_code)]

use egtf::constants::{LaneId, Mile, Mph, Second, VehicleId};
use egtf::grid::SpaceTimeGrid;
use egtf::trajectories::batch_reader::TrajectoryBatch;
use egtf::trajectories::trajectory_file::TrajectoryFile;
use egtf::trajectories::TrajectorySet;
use rand::rngs::StdRng;
use rand::Rng;

pub const LANE: LaneId = 1;

/// Synthetic traffic on a straight section.
///
/// Vehicle `k` enters at `x = 0` at `t_first + k·headway` and is sampled once per second,
/// moving at `speed(x, t)` until it passes `x_end`. With `noise`, every position gets a
/// uniform perturbation in `[-noise, noise]` miles.
pub struct Traffic {
    pub n_vehicles: u32,
    pub headway: Second,
    pub t_first: Second,
    pub x_end: Mile,
    pub lane: LaneId,
}

impl Traffic {
    pub fn new(n_vehicles: u32, headway: Second, t_first: Second, x_end: Mile) -> Self {
        Self {
            n_vehicles,
            headway,
            t_first,
            x_end,
            lane: LANE,
        }
    }

    pub fn columns<F>(&self, speed: F, mut noise: Option<(&mut StdRng, Mile)>) -> (Vec<VehicleId>, Vec<Second>, Vec<Mile>)
    where
        F: Fn(Mile, Second) -> Mph,
    {
        let mut ids = Vec::new();
        let mut times = Vec::new();
        let mut positions = Vec::new();
        for v in 0..self.n_vehicles {
            let mut t = self.t_first + v as f64 * self.headway;
            let mut x = 0.0;
            // bounded number of samples for stopped traffic
            for _ in 0..10_000 {
                let observed = match noise.as_mut() {
                    Some((rng, a)) => x + rng.random_range(-*a..=*a),
                    None => x,
                };
                ids.push(v);
                times.push(t);
                positions.push(observed);
                if x >= self.x_end {
                    break;
                }
                x += speed(x, t) / 3600.0;
                t += 1.0;
            }
        }
        (ids, times, positions)
    }

    pub fn build<F>(&self, speed: F, noise: Option<(&mut StdRng, Mile)>) -> TrajectorySet
    where
        F: Fn(Mile, Second) -> Mph,
    {
        let (ids, times, positions) = self.columns(speed, noise);
        let batch = TrajectoryBatch::single_lane(&ids, &times, &positions, self.lane);
        TrajectorySet::new_from_batch(&batch).unwrap()
    }
}

/// Mirror every position of `set` around `length / 2` (`x → length − x`).
pub fn mirrored(set: &TrajectorySet, length: Mile) -> TrajectorySet {
    let mut ids = Vec::new();
    let mut times = Vec::new();
    let mut positions = Vec::new();
    let mut lanes = Vec::new();
    for (id, traj) in set {
        for s in traj.samples() {
            ids.push(*id);
            times.push(s.time);
            positions.push(length - s.position);
            lanes.push(s.lane);
        }
    }
    TrajectorySet::new_from_batch(&TrajectoryBatch::owned(ids, times, positions, lanes)).unwrap()
}

pub fn section_grid(length: Mile, duration: Second) -> SpaceTimeGrid {
    SpaceTimeGrid::builder()
        .space_extent(0.0, length)
        .dx(0.02)
        .time_window(0.0, duration)
        .dt(4.0)
        .build()
        .unwrap()
}

/// 60 mph everywhere except 20 mph from `x = 0.5` on (a stationary bottleneck).
pub fn bottleneck(x: Mile, _t: Second) -> Mph {
    if x < 0.5 {
        60.0
    } else {
        20.0
    }
}
